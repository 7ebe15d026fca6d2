//! SQL fragments paired with their positional arguments.

use crate::statement::Statement;
use crate::value::SqlValue;

/// A fragment such as `name = ?` together with the values for its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub fragment: String,
    pub args: Vec<SqlValue>,
}

impl Clause {
    pub fn new(fragment: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            fragment: fragment.into(),
            args,
        }
    }

    /// A fragment without arguments.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self::new(fragment, Vec::new())
    }

    pub fn into_statement(self) -> Statement {
        Statement::with_args(self.fragment, self.args)
    }
}

/// An ordered list of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clauses(Vec<Clause>);

impl Clauses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.0.push(clause);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Fragments joined with `sep`.
    pub fn join(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(|c| c.fragment.as_str())
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// All arguments, flattened in clause order.
    pub fn args(&self) -> Vec<SqlValue> {
        self.0.iter().flat_map(|c| c.args.iter().cloned()).collect()
    }
}

impl FromIterator<Clause> for Clauses {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
