use crate::clause::{Clause, Clauses};
use crate::value::SqlValue;

/// A SELECT description: filters, ordering and an optional row limit.
///
/// A raw query bypasses composition entirely.
///
/// ```ignore
/// let query = Query::new()
///     .filter("name = ?", ["asdf"])
///     .filter("id IN (?)", [SqlValue::from(ids)])
///     .order_by("created_at DESC")
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct Query {
    pub(crate) where_clauses: Clauses,
    pub(crate) order_clauses: Clauses,
    pub(crate) limit: Option<u64>,
    pub(crate) raw: Option<Clause>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// A query whose SQL and arguments are used verbatim.
    pub fn raw<I>(sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SqlValue>,
    {
        Self {
            raw: Some(Clause::new(sql, args.into_iter().map(Into::into).collect())),
            ..Self::default()
        }
    }

    /// Add a `WHERE` fragment; fragments are joined with `AND`.
    pub fn filter<I>(mut self, fragment: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SqlValue>,
    {
        self.where_clauses.push(Clause::new(
            fragment,
            args.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Add an `ORDER BY` fragment; fragments are joined with `, `.
    pub fn order_by(mut self, fragment: impl Into<String>) -> Self {
        self.order_clauses.push(Clause::raw(fragment));
        self
    }

    /// Cap the result size. `0` means no limit.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = (n > 0).then_some(n);
        self
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }
}
