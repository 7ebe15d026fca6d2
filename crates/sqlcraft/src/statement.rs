use crate::error::{OrmError, OrmResult};
use crate::value::SqlValue;
use std::fmt;

/// The portable placeholder token. Dialects rewrite it in
/// [`Dialect::translate_sql`](crate::Dialect::translate_sql).
pub const PLACEHOLDER: char = '?';

/// SQL text with positional `?` placeholders and their arguments.
///
/// Every craft function returns a `Statement`; [`Statement::to_literal_sql`]
/// inlines the arguments for logging or for backends without parameter
/// support.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct Statement {
    sql: String,
    args: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Convert `:name` tokens into positional placeholders.
    ///
    /// `lookup` supplies the value for each name. `::` casts and quoted text
    /// are left alone.
    pub fn from_named<F>(sql: &str, mut lookup: F) -> OrmResult<Self>
    where
        F: FnMut(&str) -> Option<SqlValue>,
    {
        let chars: Vec<char> = sql.chars().collect();
        let mut out = String::with_capacity(sql.len());
        let mut args = Vec::new();
        let mut scanner = QuoteScanner::default();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            if !scanner.feed(ch) && ch == ':' {
                let prev_colon = i > 0 && chars[i - 1] == ':';
                let starts_name = chars
                    .get(i + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_');
                if !prev_colon && starts_name {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    let value = lookup(&name).ok_or_else(|| {
                        OrmError::InvalidQuery(format!("no value for named parameter :{name}"))
                    })?;
                    out.push(PLACEHOLDER);
                    args.push(value);
                    i = end;
                    continue;
                }
            }
            out.push(ch);
            i += 1;
        }

        Ok(Self { sql: out, args })
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.sql.push(PLACEHOLDER);
        self.args.push(value.into());
        self
    }

    /// Append a comma-separated placeholder list.
    pub fn push_bind_list<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<SqlValue>,
    {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push(',');
            }
            self.push_bind(value);
        }
        self
    }

    /// Append another statement, consuming it.
    pub fn push_statement(&mut self, other: Statement) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.args.extend(other.args);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.args)
    }

    /// Number of placeholders outside quoted text.
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        rewrite_placeholders(&self.sql, |_| {
            count += 1;
            PLACEHOLDER.to_string()
        });
        count
    }

    /// Inline every argument as a SQL literal.
    pub fn to_literal_sql(&self) -> String {
        rewrite_placeholders(&self.sql, |idx| match self.args.get(idx) {
            Some(value) => value.to_literal(),
            None => PLACEHOLDER.to_string(),
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal_sql())
    }
}

/// Tracks whether the scan position is inside a quoted literal or identifier.
#[derive(Default)]
struct QuoteScanner {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteScanner {
    /// Advance over `ch`; returns `true` when `ch` is part of quoted text.
    fn feed(&mut self, ch: char) -> bool {
        match self.quote {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == q {
                    self.quote = None;
                }
                true
            }
            None if matches!(ch, '\'' | '"' | '`') => {
                self.quote = Some(ch);
                true
            }
            None => false,
        }
    }
}

/// Replace every unquoted `?` with `f(index)`.
pub(crate) fn rewrite_placeholders(sql: &str, mut f: impl FnMut(usize) -> String) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut scanner = QuoteScanner::default();
    let mut idx = 0;
    for ch in sql.chars() {
        if !scanner.feed(ch) && ch == PLACEHOLDER {
            out.push_str(&f(idx));
            idx += 1;
        } else {
            out.push(ch);
        }
    }
    out
}
