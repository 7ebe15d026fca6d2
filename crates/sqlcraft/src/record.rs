//! Result rows.

use crate::error::{OrmError, OrmResult};
use crate::value::{ColumnType, SqlValue, decode_column};
use std::sync::Arc;

/// One result row: column names paired with values.
///
/// Column names are shared between rows of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Record {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let (columns, values): (Vec<String>, Vec<SqlValue>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Decode `column` into `T`.
    ///
    /// A missing column decodes as `NULL`, so `Option<T>` fields tolerate
    /// narrower result sets.
    pub fn try_get<T: ColumnType>(&self, column: &str) -> OrmResult<T> {
        match self.get(column) {
            Some(value) => decode_column(column, value),
            None => decode_column(column, &SqlValue::Null).map_err(|_| {
                OrmError::decode(column, "column not present in result set")
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}
