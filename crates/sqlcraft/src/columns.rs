//! Column and schema inference.

use crate::entity::{FieldDef, FieldKind};
use crate::value::SqlValue;
use std::fmt;

/// Fixed text width of a hyphenated UUID.
pub const UUID_LENGTH: usize = 36;

/// Column metadata inferred from a field and a sample value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: FieldKind,
    /// Observed text length; only meaningful for `VARCHAR` columns.
    pub length: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: FieldKind, length: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            length,
        }
    }

    /// Infer a column from its field definition and an optional sample value.
    pub fn infer(def: &FieldDef, sample: Option<&SqlValue>) -> Self {
        let length = match (def.kind, sample) {
            (FieldKind::Uuid, _) => UUID_LENGTH,
            (FieldKind::Text, Some(SqlValue::Text(s))) => s.len(),
            _ => 0,
        };
        Self::new(def.column, def.kind, length)
    }

    pub fn upper_name(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn is_varchar(&self) -> bool {
        self.data_type.sql_type() == "VARCHAR"
    }

    /// Widen to `other`'s length. Only `VARCHAR` columns change.
    pub fn update(&mut self, other: &Column) {
        if self.is_varchar() && other.length > self.length {
            self.length = other.length;
        }
    }

    /// Declared width: observed length scaled by 1.5, truncated.
    pub fn declared_length(&self) -> usize {
        self.length * 3 / 2
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_varchar() {
            write!(
                f,
                "\"{}\" VARCHAR({})",
                self.upper_name(),
                self.declared_length()
            )
        } else {
            write!(f, "\"{}\" {}", self.upper_name(), self.data_type.sql_type())
        }
    }
}

/// Merge a later sample into an accumulated schema, column by column.
pub fn widen(schema: &mut [Column], sample: &[Column]) {
    for (col, other) in schema.iter_mut().zip(sample) {
        col.update(other);
    }
}

/// DDL column list, one column per line.
pub fn schema_ddl(columns: &[Column]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n, ")
}
