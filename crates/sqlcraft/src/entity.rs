//! Compile-time entity descriptors.
//!
//! `#[derive(Entity)]` implements [`Entity`] for a struct: the table name, the
//! ordered list of mapped columns and accessors for the identity and
//! timestamp fields. Everything the statement crafting layer needs is known
//! at build time; a field type without a [`ColumnType`](crate::ColumnType)
//! impl is a compile error.

use crate::error::{MappingError, OrmResult};
use crate::record::Record;
use crate::value::SqlValue;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Column kind, used for DDL inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Uuid,
}

impl FieldKind {
    /// DDL type name for this kind.
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Uuid => "VARCHAR",
            FieldKind::Integer => "INTEGER",
            FieldKind::Float => "FLOAT",
            FieldKind::Boolean => "BOOLEAN",
            FieldKind::Timestamp => "DATETIME",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// A mapped struct field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust field name.
    pub field: &'static str,
    /// Column name.
    pub column: &'static str,
    pub kind: FieldKind,
    /// `true` for `Option<T>` fields.
    pub nullable: bool,
}

/// A struct mapped to a table.
///
/// Usually derived:
///
/// ```ignore
/// use sqlcraft::Entity;
/// use uuid::Uuid;
///
/// #[derive(Entity, Default)]
/// #[orm(table = "test")]
/// struct Test {
///     #[orm(column)]
///     id: Uuid,
///     #[orm(column)]
///     name: String,
///     scratch: Vec<u8>, // untagged: never mapped
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// Table name (the type identifier unless overridden with `#[orm(table)]`).
    const TABLE: &'static str;
    /// Mapped fields in declaration order.
    const FIELDS: &'static [FieldDef];
    /// Identity column, if the struct has one.
    const ID_COLUMN: Option<&'static str>;
    /// Column of the `created_at` field, if mapped.
    const CREATED_AT_COLUMN: Option<&'static str> = None;
    /// SQL view template attached with `#[orm(view)]`.
    const SQL_VIEW: Option<&'static str> = None;

    /// Field values in [`Entity::FIELDS`] order.
    fn values(&self) -> Vec<SqlValue>;

    /// Value of the identity field.
    fn identity(&self) -> Option<SqlValue>;

    /// Identity as a UUID, when the identity field is UUID-typed and set.
    fn identity_uuid(&self) -> Option<Uuid>;

    /// Assign `id` to the identity field unless it already holds a value.
    ///
    /// Returns `false` when there is no UUID identity field.
    fn assign_id(&mut self, id: Uuid) -> bool;

    /// Returns `false` when there is no timestamp `created_at` field.
    fn touch_created_at(&mut self, now: DateTime<Utc>) -> bool;

    /// Returns `false` when there is no timestamp `updated_at` field.
    fn touch_updated_at(&mut self, now: DateTime<Utc>) -> bool;

    /// Decode one result row.
    fn from_record(record: &Record) -> OrmResult<Self>;

    /// Column names in declaration order.
    fn columns() -> Vec<&'static str> {
        Self::FIELDS.iter().map(|f| f.column).collect()
    }

    fn field(column: &str) -> Option<&'static FieldDef> {
        Self::FIELDS.iter().find(|f| f.column == column)
    }

    /// Value of a single column.
    fn value_of(&self, column: &str) -> Option<SqlValue> {
        let idx = Self::FIELDS.iter().position(|f| f.column == column)?;
        self.values().into_iter().nth(idx)
    }

    /// Identity column, checked to be UUID-typed.
    fn uuid_id_column() -> Result<&'static str, MappingError> {
        let column = Self::ID_COLUMN.ok_or(MappingError::MissingIdentity { table: Self::TABLE })?;
        match Self::field(column) {
            Some(def) if def.kind == FieldKind::Uuid => Ok(column),
            _ => Err(MappingError::IdentityNotUuid {
                table: Self::TABLE,
                column,
            }),
        }
    }
}
