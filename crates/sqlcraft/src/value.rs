//! Backend-neutral values and their SQL literal rendering.

use crate::error::{OrmError, OrmResult};
use crate::entity::FieldKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Timestamp layout used for literals and plain renderings.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single argument or result value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Uuid(Uuid),
    /// Expanded into one placeholder per element by `IN (?)`.
    List(Vec<SqlValue>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render as an inline SQL literal.
    ///
    /// Text is quoted and escaped, non-finite floats become `NULL`, timestamps
    /// and UUIDs are quoted.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(s) => format!("'{}'", escape_string(s)),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Timestamp(ts) => format!("'{}'", ts.format(TIME_FORMAT)),
            SqlValue::Uuid(id) => format!("'{id}'"),
            SqlValue::List(items) => items
                .iter()
                .map(SqlValue::to_literal)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Render without quoting or escaping (CSV-style output).
    pub fn to_plain(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Float(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::Timestamp(ts) => ts.format(TIME_FORMAT).to_string(),
            SqlValue::Uuid(id) => id.to_string(),
            SqlValue::List(items) => items
                .iter()
                .map(SqlValue::to_plain)
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_literal(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Text(_) => "text",
            SqlValue::Int(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::List(_) => "list",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

/// Escape a string for inclusion inside single quotes.
///
/// Follows the MySQL escape table: NUL, newline, carriage return, backslash,
/// both quote characters and Ctrl-Z are prefixed with a backslash.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

impl_from_value! {
    String => Text,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f64 => Float,
    bool => Bool,
    NaiveDateTime => Timestamp,
    Uuid => Uuid,
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        // shortest f32 digits, so 0.1f32 stays 0.1 once widened
        SqlValue::Float(v.to_string().parse().unwrap_or(f64::from(v)))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v.naive_utc())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(v: Vec<T>) -> Self {
        SqlValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// A Rust type that can be stored in a mapped column.
///
/// Implemented for the supported scalar types and `Option<T>` of each. A
/// field whose type does not implement this trait fails to compile under
/// `#[derive(Entity)]`.
pub trait ColumnType: Sized {
    const KIND: FieldKind;
    const NULLABLE: bool = false;

    fn to_sql_value(&self) -> SqlValue;

    fn from_sql_value(value: &SqlValue) -> Result<Self, String>;

    /// The value as a UUID, when this is a (valid) UUID column.
    fn as_uuid(&self) -> Option<Uuid> {
        None
    }

    /// Assign `id` only when the current value is zero. Returns whether the
    /// field now holds a usable identity.
    fn fill_uuid(&mut self, _id: Uuid) -> bool {
        false
    }

    /// Set to `now` when this is a timestamp column; otherwise no-op.
    fn touch(&mut self, _now: DateTime<Utc>) -> bool {
        false
    }
}

fn mismatch<T>(expected: &str, value: &SqlValue) -> Result<T, String> {
    Err(format!("expected {expected}, found {}", value.type_name()))
}

impl ColumnType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Uuid(id) => Ok(id.to_string()),
            other => mismatch("text", other),
        }
    }
}

macro_rules! impl_integer_column {
    ($($ty:ty),*) => {
        $(
            impl ColumnType for $ty {
                const KIND: FieldKind = FieldKind::Integer;

                fn to_sql_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }

                fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
                    match value {
                        SqlValue::Int(n) => <$ty>::try_from(*n)
                            .map_err(|_| format!("{n} does not fit in {}", stringify!($ty))),
                        SqlValue::Text(s) => s.parse().map_err(|e| format!("{e}")),
                        other => mismatch("integer", other),
                    }
                }
            }
        )*
    };
}

impl_integer_column!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_float_column {
    ($($ty:ty),*) => {
        $(
            impl ColumnType for $ty {
                const KIND: FieldKind = FieldKind::Float;

                fn to_sql_value(&self) -> SqlValue {
                    SqlValue::from(*self)
                }

                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
                    match value {
                        SqlValue::Float(f) => Ok(*f as $ty),
                        SqlValue::Int(n) => Ok(*n as $ty),
                        // exact decimals (NUMERIC) arrive as text
                        SqlValue::Text(s) => s.trim().parse::<$ty>().map_err(|e| e.to_string()),
                        SqlValue::Null => Ok(<$ty>::NAN),
                        other => mismatch("float", other),
                    }
                }
            }
        )*
    };
}

impl_float_column!(f32, f64);

impl ColumnType for bool {
    const KIND: FieldKind = FieldKind::Boolean;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(n) => Ok(*n != 0),
            other => mismatch("boolean", other),
        }
    }
}

impl ColumnType for NaiveDateTime {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Timestamp(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Timestamp(ts) => Ok(*ts),
            SqlValue::Text(s) => {
                NaiveDateTime::parse_from_str(s, TIME_FORMAT).map_err(|e| e.to_string())
            }
            other => mismatch("timestamp", other),
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) -> bool {
        *self = now.naive_utc();
        true
    }
}

impl ColumnType for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Timestamp(self.naive_utc())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
        NaiveDateTime::from_sql_value(value).map(|ts| ts.and_utc())
    }

    fn touch(&mut self, now: DateTime<Utc>) -> bool {
        *self = now;
        true
    }
}

impl ColumnType for Uuid {
    const KIND: FieldKind = FieldKind::Uuid;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Uuid(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Uuid(id) => Ok(*id),
            SqlValue::Text(s) => Uuid::parse_str(s).map_err(|e| e.to_string()),
            other => mismatch("uuid", other),
        }
    }

    fn as_uuid(&self) -> Option<Uuid> {
        Some(*self)
    }

    fn fill_uuid(&mut self, id: Uuid) -> bool {
        if self.is_nil() {
            *self = id;
        }
        true
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, T::to_sql_value)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }

    fn as_uuid(&self) -> Option<Uuid> {
        self.as_ref().and_then(T::as_uuid)
    }

    fn fill_uuid(&mut self, id: Uuid) -> bool {
        match self {
            Some(inner) => inner.fill_uuid(id),
            None if T::KIND == FieldKind::Uuid => {
                let mut inner = match T::from_sql_value(&SqlValue::Uuid(id)) {
                    Ok(inner) => inner,
                    Err(_) => return false,
                };
                let filled = inner.fill_uuid(id);
                *self = Some(inner);
                filled
            }
            None => false,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) -> bool {
        if T::KIND != FieldKind::Timestamp {
            return false;
        }
        match self {
            Some(inner) => inner.touch(now),
            None => match T::from_sql_value(&SqlValue::Timestamp(now.naive_utc())) {
                Ok(inner) => {
                    *self = Some(inner);
                    true
                }
                Err(_) => false,
            },
        }
    }
}

/// Decode a column value, attaching the column name on failure.
pub fn decode_column<T: ColumnType>(column: &str, value: &SqlValue) -> OrmResult<T> {
    T::from_sql_value(value).map_err(|message| OrmError::decode(column, message))
}
