//! The per-call wrapper around a caller-owned entity or collection.

use crate::clause::Clause;
use crate::columns::{Column, schema_ddl, widen};
use crate::entity::Entity;
use crate::error::MappingError;
use crate::statement::Statement;
use crate::value::SqlValue;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A single entity or a homogeneous collection of them.
///
/// Built per operation around a caller-owned value; write operations assign
/// identities and touch timestamps through it.
#[derive(Debug)]
pub enum Model<'a, E: Entity> {
    One(&'a mut E),
    Many(&'a mut Vec<E>),
}

impl<'a, E: Entity> Model<'a, E> {
    pub fn one(value: &'a mut E) -> Self {
        Model::One(value)
    }

    pub fn many(values: &'a mut Vec<E>) -> Self {
        Model::Many(values)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Model::Many(_))
    }

    /// Number of wrapped entities.
    pub fn len(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements().is_empty()
    }

    pub fn elements(&self) -> &[E] {
        match self {
            Model::One(value) => std::slice::from_ref(&**value),
            Model::Many(values) => values.as_slice(),
        }
    }

    pub fn table_name(&self) -> &'static str {
        E::TABLE
    }

    /// Mapped column names in declaration order.
    pub fn column_slice(&self) -> Vec<&'static str> {
        E::columns()
    }

    /// Mapped column names joined with `,`.
    pub fn columns(&self) -> String {
        self.column_slice().join(",")
    }

    /// Backtick-quoted column names joined with `,`.
    pub fn columns_safe(&self) -> String {
        self.column_slice()
            .iter()
            .map(|c| format!("`{c}`"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `:col` tokens joined with `, `.
    pub fn tokenized_string(&self) -> String {
        self.column_slice()
            .iter()
            .map(|c| format!(":{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `col = :col` for every mutable column.
    ///
    /// The identity and `created_at` columns are immutable after insert.
    pub fn update_string(&self) -> String {
        self.column_slice()
            .into_iter()
            .filter(|c| !is_immutable::<E>(c))
            .map(|c| format!("{c} = :{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `ON DUPLICATE KEY UPDATE col=VALUES(col),...` over every column.
    pub fn duplicate_stmt(&self) -> String {
        let assignments = self
            .column_slice()
            .iter()
            .map(|c| format!("{c}=VALUES({c})"))
            .collect::<Vec<_>>()
            .join(",");
        format!("ON DUPLICATE KEY UPDATE {assignments}")
    }

    fn single(&self, operation: &'static str) -> Result<&E, MappingError> {
        match self {
            Model::One(value) => Ok(&**value),
            Model::Many(_) => Err(MappingError::ExpectedSingle { operation }),
        }
    }

    fn collection(&self, operation: &'static str) -> Result<&[E], MappingError> {
        match self {
            Model::One(_) => Err(MappingError::ExpectedCollection { operation }),
            Model::Many(values) if values.is_empty() => {
                Err(MappingError::EmptyCollection { operation })
            }
            Model::Many(values) => Ok(values.as_slice()),
        }
    }

    /// Value of the identity field.
    pub fn id(&self) -> Result<SqlValue, MappingError> {
        let value = self.single("id")?;
        match value.identity() {
            Some(id) if !id.is_null() => Ok(id),
            _ => Err(MappingError::MissingIdentity { table: E::TABLE }),
        }
    }

    /// Equality predicate on the identity column, e.g. `id=?`.
    pub fn where_id(&self) -> Result<Clause, MappingError> {
        let id = self.id()?;
        let column = E::ID_COLUMN.ok_or(MappingError::MissingIdentity { table: E::TABLE })?;
        Ok(Clause::new(format!("{column}=?"), vec![id]))
    }

    /// The literal `VALUES` tuple, e.g. `('uuid','asdf',7)`.
    pub fn string_tuple(&self) -> Result<String, MappingError> {
        Ok(literal_tuple(self.single("string_tuple")?))
    }

    /// Unquoted field renderings in column order.
    pub fn string_slice(&self) -> Result<Vec<String>, MappingError> {
        Ok(self
            .single("string_slice")?
            .values()
            .iter()
            .map(SqlValue::to_plain)
            .collect())
    }

    /// Literal tuples for every element of a collection.
    ///
    /// Each element is prepared for insert first (identity assigned,
    /// timestamps touched).
    pub fn to_tuples(&mut self) -> Result<Vec<String>, MappingError> {
        self.collection("to_tuples")?;
        self.prepare_insert(Utc::now());
        Ok(self.elements().iter().map(literal_tuple).collect())
    }

    /// The attached SQL view template.
    pub fn sql_view(&self) -> Result<&'static str, MappingError> {
        E::SQL_VIEW.ok_or(MappingError::MissingSqlView { table: E::TABLE })
    }

    /// Apply `f` to each element of a collection, or once for a single value.
    pub fn iterate<F, T>(&mut self, mut f: F) -> Result<(), T>
    where
        F: FnMut(&mut E) -> Result<(), T>,
    {
        match self {
            Model::One(value) => f(&mut **value),
            Model::Many(values) => values.iter_mut().try_for_each(f),
        }
    }

    fn for_each(&mut self, mut f: impl FnMut(&mut E)) {
        let _ = self.iterate(|e| {
            f(e);
            Ok::<(), std::convert::Infallible>(())
        });
    }

    /// Assign a fresh UUID to every element whose identity is still zero.
    pub fn set_id(&mut self) {
        self.for_each(|e| {
            e.assign_id(Uuid::new_v4());
        });
    }

    pub fn touch_created_at(&mut self, now: DateTime<Utc>) {
        self.for_each(|e| {
            e.touch_created_at(now);
        });
    }

    pub fn touch_updated_at(&mut self, now: DateTime<Utc>) {
        self.for_each(|e| {
            e.touch_updated_at(now);
        });
    }

    /// Identity assignment plus both timestamps, sharing one `now`.
    pub fn prepare_insert(&mut self, now: DateTime<Utc>) {
        self.set_id();
        self.touch_created_at(now);
        self.touch_updated_at(now);
    }

    /// Infer column metadata, widening text lengths across a collection.
    pub fn to_columns(&self) -> Vec<Column> {
        let mut samples = self.elements().iter().map(|e| {
            let values = e.values();
            E::FIELDS
                .iter()
                .zip(values.iter().map(Some).chain(std::iter::repeat(None)))
                .map(|(def, value)| Column::infer(def, value))
                .collect::<Vec<_>>()
        });

        let mut schema = samples
            .next()
            .unwrap_or_else(|| E::FIELDS.iter().map(|def| Column::infer(def, None)).collect());
        for sample in samples {
            widen(&mut schema, &sample);
        }
        schema
    }

    /// DDL column list for the inferred schema.
    pub fn schema(&self) -> String {
        schema_ddl(&self.to_columns())
    }
}

impl<'a, E: Entity> From<&'a mut E> for Model<'a, E> {
    fn from(value: &'a mut E) -> Self {
        Model::One(value)
    }
}

impl<'a, E: Entity> From<&'a mut Vec<E>> for Model<'a, E> {
    fn from(values: &'a mut Vec<E>) -> Self {
        Model::Many(values)
    }
}

fn is_immutable<E: Entity>(column: &str) -> bool {
    column == "id"
        || column == "created_at"
        || E::ID_COLUMN == Some(column)
        || E::CREATED_AT_COLUMN == Some(column)
}

fn literal_tuple<E: Entity>(entity: &E) -> String {
    let parts: Vec<String> = entity.values().iter().map(SqlValue::to_literal).collect();
    format!("({})", parts.join(","))
}

/// Append a parenthesized placeholder tuple binding every field of `entity`.
pub(crate) fn bind_tuple<E: Entity>(stmt: &mut Statement, entity: &E) {
    stmt.push("(");
    stmt.push_bind_list(entity.values());
    stmt.push(")");
}
