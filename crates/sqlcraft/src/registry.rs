//! Process-wide schema registry.
//!
//! `#[derive(Entity)]` submits an [`EntityRegistration`] for every
//! non-generic struct; the `inventory` crate collects them before `main`.

use crate::entity::{Entity, FieldDef};

/// Registration entry emitted by the derive macro.
#[derive(Debug, Clone, Copy)]
pub struct EntityRegistration {
    pub table: &'static str,
    pub type_name: &'static str,
    pub fields: &'static [FieldDef],
    pub id_column: Option<&'static str>,
}

impl EntityRegistration {
    pub const fn of<E: Entity>(type_name: &'static str) -> Self {
        Self {
            table: E::TABLE,
            type_name,
            fields: E::FIELDS,
            id_column: E::ID_COLUMN,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.column)
    }
}

inventory::collect!(EntityRegistration);

/// All registered entities.
pub fn registered_entities() -> impl Iterator<Item = &'static EntityRegistration> {
    inventory::iter::<EntityRegistration>.into_iter()
}

/// Find a registered entity by table name.
pub fn find_entity(table: &str) -> Option<&'static EntityRegistration> {
    registered_entities().find(|reg| reg.table == table)
}
