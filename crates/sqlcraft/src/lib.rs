//! # sqlcraft
//!
//! Map plain Rust structs to SQL statements and run them against several
//! backends through one dialect-neutral API.
//!
//! ## Features
//!
//! - **Derived descriptors**: `#[derive(Entity)]` turns a struct into a table mapping
//! - **Statement crafting**: insert, upsert, bulk insert, update, delete, truncate and DDL
//! - **Dialects**: mysql, postgres, mssql, snowflake and odbc with explicit capability sets
//! - **Parameterized by default**: statements carry `?` placeholders plus arguments and are
//!   translated per backend (`$1` for postgres, `@p1` for mssql)
//! - **Pluggable drivers**: postgres ships built in, others are registered at runtime
//!
//! ## Example
//!
//! ```ignore
//! use sqlcraft::{Entity, Model, Query};
//!
//! #[derive(Entity, Default)]
//! #[orm(table = "users")]
//! struct User {
//!     #[orm(column)]
//!     id: uuid::Uuid,
//!     #[orm(column)]
//!     name: String,
//!     #[orm(column)]
//!     created_at: Option<chrono::DateTime<chrono::Utc>>,
//! }
//!
//! let conn = sqlcraft::connect_db(&sqlcraft::EnvSecretStore::from_dotenv(), "dev").await?;
//!
//! let mut user = User { name: "alice".into(), ..Default::default() };
//! conn.create(Model::one(&mut user)).await?;
//!
//! let mut users = Vec::new();
//! let query = Query::new().filter("name = ?", ["alice"]).limit(10);
//! conn.select_many(Model::many(&mut users), &query).await?;
//! ```

extern crate self as sqlcraft;

pub mod builder;
pub mod clause;
pub mod columns;
pub mod connection;
pub mod craft;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod handle;
pub mod mock;
pub mod model;
pub mod query;
pub mod record;
pub mod registry;
pub mod secrets;
pub mod statement;
pub mod value;

mod generic;
mod trace;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use builder::{ColumnCache, build_select, expand_in};
pub use clause::{Clause, Clauses};
pub use columns::{Column, UUID_LENGTH, schema_ddl, widen};
pub use connection::{
    BatchFallback, Config, Connection, DEFAULT_CONNECT_TIMEOUT, Driver, Drivers, MockDriver,
    connect, connect_timeout, connect_with,
};
pub use craft::{
    craft_create, craft_create_many, craft_create_many_temp, craft_create_many_update,
    craft_create_update, craft_destroy, craft_destroy_many, craft_sql_view, craft_truncate,
    craft_update, insert_ignore_stmt, insert_stmt, insert_temp_stmt, interpolate, replace_stmt,
    select_stmt, truncate_stmt,
};
pub use dialect::{Dialect, Operation, Pagination};
pub use entity::{Entity, FieldDef, FieldKind};
pub use error::{MappingError, OrmError, OrmResult};
pub use handle::DbHandle;
pub use mock::{Executed, MockHandle};
pub use model::Model;
pub use query::Query;
pub use record::Record;
pub use registry::{EntityRegistration, find_entity, registered_entities};
pub use secrets::{EnvSecretStore, SecretStore, TomlSecretStore, connect_db, connect_db_timeout};
pub use statement::{PLACEHOLDER, Statement};
pub use trace::MAX_LOGGED_SQL;
pub use value::{ColumnType, SqlValue, TIME_FORMAT, decode_column, escape_string};

#[cfg(feature = "postgres")]
pub use postgres::{PgDriver, PgHandle};

#[cfg(feature = "derive")]
pub use sqlcraft_derive::Entity;

// Used by the derive macro's generated code.
pub use chrono;
pub use inventory;
pub use uuid;
