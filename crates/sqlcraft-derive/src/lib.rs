//! Derive macros for sqlcraft
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod entity;

/// Derive `Entity` for a struct.
///
/// # Example
///
/// ```ignore
/// use sqlcraft::Entity;
///
/// #[derive(Entity, Default)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(column)]
///     id: uuid::Uuid,
///     #[orm(column = "user_name")]
///     name: String,
///     #[orm(column)]
///     created_at: Option<chrono::DateTime<chrono::Utc>>,
///     cached: Vec<u8>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name (defaults to the struct name)
/// - `#[orm(view = "SELECT ...")]` - SQL view template, `{key}` placeholders allowed
/// - `#[orm(column)]` - Map the field to a column of the same name
/// - `#[orm(column = "name")]` - Map the field to a differently named column
/// - `#[orm(id)]` - Mark the identity field (a mapped field named `id` is the default)
///
/// Fields without `column` or `id` are ignored by every statement and filled
/// with `Default::default()` when rows are decoded.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
