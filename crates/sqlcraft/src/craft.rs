//! Pure statement builders.
//!
//! Each `craft_*` function turns a [`Model`] into a [`Statement`] with `?`
//! placeholders. Write operations prepare the wrapped entities first
//! (identity assignment, timestamp touches), so callers observe the values
//! that were written.

use crate::entity::Entity;
use crate::error::{MappingError, OrmResult};
use crate::model::{Model, bind_tuple};
use crate::statement::Statement;
use crate::value::SqlValue;
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// `INSERT INTO {table} ({cols}) VALUES`
pub fn insert_stmt<E: Entity>() -> String {
    format!("INSERT INTO {} ({}) VALUES", E::TABLE, E::columns().join(","))
}

/// `INSERT INTO {table}_TEMP ({cols}) VALUES`
pub fn insert_temp_stmt<E: Entity>() -> String {
    format!(
        "INSERT INTO {}_TEMP ({}) VALUES",
        E::TABLE,
        E::columns().join(",")
    )
}

/// `INSERT IGNORE INTO {table} ({cols}) VALUES`
pub fn insert_ignore_stmt<E: Entity>() -> String {
    format!(
        "INSERT IGNORE INTO {} ({}) VALUES",
        E::TABLE,
        E::columns().join(",")
    )
}

/// `REPLACE INTO {table} ({cols}) VALUES`
pub fn replace_stmt<E: Entity>() -> String {
    format!("REPLACE INTO {} ({}) VALUES", E::TABLE, E::columns().join(","))
}

/// `SELECT {cols} FROM {table}`
pub fn select_stmt<E: Entity>() -> String {
    format!("SELECT {} FROM {}", E::columns().join(","), E::TABLE)
}

/// `TRUNCATE TABLE {table}`
pub fn truncate_stmt<E: Entity>() -> String {
    format!("TRUNCATE TABLE {}", E::TABLE)
}

fn single_insert<E: Entity>(
    model: &mut Model<'_, E>,
    prefix: String,
    operation: &'static str,
) -> OrmResult<Statement> {
    let Model::One(value) = model else {
        return Err(MappingError::ExpectedSingle { operation }.into());
    };
    Model::one(&mut **value).prepare_insert(Utc::now());

    let mut stmt = Statement::new(prefix);
    bind_tuple(&mut stmt, &**value);
    Ok(stmt)
}

fn bulk_insert<E: Entity>(
    model: &mut Model<'_, E>,
    prefix: String,
    operation: &'static str,
) -> OrmResult<Statement> {
    let values = match model {
        Model::One(_) => return Err(MappingError::ExpectedCollection { operation }.into()),
        Model::Many(values) if values.is_empty() => {
            return Err(MappingError::EmptyCollection { operation }.into());
        }
        Model::Many(values) => values,
    };
    Model::many(&mut **values).prepare_insert(Utc::now());

    let mut stmt = Statement::new(prefix);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            stmt.push(",");
        }
        bind_tuple(&mut stmt, value);
    }
    Ok(stmt)
}

/// Single-row insert. Assigns a fresh identity when it is zero and touches
/// both timestamps.
pub fn craft_create<E: Entity>(model: &mut Model<'_, E>) -> OrmResult<Statement> {
    single_insert(model, insert_stmt::<E>(), "create")
}

/// Single-row insert followed by `ON DUPLICATE KEY UPDATE`.
pub fn craft_create_update<E: Entity>(model: &mut Model<'_, E>) -> OrmResult<Statement> {
    let mut stmt = single_insert(model, insert_stmt::<E>(), "create_update")?;
    stmt.push(" ").push(&model.duplicate_stmt());
    Ok(stmt)
}

/// Multi-row insert sharing one `INSERT INTO` prefix.
pub fn craft_create_many<E: Entity>(model: &mut Model<'_, E>) -> OrmResult<Statement> {
    bulk_insert(model, insert_stmt::<E>(), "create_many")
}

/// Multi-row insert into the `{table}_TEMP` staging table.
pub fn craft_create_many_temp<E: Entity>(model: &mut Model<'_, E>) -> OrmResult<Statement> {
    bulk_insert(model, insert_temp_stmt::<E>(), "create_many_temp")
}

/// Multi-row upsert.
pub fn craft_create_many_update<E: Entity>(model: &mut Model<'_, E>) -> OrmResult<Statement> {
    let mut stmt = bulk_insert(model, insert_stmt::<E>(), "create_many_update")?;
    stmt.push(" ").push(&model.duplicate_stmt());
    Ok(stmt)
}

/// `UPDATE {table} SET col = ?, ... WHERE id=?`. Touches `updated_at`.
pub fn craft_update<E: Entity>(model: &mut Model<'_, E>) -> OrmResult<Statement> {
    if model.is_collection() {
        return Err(MappingError::ExpectedSingle {
            operation: "update",
        }
        .into());
    }
    model.where_id()?;
    model.touch_updated_at(Utc::now());

    let model = &*model;
    let named = format!("UPDATE {} SET {}", E::TABLE, model.update_string());
    let entity = model.elements().first();
    let mut stmt =
        Statement::from_named(&named, |column| entity.and_then(|e| e.value_of(column)))?;
    stmt.push(" WHERE ")
        .push_statement(model.where_id()?.into_statement());
    Ok(stmt)
}

/// `DELETE FROM {table} WHERE id=?`
pub fn craft_destroy<E: Entity>(model: &Model<'_, E>) -> OrmResult<Statement> {
    let where_id = model.where_id()?;
    let mut stmt = Statement::new(format!("DELETE FROM {} WHERE ", E::TABLE));
    stmt.push_statement(where_id.into_statement());
    Ok(stmt)
}

/// `DELETE FROM {table} WHERE id IN (?,?,...)`
///
/// Requires a non-empty collection of entities whose UUID identity is set.
pub fn craft_destroy_many<E: Entity>(model: &Model<'_, E>) -> OrmResult<Statement> {
    const OPERATION: &str = "destroy_many";
    let Model::Many(values) = model else {
        return Err(MappingError::ExpectedCollection {
            operation: OPERATION,
        }
        .into());
    };
    let column = E::uuid_id_column()?;
    if values.is_empty() {
        return Err(MappingError::EmptyCollection {
            operation: OPERATION,
        }
        .into());
    }

    let ids = values
        .iter()
        .map(|v| v.identity_uuid().map(SqlValue::Uuid))
        .collect::<Option<Vec<_>>>()
        .ok_or(MappingError::MissingIdentity { table: E::TABLE })?;
    let mut stmt = Statement::new(format!("DELETE FROM {} WHERE {column} IN (", E::TABLE));
    stmt.push_bind_list(ids).push(")");
    Ok(stmt)
}

/// `TRUNCATE TABLE {table}`
pub fn craft_truncate<E: Entity>(_model: &Model<'_, E>) -> Statement {
    Statement::new(truncate_stmt::<E>())
}

fn template_key_regex() -> &'static Regex {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    KEY_RE.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("invalid built-in template regex"))
}

/// Interpolate `{key}` tokens in `template` from `format`.
pub fn interpolate(template: &str, format: &HashMap<String, String>) -> OrmResult<String> {
    let re = template_key_regex();
    if let Some(missing) = re
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|key| !format.contains_key(key))
    {
        return Err(MappingError::MissingTemplateKey(missing).into());
    }
    Ok(re
        .replace_all(template, |caps: &regex::Captures<'_>| {
            format.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}

/// The entity's SQL view, with `{key}` tokens filled from `format`.
pub fn craft_sql_view<E: Entity>(
    model: &Model<'_, E>,
    format: Option<&HashMap<String, String>>,
) -> OrmResult<Statement> {
    let template = model.sql_view()?;
    let sql = match format {
        Some(format) => interpolate(template, format)?,
        None => template.to_string(),
    };
    Ok(Statement::new(sql))
}
