//! Operation algorithms shared by every dialect.
//!
//! Each function crafts a statement, translates it for the dialect, logs it
//! and runs it on the handle. Driver failures come back as
//! `OrmError::Execution` carrying the literal form of the statement.

use crate::builder::{ColumnCache, build_select};
use crate::craft;
use crate::dialect::{Dialect, Operation};
use crate::entity::Entity;
use crate::error::{MappingError, OrmError, OrmResult};
use crate::handle::DbHandle;
use crate::model::Model;
use crate::query::Query;
use crate::record::Record;
use crate::statement::Statement;
use crate::trace::log_sql;
use std::collections::HashMap;

/// Run a write statement, returning affected rows.
pub(crate) async fn exec(
    db: &dyn DbHandle,
    dialect: Dialect,
    op: Operation,
    stmt: &Statement,
) -> OrmResult<u64> {
    let sql = dialect.translate_sql(stmt.sql());
    log_sql(db.debug(), dialect.name(), op.as_str(), &sql, stmt.args().len());
    db.exec(&sql, stmt.args())
        .await
        .map_err(|e| e.with_statement(&stmt.to_literal_sql()))
}

async fn fetch_one(
    db: &dyn DbHandle,
    dialect: Dialect,
    op: Operation,
    stmt: &Statement,
) -> OrmResult<Record> {
    let sql = dialect.translate_sql(stmt.sql());
    log_sql(db.debug(), dialect.name(), op.as_str(), &sql, stmt.args().len());
    db.get(&sql, stmt.args())
        .await
        .map_err(|e| e.with_statement(&stmt.to_literal_sql()))
}

async fn fetch_all(
    db: &dyn DbHandle,
    dialect: Dialect,
    op: Operation,
    stmt: &Statement,
) -> OrmResult<Vec<Record>> {
    let sql = dialect.translate_sql(stmt.sql());
    log_sql(db.debug(), dialect.name(), op.as_str(), &sql, stmt.args().len());
    db.select(&sql, stmt.args())
        .await
        .map_err(|e| e.with_statement(&stmt.to_literal_sql()))
}

fn decode_all<E: Entity>(rows: &[Record]) -> OrmResult<Vec<E>> {
    rows.iter().map(E::from_record).collect()
}

pub(crate) async fn create<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_create(model)?;
    exec(db, dialect, Operation::Create, &stmt).await?;
    Ok(())
}

pub(crate) async fn create_update<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_create_update(model)?;
    exec(db, dialect, Operation::CreateUpdate, &stmt).await?;
    Ok(())
}

pub(crate) async fn create_many<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_create_many(model)?;
    exec(db, dialect, Operation::CreateMany, &stmt).await?;
    Ok(())
}

pub(crate) async fn create_many_temp<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_create_many_temp(model)?;
    exec(db, dialect, Operation::CreateManyTemp, &stmt).await?;
    Ok(())
}

pub(crate) async fn create_many_update<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_create_many_update(model)?;
    exec(db, dialect, Operation::CreateManyUpdate, &stmt).await?;
    Ok(())
}

/// Fails with `NoRows` when nothing matched the identity.
pub(crate) async fn update<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_update(model)?;
    let affected = exec(db, dialect, Operation::Update, &stmt).await?;
    if affected == 0 {
        let where_id = model.where_id()?.into_statement().to_literal_sql();
        return Err(OrmError::no_rows(format!("query updated 0 rows: {where_id}")));
    }
    Ok(())
}

pub(crate) async fn destroy<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_destroy(model)?;
    exec(db, dialect, Operation::Destroy, &stmt).await?;
    Ok(())
}

pub(crate) async fn destroy_many<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_destroy_many(model)?;
    exec(db, dialect, Operation::DestroyMany, &stmt).await?;
    Ok(())
}

/// Load the first matching row into a single entity.
pub(crate) async fn select_one<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    cache: &ColumnCache,
    model: &mut Model<'_, E>,
    query: &Query,
) -> OrmResult<()> {
    let Model::One(value) = model else {
        return Err(MappingError::ExpectedSingle {
            operation: "select_one",
        }
        .into());
    };
    let columns = cache.columns::<E>();
    let stmt = build_select(query, E::TABLE, &columns, dialect)?;
    let row = fetch_one(db, dialect, Operation::SelectOne, &stmt).await?;
    **value = E::from_record(&row)?;
    Ok(())
}

/// Replace a collection with every matching row.
pub(crate) async fn select_many<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    cache: &ColumnCache,
    model: &mut Model<'_, E>,
    query: &Query,
) -> OrmResult<()> {
    let Model::Many(values) = model else {
        return Err(MappingError::ExpectedCollection {
            operation: "select_many",
        }
        .into());
    };
    let columns = cache.columns::<E>();
    let stmt = build_select(query, E::TABLE, &columns, dialect)?;
    let rows = fetch_all(db, dialect, Operation::SelectMany, &stmt).await?;
    **values = decode_all(&rows)?;
    Ok(())
}

/// Run the entity's SQL view: one row into a single entity, every row into a
/// collection.
pub(crate) async fn sql_view<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &mut Model<'_, E>,
    format: Option<&HashMap<String, String>>,
) -> OrmResult<()> {
    let stmt = craft::craft_sql_view(model, format)?;
    match model {
        Model::One(value) => {
            let row = fetch_one(db, dialect, Operation::SqlView, &stmt).await?;
            **value = E::from_record(&row)?;
        }
        Model::Many(values) => {
            let rows = fetch_all(db, dialect, Operation::SqlView, &stmt).await?;
            **values = decode_all(&rows)?;
        }
    }
    Ok(())
}

pub(crate) async fn truncate<E: Entity>(
    db: &dyn DbHandle,
    dialect: Dialect,
    model: &Model<'_, E>,
) -> OrmResult<()> {
    let stmt = craft::craft_truncate(model);
    exec(db, dialect, Operation::Truncate, &stmt).await?;
    Ok(())
}
