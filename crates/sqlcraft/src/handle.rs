//! The minimal database handle the dialect algorithms run against.

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::SqlValue;
use async_trait::async_trait;

/// A live database handle.
///
/// SQL passed here has already been translated to the backend's placeholder
/// syntax. Implementations report failures as [`OrmError::Driver`] (or
/// [`OrmError::NoRows`]); the caller attaches the statement.
#[async_trait]
pub trait DbHandle: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn exec(&self, sql: &str, args: &[SqlValue]) -> OrmResult<u64>;

    /// Run a query and collect every row.
    async fn query(&self, sql: &str, args: &[SqlValue]) -> OrmResult<Vec<Record>>;

    /// First row of a query; `NoRows` when the result is empty.
    async fn get(&self, sql: &str, args: &[SqlValue]) -> OrmResult<Record> {
        self.query(sql, args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::no_rows("no rows in result set"))
    }

    /// Every row of a query.
    async fn select(&self, sql: &str, args: &[SqlValue]) -> OrmResult<Vec<Record>> {
        self.query(sql, args).await
    }

    async fn ping(&self) -> OrmResult<()>;

    async fn close(&self) -> OrmResult<()>;

    /// Whether executed SQL is logged at `INFO` rather than `TRACE`.
    fn debug(&self) -> bool;

    fn set_debug(&self, debug: bool);
}
