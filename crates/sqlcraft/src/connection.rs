//! Connections, drivers and connection configuration.

use crate::builder::ColumnCache;
use crate::dialect::{Dialect, Operation};
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::handle::DbHandle;
use crate::mock::MockHandle;
use crate::model::Model;
use crate::query::Query;
use crate::record::Record;
use crate::statement::Statement;
use crate::trace::log_sql;
use crate::value::SqlValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Deadline used by [`connect_db`](crate::connect_db).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings, as served by a [`SecretStore`](crate::SecretStore).
///
/// Missing fields default to empty strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub dialect: Dialect,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// ODBC data source name.
    #[serde(default)]
    pub dsn: String,
}

impl Config {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            database: String::new(),
            host: String::new(),
            port: String::new(),
            user: String::new(),
            password: String::new(),
            dsn: String::new(),
        }
    }

    /// Driver connection string for the configured dialect.
    pub fn connection_url(&self) -> String {
        let Config {
            database,
            host,
            port,
            user,
            password,
            dsn,
            ..
        } = self;
        match self.dialect {
            Dialect::MySql => format!("{user}:{password}@({host})/{database}?parseTime=true"),
            Dialect::Postgres => format!(
                "host={host} port={port} user={user} password={password} dbname={database} sslmode=disable"
            ),
            Dialect::MsSql => format!("sqlserver://{user}:{password}@{host}?database={database}"),
            Dialect::Snowflake => format!("{user}:{password}@{host}/{database}"),
            Dialect::Odbc => format!("DSN={dsn};UID={user};password={password}"),
            Dialect::Mock => "mock://".to_string(),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{}:{}/{}",
            self.dialect.discriminant(),
            self.user,
            self.host,
            self.port,
            self.database
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dialect", &self.dialect)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dsn", &self.dsn)
            .finish()
    }
}

/// Opens handles for one dialect.
#[async_trait]
pub trait Driver: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn open(&self, config: &Config) -> OrmResult<Box<dyn DbHandle>>;
}

/// Opens [`MockHandle`]s.
#[derive(Debug, Clone, Default)]
pub struct MockDriver;

#[async_trait]
impl Driver for MockDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Mock
    }

    async fn open(&self, _config: &Config) -> OrmResult<Box<dyn DbHandle>> {
        Ok(Box::new(MockHandle::new()))
    }
}

/// Dialect to driver mapping.
///
/// `Drivers::default()` holds the built-in drivers (mock, plus postgres with
/// the `postgres` feature); `Drivers::new()` starts empty.
#[derive(Clone)]
pub struct Drivers {
    drivers: HashMap<Dialect, Arc<dyn Driver>>,
}

impl Drivers {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Register `driver` for its dialect, replacing any previous one.
    pub fn register(&mut self, driver: impl Driver + 'static) -> &mut Self {
        self.drivers.insert(driver.dialect(), Arc::new(driver));
        self
    }

    pub fn contains(&self, dialect: Dialect) -> bool {
        self.drivers.contains_key(&dialect)
    }

    pub fn get(&self, dialect: Dialect) -> OrmResult<Arc<dyn Driver>> {
        self.drivers
            .get(&dialect)
            .cloned()
            .ok_or(OrmError::DriverUnavailable {
                dialect: dialect.discriminant(),
            })
    }
}

impl Default for Drivers {
    fn default() -> Self {
        let mut drivers = Self::new();
        drivers.register(MockDriver);
        #[cfg(feature = "postgres")]
        drivers.register(crate::postgres::PgDriver);
        drivers
    }
}

impl fmt::Debug for Drivers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.drivers.keys()).finish()
    }
}

/// What `create_many` does when the batch statement fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchFallback {
    /// Return the batch error.
    #[default]
    Fail,
    /// Retry each row on its own and stop at the first failing row. Rows
    /// before it stay written.
    RowByRow,
}

/// A database handle bound to a dialect.
pub struct Connection {
    handle: Box<dyn DbHandle>,
    dialect: Dialect,
    columns: ColumnCache,
    batch_fallback: BatchFallback,
}

impl Connection {
    pub fn new(dialect: Dialect, handle: Box<dyn DbHandle>) -> Self {
        Self {
            handle,
            dialect,
            columns: ColumnCache::new(),
            batch_fallback: BatchFallback::default(),
        }
    }

    pub fn from_handle(dialect: Dialect, handle: impl DbHandle + 'static) -> Self {
        Self::new(dialect, Box::new(handle))
    }

    pub fn with_batch_fallback(mut self, fallback: BatchFallback) -> Self {
        self.batch_fallback = fallback;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    pub fn handle(&self) -> &dyn DbHandle {
        self.handle.as_ref()
    }

    pub fn column_cache(&self) -> &ColumnCache {
        &self.columns
    }

    pub fn batch_fallback(&self) -> BatchFallback {
        self.batch_fallback
    }

    pub fn debug(&self) -> bool {
        self.handle.debug()
    }

    pub fn set_debug(&self, debug: bool) {
        self.handle.set_debug(debug);
    }

    pub async fn ping(&self) -> OrmResult<()> {
        self.handle.ping().await
    }

    pub async fn close(&self) -> OrmResult<()> {
        self.handle.close().await
    }

    /// Execute a statement written with `?` placeholders.
    pub async fn exec(&self, stmt: &Statement) -> OrmResult<u64> {
        let sql = self.dialect.translate_sql(stmt.sql());
        log_sql(self.debug(), self.dialect_name(), "exec", &sql, stmt.args().len());
        self.handle
            .exec(&sql, stmt.args())
            .await
            .map_err(|e| e.with_statement(&stmt.to_literal_sql()))
    }

    /// Execute SQL written with `:name` parameters.
    pub async fn named_exec(&self, sql: &str, params: &HashMap<String, SqlValue>) -> OrmResult<u64> {
        let stmt = Statement::from_named(sql, |name| params.get(name).cloned())?;
        self.exec(&stmt).await
    }

    /// Run a query written with `?` placeholders; `IN (?)` lists are expanded.
    pub async fn query(&self, stmt: Statement) -> OrmResult<Vec<Record>> {
        let stmt = crate::builder::expand_in(stmt)?;
        let sql = self.dialect.translate_sql(stmt.sql());
        log_sql(self.debug(), self.dialect_name(), "query", &sql, stmt.args().len());
        self.handle
            .query(&sql, stmt.args())
            .await
            .map_err(|e| e.with_statement(&stmt.to_literal_sql()))
    }

    /// Write pre-rendered literal tuples under one insert prefix.
    pub async fn write_tuples(&self, insert_stmt: &str, tuples: &[String]) -> OrmResult<u64> {
        self.exec(&Statement::new(format!("{insert_stmt}{}", tuples.join(","))))
            .await
    }

    pub async fn create<E: Entity>(&self, mut model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.create(self.handle(), &mut model).await
    }

    pub async fn create_update<E: Entity>(&self, mut model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.create_update(self.handle(), &mut model).await
    }

    /// Bulk insert. See [`BatchFallback`] for failure handling; batch writes
    /// are not atomic either way.
    pub async fn create_many<E: Entity>(&self, mut model: Model<'_, E>) -> OrmResult<()> {
        let err = match self.dialect.create_many(self.handle(), &mut model).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        let retry = self.batch_fallback == BatchFallback::RowByRow
            && matches!(err, OrmError::Execution { .. });
        let Model::Many(values) = &mut model else {
            return Err(err);
        };
        if !retry {
            return Err(err);
        }

        tracing::warn!(
            target: "sqlcraft",
            dialect = self.dialect_name(),
            rows = values.len(),
            error = %err,
            "batch insert failed, retrying row by row"
        );
        for (row, value) in values.iter_mut().enumerate() {
            let result = self
                .dialect
                .create(self.handle(), &mut Model::one(value))
                .await;
            if let Err(e) = result {
                tracing::warn!(target: "sqlcraft", row, error = %e, "row insert failed");
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn create_many_temp<E: Entity>(&self, mut model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.create_many_temp(self.handle(), &mut model).await
    }

    pub async fn create_many_update<E: Entity>(&self, mut model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.create_many_update(self.handle(), &mut model).await
    }

    pub async fn update<E: Entity>(&self, mut model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.update(self.handle(), &mut model).await
    }

    pub async fn destroy<E: Entity>(&self, model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.destroy(self.handle(), &model).await
    }

    pub async fn destroy_many<E: Entity>(&self, model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.destroy_many(self.handle(), &model).await
    }

    pub async fn select_one<E: Entity>(&self, mut model: Model<'_, E>, query: &Query) -> OrmResult<()> {
        self.dialect
            .select_one(self.handle(), &self.columns, &mut model, query)
            .await
    }

    pub async fn select_many<E: Entity>(&self, mut model: Model<'_, E>, query: &Query) -> OrmResult<()> {
        self.dialect
            .select_many(self.handle(), &self.columns, &mut model, query)
            .await
    }

    pub async fn sql_view<E: Entity>(
        &self,
        mut model: Model<'_, E>,
        format: Option<&HashMap<String, String>>,
    ) -> OrmResult<()> {
        self.dialect.sql_view(self.handle(), &mut model, format).await
    }

    pub async fn truncate<E: Entity>(&self, model: Model<'_, E>) -> OrmResult<()> {
        self.dialect.truncate(self.handle(), &model).await
    }

    /// Whether the dialect implements `op`.
    pub fn supports(&self, op: Operation) -> bool {
        self.dialect.supports(op)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("dialect", &self.dialect)
            .field("batch_fallback", &self.batch_fallback)
            .finish_non_exhaustive()
    }
}

async fn open_and_ping(driver: &dyn Driver, config: &Config) -> OrmResult<Box<dyn DbHandle>> {
    let handle = driver.open(config).await?;
    if let Err(err) = handle.ping().await {
        let _ = handle.close().await;
        return Err(OrmError::Connection(format!("ping {config}: {err}")));
    }
    Ok(handle)
}

/// Connect with the built-in drivers and no deadline.
pub async fn connect(config: &Config) -> OrmResult<Connection> {
    connect_with(&Drivers::default(), config).await
}

/// Connect with `drivers` and no deadline.
pub async fn connect_with(drivers: &Drivers, config: &Config) -> OrmResult<Connection> {
    let driver = drivers.get(config.dialect)?;
    let handle = open_and_ping(driver.as_ref(), config).await?;
    tracing::debug!(target: "sqlcraft", %config, "connected");
    Ok(Connection::new(config.dialect, handle))
}

/// Connect with `drivers`, giving up after `timeout`.
///
/// The attempt runs as a spawned task; when the deadline passes first,
/// `OrmError::Timeout` is returned and a connection that completes later is
/// closed.
pub async fn connect_timeout(
    drivers: &Drivers,
    config: &Config,
    timeout: Duration,
) -> OrmResult<Connection> {
    let driver = drivers.get(config.dialect)?;
    let attempt_config = config.clone();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let result = open_and_ping(driver.as_ref(), &attempt_config).await;
        if let Err(Ok(handle)) = tx.send(result) {
            tracing::warn!(
                target: "sqlcraft",
                config = %attempt_config,
                "connection completed after the deadline, closing it"
            );
            let _ = handle.close().await;
        }
    });

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => {
            let handle = result?;
            tracing::debug!(target: "sqlcraft", %config, "connected");
            Ok(Connection::new(config.dialect, handle))
        }
        Ok(Err(_)) => Err(OrmError::Connection(format!(
            "connection attempt to {config} was abandoned"
        ))),
        Err(_) => Err(OrmError::Timeout(timeout)),
    }
}
