//! Where connection settings come from.
//!
//! A [`SecretStore`] resolves an environment name (`dev`, `prod`, ...) to a
//! [`Config`]. Two stores ship with the crate: process environment variables
//! and a TOML file laid out like the `secret/data/{env}/database` vault path.

use crate::connection::{Config, Connection, DEFAULT_CONNECT_TIMEOUT, Drivers, connect_timeout};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Source of database credentials.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn database_config(&self, env: &str) -> OrmResult<Config>;
}

/// Reads `{ENV}_DATABASE_{FIELD}` variables, e.g. `DEV_DATABASE_HOST`.
///
/// `DIALECT` is required; other fields default to empty.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    overrides: HashMap<String, String>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `.env` file into the process environment first, if one exists.
    pub fn from_dotenv() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            tracing::debug!(target: "sqlcraft", error = %err, "no .env file loaded");
        }
        Self::new()
    }

    /// Use `value` for `key` instead of the process environment.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    fn var(&self, env: &str, field: &str) -> Option<String> {
        let key = format!("{}_DATABASE_{}", env.to_uppercase(), field.to_uppercase());
        self.overrides
            .get(&key)
            .cloned()
            .or_else(|| std::env::var(&key).ok())
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn database_config(&self, env: &str) -> OrmResult<Config> {
        let dialect: Dialect = self
            .var(env, "dialect")
            .ok_or_else(|| OrmError::Config(format!("{env}: missing database dialect")))?
            .parse()?;
        let field = |name: &str| self.var(env, name).unwrap_or_default();
        Ok(Config {
            dialect,
            database: field("database"),
            host: field("host"),
            port: field("port"),
            user: field("user"),
            password: field("password"),
            dsn: field("dsn"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EnvSection {
    database: Config,
}

/// Per-environment `[env.database]` tables from a TOML document.
///
/// ```toml
/// [dev.database]
/// dialect = "postgres"
/// host = "localhost"
/// port = "5432"
/// user = "app"
/// password = "secret"
/// database = "app_dev"
/// ```
#[derive(Debug, Clone)]
pub struct TomlSecretStore {
    configs: HashMap<String, Config>,
}

impl TomlSecretStore {
    pub fn from_toml_str(content: &str) -> OrmResult<Self> {
        let sections: HashMap<String, EnvSection> = toml::from_str(content)
            .map_err(|e| OrmError::Config(format!("failed to parse secrets: {e}")))?;
        Ok(Self {
            configs: sections
                .into_iter()
                .map(|(env, section)| (env, section.database))
                .collect(),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrmError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}

#[async_trait]
impl SecretStore for TomlSecretStore {
    async fn database_config(&self, env: &str) -> OrmResult<Config> {
        self.configs
            .get(env)
            .cloned()
            .ok_or_else(|| OrmError::Config(format!("no database secrets for environment `{env}`")))
    }
}

/// Resolve `env` from `store` and connect with the built-in drivers, giving
/// up after five seconds.
pub async fn connect_db(store: &dyn SecretStore, env: &str) -> OrmResult<Connection> {
    connect_db_timeout(store, env, DEFAULT_CONNECT_TIMEOUT).await
}

/// [`connect_db`] with a custom deadline.
pub async fn connect_db_timeout(
    store: &dyn SecretStore,
    env: &str,
    timeout: Duration,
) -> OrmResult<Connection> {
    let config = store.database_config(env).await?;
    connect_timeout(&Drivers::default(), &config, timeout).await
}
