//! Backend dialects.
//!
//! Each [`Dialect`] variant carries an explicit set of supported
//! [`Operation`]s. The operations themselves are shared by every dialect and
//! differ only in placeholder syntax and pagination.

use crate::builder::ColumnCache;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::generic;
use crate::handle::DbHandle;
use crate::model::Model;
use crate::query::Query;
use crate::statement::rewrite_placeholders;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A capability a dialect may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    CreateUpdate,
    CreateMany,
    CreateManyTemp,
    CreateManyUpdate,
    Update,
    Destroy,
    DestroyMany,
    SelectOne,
    SelectMany,
    SqlView,
    Truncate,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::Create,
        Operation::CreateUpdate,
        Operation::CreateMany,
        Operation::CreateManyTemp,
        Operation::CreateManyUpdate,
        Operation::Update,
        Operation::Destroy,
        Operation::DestroyMany,
        Operation::SelectOne,
        Operation::SelectMany,
        Operation::SqlView,
        Operation::Truncate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::CreateUpdate => "create_update",
            Operation::CreateMany => "create_many",
            Operation::CreateManyTemp => "create_many_temp",
            Operation::CreateManyUpdate => "create_many_update",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
            Operation::DestroyMany => "destroy_many",
            Operation::SelectOne => "select_one",
            Operation::SelectMany => "select_many",
            Operation::SqlView => "sql_view",
            Operation::Truncate => "truncate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a row limit is placed in a SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `SELECT TOP n cols FROM ...`
    Top,
    /// `... ORDER BY ... LIMIT n`
    Limit,
}

/// A SQL backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgres")]
    Postgres,
    #[serde(rename = "microsoft_sql", alias = "mssql")]
    MsSql,
    #[serde(rename = "snowflake")]
    Snowflake,
    #[serde(rename = "odbc")]
    Odbc,
    #[serde(rename = "mock")]
    Mock,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::MsSql,
        Dialect::Snowflake,
        Dialect::Odbc,
        Dialect::Mock,
    ];

    /// Short name, as reported by a connection.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::MsSql => "mssql",
            Dialect::Snowflake => "snowflake",
            Dialect::Odbc => "odbc",
            Dialect::Mock => "mock",
        }
    }

    /// Configuration discriminant.
    pub fn discriminant(self) -> &'static str {
        match self {
            Dialect::MsSql => "microsoft_sql",
            other => other.name(),
        }
    }

    pub fn supports(self, op: Operation) -> bool {
        use Operation::*;
        match self {
            Dialect::Snowflake => true,
            Dialect::MySql | Dialect::Odbc => op != CreateManyTemp,
            Dialect::Postgres | Dialect::MsSql => {
                !matches!(op, CreateUpdate | CreateManyTemp | CreateManyUpdate)
            }
            Dialect::Mock => false,
        }
    }

    /// Supported operations, in declaration order.
    pub fn operations(self) -> impl Iterator<Item = Operation> {
        Operation::ALL.into_iter().filter(move |op| self.supports(*op))
    }

    /// `Ok(())` when `op` is supported, otherwise `OrmError::Unsupported`.
    pub fn ensure(self, op: Operation) -> OrmResult<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(OrmError::Unsupported {
                dialect: self.name(),
                operation: op,
            })
        }
    }

    pub fn pagination(self) -> Pagination {
        match self {
            Dialect::MsSql => Pagination::Top,
            _ => Pagination::Limit,
        }
    }

    /// Rewrite portable `?` placeholders into the backend's syntax.
    ///
    /// Postgres uses `$1, $2, ...`, SQL Server `@p1, @p2, ...`; other
    /// backends take `?` as is. Quoted text is never touched.
    pub fn translate_sql(self, sql: &str) -> String {
        match self {
            Dialect::Postgres => rewrite_placeholders(sql, |i| format!("${}", i + 1)),
            Dialect::MsSql => rewrite_placeholders(sql, |i| format!("@p{}", i + 1)),
            _ => sql.to_string(),
        }
    }

    pub async fn create<E: Entity>(self, db: &dyn DbHandle, model: &mut Model<'_, E>) -> OrmResult<()> {
        self.ensure(Operation::Create)?;
        generic::create(db, self, model).await
    }

    pub async fn create_update<E: Entity>(
        self,
        db: &dyn DbHandle,
        model: &mut Model<'_, E>,
    ) -> OrmResult<()> {
        self.ensure(Operation::CreateUpdate)?;
        generic::create_update(db, self, model).await
    }

    pub async fn create_many<E: Entity>(
        self,
        db: &dyn DbHandle,
        model: &mut Model<'_, E>,
    ) -> OrmResult<()> {
        self.ensure(Operation::CreateMany)?;
        generic::create_many(db, self, model).await
    }

    pub async fn create_many_temp<E: Entity>(
        self,
        db: &dyn DbHandle,
        model: &mut Model<'_, E>,
    ) -> OrmResult<()> {
        self.ensure(Operation::CreateManyTemp)?;
        generic::create_many_temp(db, self, model).await
    }

    pub async fn create_many_update<E: Entity>(
        self,
        db: &dyn DbHandle,
        model: &mut Model<'_, E>,
    ) -> OrmResult<()> {
        self.ensure(Operation::CreateManyUpdate)?;
        generic::create_many_update(db, self, model).await
    }

    pub async fn update<E: Entity>(self, db: &dyn DbHandle, model: &mut Model<'_, E>) -> OrmResult<()> {
        self.ensure(Operation::Update)?;
        generic::update(db, self, model).await
    }

    pub async fn destroy<E: Entity>(self, db: &dyn DbHandle, model: &Model<'_, E>) -> OrmResult<()> {
        self.ensure(Operation::Destroy)?;
        generic::destroy(db, self, model).await
    }

    pub async fn destroy_many<E: Entity>(
        self,
        db: &dyn DbHandle,
        model: &Model<'_, E>,
    ) -> OrmResult<()> {
        self.ensure(Operation::DestroyMany)?;
        generic::destroy_many(db, self, model).await
    }

    pub async fn select_one<E: Entity>(
        self,
        db: &dyn DbHandle,
        cache: &ColumnCache,
        model: &mut Model<'_, E>,
        query: &Query,
    ) -> OrmResult<()> {
        self.ensure(Operation::SelectOne)?;
        generic::select_one(db, self, cache, model, query).await
    }

    pub async fn select_many<E: Entity>(
        self,
        db: &dyn DbHandle,
        cache: &ColumnCache,
        model: &mut Model<'_, E>,
        query: &Query,
    ) -> OrmResult<()> {
        self.ensure(Operation::SelectMany)?;
        generic::select_many(db, self, cache, model, query).await
    }

    pub async fn sql_view<E: Entity>(
        self,
        db: &dyn DbHandle,
        model: &mut Model<'_, E>,
        format: Option<&HashMap<String, String>>,
    ) -> OrmResult<()> {
        self.ensure(Operation::SqlView)?;
        generic::sql_view(db, self, model, format).await
    }

    pub async fn truncate<E: Entity>(self, db: &dyn DbHandle, model: &Model<'_, E>) -> OrmResult<()> {
        self.ensure(Operation::Truncate)?;
        generic::truncate(db, self, model).await
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgres" => Ok(Dialect::Postgres),
            "microsoft_sql" | "mssql" => Ok(Dialect::MsSql),
            "snowflake" => Ok(Dialect::Snowflake),
            "odbc" => Ok(Dialect::Odbc),
            "mock" => Ok(Dialect::Mock),
            other => Err(OrmError::Config(format!("unrecognized dialect `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_discriminants() {
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("microsoft_sql".parse::<Dialect>().unwrap(), Dialect::MsSql);
        assert_eq!("mssql".parse::<Dialect>().unwrap(), Dialect::MsSql);
        assert_eq!("Snowflake".parse::<Dialect>().unwrap(), Dialect::Snowflake);
        let err = "sqlite".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn mssql_name_differs_from_discriminant() {
        assert_eq!(Dialect::MsSql.name(), "mssql");
        assert_eq!(Dialect::MsSql.discriminant(), "microsoft_sql");
        for dialect in Dialect::ALL {
            assert_eq!(dialect.discriminant().parse::<Dialect>().unwrap(), dialect);
        }
    }

    #[test]
    fn supported_sets() {
        use Operation::*;
        assert!(Dialect::Snowflake.operations().eq(Operation::ALL));
        assert!(!Dialect::MySql.supports(CreateManyTemp));
        assert!(Dialect::MySql.supports(CreateManyUpdate));
        assert!(!Dialect::Odbc.supports(CreateManyTemp));
        for dialect in [Dialect::Postgres, Dialect::MsSql] {
            assert!(!dialect.supports(CreateUpdate));
            assert!(!dialect.supports(CreateManyUpdate));
            assert!(!dialect.supports(CreateManyTemp));
            assert!(dialect.supports(Update));
        }
        assert_eq!(Dialect::Mock.operations().count(), 0);
    }

    #[test]
    fn ensure_names_dialect_and_operation() {
        let err = Dialect::Postgres.ensure(Operation::CreateUpdate).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(
            err.to_string(),
            "operation `create_update` is not supported by the postgres dialect"
        );
    }

    #[test]
    fn translates_placeholders() {
        let sql = "SELECT a FROM t WHERE a = ? AND b = '?' AND c = ?";
        assert_eq!(
            Dialect::Postgres.translate_sql(sql),
            "SELECT a FROM t WHERE a = $1 AND b = '?' AND c = $2"
        );
        assert_eq!(
            Dialect::MsSql.translate_sql(sql),
            "SELECT a FROM t WHERE a = @p1 AND b = '?' AND c = @p2"
        );
        assert_eq!(Dialect::MySql.translate_sql(sql), sql);
    }

    #[test]
    fn serde_uses_discriminants() {
        #[derive(Deserialize)]
        struct Wrapper {
            dialect: Dialect,
        }
        let w: Wrapper = toml::from_str("dialect = \"microsoft_sql\"").unwrap();
        assert_eq!(w.dialect, Dialect::MsSql);
        let w: Wrapper = toml::from_str("dialect = \"mssql\"").unwrap();
        assert_eq!(w.dialect, Dialect::MsSql);
    }
}
