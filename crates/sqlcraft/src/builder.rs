//! SELECT composition, `IN (?)` expansion and the per-connection column cache.

use crate::dialect::{Dialect, Pagination};
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::query::Query;
use crate::statement::{PLACEHOLDER, Statement, rewrite_placeholders};
use crate::value::SqlValue;
use regex::Regex;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

fn in_regex() -> &'static Regex {
    static IN_RE: OnceLock<Regex> = OnceLock::new();
    IN_RE.get_or_init(|| Regex::new(r"(?i)\bin\s*\(\s*\?\s*\)").expect("invalid built-in IN regex"))
}

/// Compose `query` against `table` into a statement with `?` placeholders.
///
/// The dialect decides where the row limit goes (`TOP n` before the column
/// list, or `LIMIT n` after `ORDER BY`). Placeholder translation happens at
/// execution time.
pub fn build_select(
    query: &Query,
    table: &str,
    columns: &[&str],
    dialect: Dialect,
) -> OrmResult<Statement> {
    let stmt = match &query.raw {
        Some(raw) => raw.clone().into_statement(),
        None => compose(query, table, columns, dialect),
    };
    expand_in(stmt)
}

fn compose(query: &Query, table: &str, columns: &[&str], dialect: Dialect) -> Statement {
    let mut stmt = Statement::new("SELECT ");
    let limit = query.limit;

    if let (Pagination::Top, Some(n)) = (dialect.pagination(), limit) {
        stmt.push(&format!("TOP {n} "));
    }
    stmt.push(&format!("{} FROM {table}", columns.join(",")));

    if !query.where_clauses.is_empty() {
        stmt.push_statement(Statement::with_args(
            format!(" WHERE {}", query.where_clauses.join(" AND ")),
            query.where_clauses.args(),
        ));
    }
    if !query.order_clauses.is_empty() {
        stmt.push_statement(Statement::with_args(
            format!(" ORDER BY {}", query.order_clauses.join(", ")),
            query.order_clauses.args(),
        ));
    }
    if let (Pagination::Limit, Some(n)) = (dialect.pagination(), limit) {
        stmt.push(&format!(" LIMIT {n}"));
    }
    stmt
}

/// Expand list arguments bound to `IN (?)` into one placeholder per element.
///
/// Statements without an `IN (?)` pattern are returned unchanged. An empty
/// list cannot be expanded and is rejected.
pub fn expand_in(stmt: Statement) -> OrmResult<Statement> {
    if !in_regex().is_match(stmt.sql()) {
        return Ok(stmt);
    }

    let (sql, args) = stmt.into_parts();
    if let Some(pos) = args
        .iter()
        .position(|a| matches!(a, SqlValue::List(items) if items.is_empty()))
    {
        return Err(OrmError::InvalidQuery(format!(
            "empty list bound to placeholder {} in IN (?)",
            pos + 1
        )));
    }

    let mut flat = Vec::with_capacity(args.len());
    let expanded = rewrite_placeholders(&sql, |idx| match args.get(idx) {
        Some(SqlValue::List(items)) => {
            flat.extend(items.iter().cloned());
            vec![PLACEHOLDER.to_string(); items.len()].join(", ")
        }
        Some(other) => {
            flat.push(other.clone());
            PLACEHOLDER.to_string()
        }
        None => PLACEHOLDER.to_string(),
    });
    Ok(Statement::with_args(expanded, flat))
}

/// Column lists per entity type, computed once per connection.
#[derive(Debug, Default)]
pub struct ColumnCache {
    inner: Mutex<HashMap<TypeId, Arc<[&'static str]>>>,
}

impl ColumnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns for `E`, computing and caching them on first use.
    pub fn columns<E: Entity>(&self) -> Arc<[&'static str]> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(TypeId::of::<E>())
            .or_insert_with(|| E::columns().into())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLS: &[&str] = &["id", "name"];

    #[test]
    fn limit_follows_order_by() {
        let query = Query::new()
            .filter("name = ?", ["asdf"])
            .order_by("name")
            .order_by("id DESC")
            .limit(10);
        let stmt = build_select(&query, "test", COLS, Dialect::MySql).unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT id,name FROM test WHERE name = ? ORDER BY name, id DESC LIMIT 10"
        );
        assert_eq!(stmt.args(), &[SqlValue::from("asdf")]);
    }

    #[test]
    fn top_precedes_columns() {
        let query = Query::new().filter("name = ?", ["asdf"]).limit(5);
        let stmt = build_select(&query, "test", COLS, Dialect::MsSql).unwrap();
        assert_eq!(stmt.sql(), "SELECT TOP 5 id,name FROM test WHERE name = ?");
    }

    #[test]
    fn where_clauses_are_and_joined() {
        let query = Query::new()
            .filter("a = ?", [1_i64])
            .filter("b = ?", [2_i64]);
        let stmt = build_select(&query, "t", &["a"], Dialect::Postgres).unwrap();
        assert_eq!(stmt.sql(), "SELECT a FROM t WHERE a = ? AND b = ?");
        assert_eq!(stmt.args(), &[SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn raw_query_skips_composition() {
        let query = Query::raw("SELECT 1 WHERE x = ?", [3_i64]).limit(9);
        let stmt = build_select(&query, "ignored", COLS, Dialect::MySql).unwrap();
        assert_eq!(stmt.sql(), "SELECT 1 WHERE x = ?");
        assert_eq!(stmt.args(), &[SqlValue::Int(3)]);
    }

    #[test]
    fn in_placeholder_expands_lists() {
        let query = Query::new()
            .filter("a = ?", [SqlValue::Int(1)])
            .filter("id in ( ? )", [SqlValue::from(vec!["x", "y", "z"])]);
        let stmt = build_select(&query, "t", &["id"], Dialect::MySql).unwrap();
        assert_eq!(stmt.sql(), "SELECT id FROM t WHERE a = ? AND id in ( ?, ?, ? )");
        assert_eq!(stmt.args().len(), 4);
        assert_eq!(stmt.args()[3], SqlValue::from("z"));
    }

    #[test]
    fn empty_in_list_is_rejected() {
        let query = Query::new().filter("id IN (?)", [SqlValue::List(vec![])]);
        let err = build_select(&query, "t", &["id"], Dialect::MySql).unwrap_err();
        assert!(matches!(err, OrmError::InvalidQuery(_)));
    }

    #[test]
    fn function_calls_ending_in_in_are_not_expanded() {
        for sql in ["SELECT min(?) FROM t", "SELECT join(?) FROM t"] {
            let stmt = Statement::with_args(sql, vec![SqlValue::from(vec![1_i64, 2])]);
            let out = expand_in(stmt).unwrap();
            assert_eq!(out.sql(), sql);
            assert_eq!(out.args().len(), 1);
        }
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let stmt = build_select(&Query::new().limit(0), "t", &["a"], Dialect::MySql).unwrap();
        assert_eq!(stmt.sql(), "SELECT a FROM t");
    }
}
