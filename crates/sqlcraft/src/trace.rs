//! `tracing` output for executed SQL.
//!
//! Every statement is emitted on the `sqlcraft.sql` target: at `INFO` when the
//! handle's debug flag is set, otherwise at `TRACE`.

/// Longest SQL (in bytes) written to a log event.
pub const MAX_LOGGED_SQL: usize = 4096;

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Collapse runs of whitespace so multi-line view templates log on one line.
pub(crate) fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn display_sql(sql: &str) -> String {
    let normalized = normalize_sql(sql);
    let shown = truncate_sql_bytes(&normalized, MAX_LOGGED_SQL);
    if shown.len() < normalized.len() {
        format!("{shown}...")
    } else {
        normalized
    }
}

/// Emit one executed statement.
pub(crate) fn log_sql(debug: bool, dialect: &str, operation: &str, sql: &str, param_count: usize) {
    let sql = display_sql(sql);
    if debug {
        tracing::info!(target: "sqlcraft.sql", dialect, operation, param_count, sql = %sql);
    } else {
        tracing::trace!(target: "sqlcraft.sql", dialect, operation, param_count, sql = %sql);
    }
}
