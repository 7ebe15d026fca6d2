//! In-memory handle for tests.

use crate::error::{OrmError, OrmResult};
use crate::handle::DbHandle;
use crate::record::Record;
use crate::value::SqlValue;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A statement seen by a [`MockHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

#[derive(Debug, Default)]
struct MockState {
    executed: Vec<Executed>,
    results: VecDeque<Vec<Record>>,
    fail_on: Vec<String>,
    affected: Option<u64>,
}

/// A [`DbHandle`] that records statements instead of running them.
///
/// Clones share state, so a test can keep one clone and hand another to a
/// [`Connection`](crate::Connection).
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    debug: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<Record>) -> &Self {
        self.state().results.push_back(rows);
        self
    }

    /// Fail every statement whose SQL contains `fragment`.
    pub fn fail_on(&self, fragment: impl Into<String>) -> &Self {
        self.state().fail_on.push(fragment.into());
        self
    }

    /// Fix the affected-row count reported by `exec`. Defaults to 1.
    pub fn set_affected(&self, rows: u64) -> &Self {
        self.state().affected = Some(rows);
        self
    }

    /// Every statement seen so far, in order.
    pub fn executed(&self) -> Vec<Executed> {
        self.state().executed.clone()
    }

    /// SQL of the most recent statement.
    pub fn last_sql(&self) -> Option<String> {
        self.state().executed.last().map(|e| e.sql.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str, args: &[SqlValue]) -> OrmResult<MutexGuard<'_, MockState>> {
        if self.is_closed() {
            return Err(OrmError::driver("sql: database is closed"));
        }
        let mut state = self.state();
        state.executed.push(Executed {
            sql: sql.to_string(),
            args: args.to_vec(),
        });
        if let Some(fragment) = state.fail_on.iter().find(|f| sql.contains(f.as_str())) {
            return Err(OrmError::driver(format!("mock failure on `{fragment}`")));
        }
        Ok(state)
    }
}

#[async_trait]
impl DbHandle for MockHandle {
    async fn exec(&self, sql: &str, args: &[SqlValue]) -> OrmResult<u64> {
        let state = self.record(sql, args)?;
        Ok(state.affected.unwrap_or(1))
    }

    async fn query(&self, sql: &str, args: &[SqlValue]) -> OrmResult<Vec<Record>> {
        let mut state = self.record(sql, args)?;
        Ok(state.results.pop_front().unwrap_or_default())
    }

    async fn ping(&self) -> OrmResult<()> {
        if self.is_closed() {
            return Err(OrmError::Connection("mock handle is closed".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }
}
