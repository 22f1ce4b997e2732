//! Graph store access: connection management, parameterized statements and
//! transactional execution.
//!
//! Every repository operation runs inside exactly one SQLite transaction via
//! [`Db::transaction`]. Statements are produced by `graph::queries` and only
//! ever carry bound parameters.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use crate::error::{GraphError, Result};

pub mod migrate;

/// Busy timeout used when none is configured
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// An executable statement: SQL text plus positional parameters (`?1`, `?2`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: &'static str,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(text: &'static str, params: Vec<Value>) -> Self {
        Self { text, params }
    }
}

/// One result row, columns in SELECT order
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(columns: Vec<Value>) -> Self {
        Self(columns)
    }

    fn column(&self, idx: usize) -> Result<&Value> {
        self.0.get(idx).ok_or_else(|| {
            GraphError::internal(format!("row has {} columns, wanted index {}", self.0.len(), idx))
        })
    }

    pub fn text(&self, idx: usize) -> Result<&str> {
        match self.column(idx)? {
            Value::Text(s) => Ok(s),
            other => Err(GraphError::internal(format!("column {}: expected text, found {:?}", idx, other))),
        }
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<&str>> {
        match self.column(idx)? {
            Value::Null => Ok(None),
            _ => self.text(idx).map(Some),
        }
    }

    /// SQLite hands back whole-number REALs unchanged, but integers bound by
    /// hand (or computed columns) come back as Integer; accept both.
    pub fn real(&self, idx: usize) -> Result<f64> {
        match self.column(idx)? {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => Err(GraphError::internal(format!("column {}: expected number, found {:?}", idx, other))),
        }
    }

    pub fn opt_real(&self, idx: usize) -> Result<Option<f64>> {
        match self.column(idx)? {
            Value::Null => Ok(None),
            _ => self.real(idx).map(Some),
        }
    }

    pub fn timestamp(&self, idx: usize) -> Result<DateTime<Utc>> {
        let raw = self.text(idx)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| GraphError::internal(format!("column {}: bad timestamp {:?}: {}", idx, raw, e)))
    }
}

/// Handle to an open transaction. Dropping it without commit rolls back.
pub struct Tx<'c> {
    inner: Transaction<'c>,
}

impl Tx<'_> {
    /// Run a statement and collect every row it returns
    pub fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        log::debug!("query: {} {:?}", statement.text, statement.params);
        let mut stmt = self.inner.prepare_cached(statement.text)?;
        let width = stmt.column_count();
        let rows = stmt.query_map(rusqlite::params_from_iter(statement.params.iter()), |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Row::new)
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Run a write statement, returning the number of affected rows
    pub fn execute(&self, statement: &Statement) -> Result<usize> {
        log::debug!("execute: {} {:?}", statement.text, statement.params);
        let mut stmt = self.inner.prepare_cached(statement.text)?;
        Ok(stmt.execute(rusqlite::params_from_iter(statement.params.iter()))?)
    }

    /// True when the statement yields at least one row
    pub fn exists(&self, statement: &Statement) -> Result<bool> {
        Ok(!self.query(statement)?.is_empty())
    }
}

/// Database connection wrapper
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// How long a statement waits on a locked database before failing as unavailable
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        task::spawn_blocking(move || {
            let mut conn = open(&path, busy_timeout)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| GraphError::internal(format!("blocking store task failed: {}", e)))?
    }

    /// Run `f` inside one atomic transaction. Commits on `Ok`, rolls back on `Err`.
    ///
    /// The write lock is taken up front (`BEGIN IMMEDIATE`), so a concurrent
    /// writer is waited out under the busy timeout.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.run(TransactionBehavior::Immediate, f).await
    }

    /// Run a single read-only statement in its own deferred transaction
    pub async fn query(&self, statement: Statement) -> Result<Vec<Row>> {
        self.run(TransactionBehavior::Deferred, move |tx| tx.query(&statement)).await
    }

    async fn run<F, T>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_connection(move |conn| {
            let tx = Tx { inner: conn.transaction_with_behavior(behavior)? };
            let out = f(&tx)?;
            tx.inner.commit()?;
            Ok(out)
        })
        .await
    }
}

fn open(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;

    // WAL for concurrent readers, foreign keys so edges can never dangle
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY;"
    )?;

    Ok(conn)
}
