//! Shared connection pool.

use super::open::{open_connection, OpenTarget};
use super::{DbError, DbResult};
use crate::config::DatabaseConfig;
use log::warn;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

// Upper bound of one blocking wait before the pool is scanned again.
const ACQUIRE_POLL: Duration = Duration::from_millis(5);
// SQLite VM instructions between two deadline checks.
const DEADLINE_CHECK_OPS: i32 = 1_000;

/// Database handle shared by every `Cruder`.
///
/// Holds a fixed set of connections, each behind its own mutex, handed out
/// round-robin. Safe to share across threads behind an `Arc`.
pub struct Database {
    connections: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
    acquire_timeout: Duration,
    statement_timeout: Duration,
}

impl Database {
    /// Opens the database described by `config`.
    ///
    /// A missing `path` opens an in-memory database with a single connection.
    pub fn open(config: &DatabaseConfig) -> DbResult<Self> {
        config
            .validate()
            .map_err(|err| DbError::InvalidConfig(err.to_string()))?;

        let (target, size) = match config.path.as_deref() {
            Some(path) => (OpenTarget::File(path), config.pool_size),
            None => (OpenTarget::Memory, 1),
        };

        let connections = (0..size)
            .map(|_| open_connection(target, config.busy_timeout()).map(Mutex::new))
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Self {
            connections,
            cursor: AtomicUsize::new(0),
            acquire_timeout: config.acquire_timeout(),
            statement_timeout: config.statement_timeout(),
        })
    }

    /// Opens a private in-memory database with default timeouts.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&DatabaseConfig::default())
    }

    pub fn pool_size(&self) -> usize {
        self.connections.len()
    }

    /// Borrows one connection, waiting at most the configured acquire timeout.
    ///
    /// # Errors
    /// `AcquireTimeout` when every connection stays busy for the whole wait.
    pub fn acquire(&self) -> DbResult<MutexGuard<'_, Connection>> {
        let len = self.connections.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        let started_at = Instant::now();
        let deadline = started_at + self.acquire_timeout;

        let mut waits = 0;
        loop {
            for offset in 0..len {
                if let Some(guard) = self.connections[(start + offset) % len].try_lock() {
                    return Ok(guard);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(ACQUIRE_POLL);
            if let Some(guard) = self.connections[(start + waits) % len].try_lock_for(slice) {
                return Ok(guard);
            }
            waits += 1;
        }

        let waited_ms = started_at.elapsed().as_millis();
        warn!(
            "event=db_acquire module=db status=error pool_size={len} waited_ms={waited_ms} error_code=acquire_timeout"
        );
        Err(DbError::AcquireTimeout { waited_ms })
    }

    /// Interrupts statements on `conn` that run past the configured statement
    /// timeout, until the returned guard is dropped.
    ///
    /// An interrupted statement fails with `SQLITE_INTERRUPT`.
    pub fn arm_deadline<'c>(&self, conn: &'c Connection) -> StatementDeadline<'c> {
        let deadline = Instant::now() + self.statement_timeout;
        conn.progress_handler(DEADLINE_CHECK_OPS, Some(move || Instant::now() >= deadline));
        StatementDeadline { conn }
    }
}

/// Active statement deadline on one connection. Dropping it removes the
/// progress handler.
pub struct StatementDeadline<'c> {
    conn: &'c Connection,
}

impl Drop for StatementDeadline<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(DEADLINE_CHECK_OPS, None::<fn() -> bool>);
    }
}
