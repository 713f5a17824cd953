//! SQLite storage bootstrap and the shared database handle.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Hand out pooled connections to concurrent CRUD calls with a bounded wait.
//! - Create model tables that do not exist yet.
//!
//! # Invariants
//! - Every pooled connection has the configured busy timeout.
//! - In-memory databases use exactly one connection so all callers share data.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
mod pool;
mod tables;

pub use pool::{Database, StatementDeadline};
pub use tables::{ensure_table, ensure_tables, table_exists};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    AcquireTimeout { waited_ms: u128 },
    InvalidConfig(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::AcquireTimeout { waited_ms } => {
                write!(f, "no database connection became available within {waited_ms} ms")
            }
            Self::InvalidConfig(message) => write!(f, "invalid database config: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::AcquireTimeout { .. } | Self::InvalidConfig(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
