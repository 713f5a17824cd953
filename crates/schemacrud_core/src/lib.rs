//! Schema-driven CRUD over SQLite.
//! Models are declared as data; SQL for each request shape is compiled once
//! per model, cached, and executed with positional bindings.

pub mod config;
pub mod cruder;
pub mod db;
pub mod logging;
pub mod query;
pub mod request;
pub mod schema;

pub use config::{ConfigError, CoreConfig, DatabaseConfig, LoggingConfig};
pub use cruder::{
    CrudError, CrudOutcome, CrudResult, Cruder, CruderRegistry, ExecutionOutcome, Record,
};
pub use db::{Database, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use query::{
    CompiledStatement, CreateViolation, CrudType, QueryError, ShapeKey, StatementCache,
};
pub use request::{CrudRequest, FieldFilter, FieldValue, FilterOp, RequestError, Scalar};
pub use schema::{Field, FieldKind, Model, ModelSpec, SchemaError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
