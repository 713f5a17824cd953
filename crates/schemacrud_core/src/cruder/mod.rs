//! Per-model CRUD executor.
//!
//! # Responsibility
//! - Validate, compile (once per shape), bind and execute generic CRUD calls.
//! - Reshape read rows into column-keyed records.
//!
//! # Invariants
//! - Each operation issues exactly one statement execution and never retries.
//! - Literals are bound in the compiled statement's argument order.
//! - Failures come back as `CrudError`; nothing here aborts the process.

use crate::db::{Database, DbError};
use crate::query::{
    check_fields, compile, CompiledStatement, CreateViolation, CrudType, QueryError, StatementCache,
};
use crate::request::{CrudRequest, RequestError};
use crate::schema::Model;
use log::{debug, error};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Row};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

mod registry;

pub use registry::CruderRegistry;

/// One result row: column name as reported by the database to rendered value.
pub type Record = BTreeMap<String, Value>;

pub type CrudResult<T> = Result<T, CrudError>;

/// What a failed execution left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Create/update/delete failed; no row was changed.
    NothingApplied,
    /// Read failed after `rows_read` rows; the result was discarded.
    ReadTruncated { rows_read: usize },
}

#[derive(Debug)]
pub enum CrudError {
    Request(RequestError),
    InvalidCreate {
        model: String,
        violation: CreateViolation,
    },
    Query {
        model: String,
        source: QueryError,
    },
    Compile {
        model: String,
        crud_type: CrudType,
        sql: String,
        source: DbError,
    },
    QueryExecution {
        model: String,
        crud_type: CrudType,
        outcome: ExecutionOutcome,
        source: DbError,
    },
    UnknownModel(String),
    UnknownRoute(String),
}

impl CrudError {
    /// Stable short code for logs and transport responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(RequestError::UnsupportedValueType { .. }) => "unsupported_value_type",
            Self::Request(_) => "invalid_request",
            Self::InvalidCreate { .. } => "invalid_create",
            Self::Query { .. } => "invalid_query",
            Self::Compile { .. } => "compile_failed",
            Self::QueryExecution { .. } => "query_execution_failed",
            Self::UnknownModel(_) => "unknown_model",
            Self::UnknownRoute(_) => "unknown_route",
        }
    }
}

impl Display for CrudError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(err) => write!(f, "{err}"),
            Self::InvalidCreate { model, violation } => {
                write!(f, "invalid create on `{model}`: {violation}")
            }
            Self::Query { model, source } => write!(f, "invalid request on `{model}`: {source}"),
            Self::Compile {
                model,
                crud_type,
                sql,
                source,
            } => write!(f, "failed to compile {crud_type} on `{model}` ({sql}): {source}"),
            Self::QueryExecution {
                model,
                crud_type,
                outcome,
                source,
            } => match outcome {
                ExecutionOutcome::NothingApplied => {
                    write!(f, "{crud_type} on `{model}` failed, nothing applied: {source}")
                }
                ExecutionOutcome::ReadTruncated { rows_read } => write!(
                    f,
                    "read on `{model}` failed after {rows_read} rows: {source}"
                ),
            },
            Self::UnknownModel(model) => write!(f, "unknown model `{model}`"),
            Self::UnknownRoute(path) => write!(f, "no route for `{path}`"),
        }
    }
}

impl Error for CrudError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Request(err) => Some(err),
            Self::Query { source, .. } => Some(source),
            Self::Compile { source, .. } => Some(source),
            Self::QueryExecution { source, .. } => Some(source),
            Self::InvalidCreate { .. } | Self::UnknownModel(_) | Self::UnknownRoute(_) => None,
        }
    }
}

impl From<RequestError> for CrudError {
    fn from(value: RequestError) -> Self {
        Self::Request(value)
    }
}

/// Result of [`Cruder::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum CrudOutcome {
    Affected(usize),
    Records(Vec<Record>),
}

impl CrudOutcome {
    /// `[{...}, ...]` for reads, `{"affected": n}` otherwise.
    pub fn into_json(self) -> Value {
        match self {
            Self::Affected(count) => serde_json::json!({ "affected": count }),
            Self::Records(records) => Value::Array(
                records
                    .into_iter()
                    .map(|record| Value::Object(record.into_iter().collect()))
                    .collect(),
            ),
        }
    }
}

/// Per-model facade over the shared database and this model's statement cache.
pub struct Cruder {
    db: Arc<Database>,
    model: Arc<Model>,
    cache: StatementCache,
}

impl Cruder {
    pub fn new(db: Arc<Database>, model: Arc<Model>) -> Self {
        Self {
            db,
            model,
            cache: StatementCache::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn cache(&self) -> &StatementCache {
        &self.cache
    }

    /// Inserts one row. The request must carry exactly one value per column.
    ///
    /// Returns the number of inserted rows.
    pub fn create(&self, request: &CrudRequest) -> CrudResult<usize> {
        let started_at = Instant::now();
        let result = self
            .statement(CrudType::Create, request)
            .and_then(|statement| self.run_write(&statement, request));
        self.observe(CrudType::Create, started_at, result)
    }

    /// Selects rows matching every filter; no filters selects all rows.
    pub fn read(&self, request: &CrudRequest) -> CrudResult<Vec<Record>> {
        let started_at = Instant::now();
        let result = self
            .statement(CrudType::Read, request)
            .and_then(|statement| self.run_read(&statement, request));
        self.observe(CrudType::Read, started_at, result)
    }

    /// Updates the named columns of matching rows; other columns stay untouched.
    pub fn update(&self, request: &CrudRequest) -> CrudResult<usize> {
        let started_at = Instant::now();
        let result = self
            .statement(CrudType::Update, request)
            .and_then(|statement| self.run_write(&statement, request));
        self.observe(CrudType::Update, started_at, result)
    }

    /// Deletes matching rows.
    pub fn remove(&self, request: &CrudRequest) -> CrudResult<usize> {
        let started_at = Instant::now();
        let result = self
            .statement(CrudType::Delete, request)
            .and_then(|statement| self.run_write(&statement, request));
        self.observe(CrudType::Delete, started_at, result)
    }

    pub fn execute(&self, crud_type: CrudType, request: &CrudRequest) -> CrudResult<CrudOutcome> {
        match crud_type {
            CrudType::Create => self.create(request).map(CrudOutcome::Affected),
            CrudType::Read => self.read(request).map(CrudOutcome::Records),
            CrudType::Update => self.update(request).map(CrudOutcome::Affected),
            CrudType::Delete => self.remove(request).map(CrudOutcome::Affected),
        }
    }

    fn statement(
        &self,
        crud_type: CrudType,
        request: &CrudRequest,
    ) -> CrudResult<Arc<CompiledStatement>> {
        let shape = request.shape(crud_type);
        check_fields(&self.model, &shape).map_err(|err| self.query_error(err))?;
        let key = shape.key();
        self.cache.get_or_compile(&key, || {
            let started_at = Instant::now();
            let compiled = compile(&self.model, &shape).map_err(|err| self.query_error(err))?;

            // Preparing proves the template is valid SQL for the live table.
            let conn = self
                .db
                .acquire()
                .map_err(|source| self.compile_error(&compiled, source))?;
            conn.prepare_cached(compiled.sql())
                .map_err(|err| self.compile_error(&compiled, DbError::from(err)))?;

            debug!(
                "event=statement_compile module=cruder status=ok model={} key={} duration_ms={}",
                self.model.name(),
                key,
                started_at.elapsed().as_millis()
            );
            Ok(compiled)
        })
    }

    fn run_write(
        &self,
        statement: &CompiledStatement,
        request: &CrudRequest,
    ) -> CrudResult<usize> {
        let arguments = statement.bind(request).map_err(|err| self.query_error(err))?;
        let fail = |source: DbError| {
            self.execution_error(statement, ExecutionOutcome::NothingApplied, source)
        };

        let conn = self.db.acquire().map_err(fail)?;
        let _deadline = self.db.arm_deadline(&conn);
        let mut stmt = conn
            .prepare_cached(statement.sql())
            .map_err(|err| fail(err.into()))?;
        let changed = stmt
            .execute(params_from_iter(arguments))
            .map_err(|err| fail(err.into()))?;
        Ok(changed)
    }

    fn run_read(
        &self,
        statement: &CompiledStatement,
        request: &CrudRequest,
    ) -> CrudResult<Vec<Record>> {
        let arguments = statement.bind(request).map_err(|err| self.query_error(err))?;
        let fail = |rows_read: usize, source: DbError| {
            self.execution_error(statement, ExecutionOutcome::ReadTruncated { rows_read }, source)
        };

        let conn = self.db.acquire().map_err(|err| fail(0, err))?;
        let _deadline = self.db.arm_deadline(&conn);
        let mut stmt = conn
            .prepare_cached(statement.sql())
            .map_err(|err| fail(0, err.into()))?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut rows = stmt
            .query(params_from_iter(arguments))
            .map_err(|err| fail(0, err.into()))?;
        let mut records = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(err) => return Err(fail(records.len(), err.into())),
            };
            let record = match row_to_record(row, &columns) {
                Ok(record) => record,
                Err(err) => return Err(fail(records.len(), err.into())),
            };
            records.push(record);
        }

        Ok(records)
    }

    fn observe<T>(
        &self,
        crud_type: CrudType,
        started_at: Instant,
        result: CrudResult<T>,
    ) -> CrudResult<T> {
        match &result {
            Ok(_) => debug!(
                "event=crud module=cruder status=ok model={} crud={} duration_ms={}",
                self.model.name(),
                crud_type,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=crud module=cruder status=error model={} crud={} duration_ms={} error_code={} error={}",
                self.model.name(),
                crud_type,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    fn query_error(&self, err: QueryError) -> CrudError {
        let model = self.model.name().to_string();
        match err {
            QueryError::InvalidCreate(violation) => CrudError::InvalidCreate { model, violation },
            source => CrudError::Query { model, source },
        }
    }

    fn compile_error(&self, statement: &CompiledStatement, source: DbError) -> CrudError {
        CrudError::Compile {
            model: self.model.name().to_string(),
            crud_type: statement.crud_type(),
            sql: statement.sql().to_string(),
            source,
        }
    }

    fn execution_error(
        &self,
        statement: &CompiledStatement,
        outcome: ExecutionOutcome,
        source: DbError,
    ) -> CrudError {
        CrudError::QueryExecution {
            model: self.model.name().to_string(),
            crud_type: statement.crud_type(),
            outcome,
            source,
        }
    }
}

fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, column) in columns.iter().enumerate() {
        record.insert(column.clone(), render_value(row.get_ref(index)?));
    }
    Ok(record)
}

fn render_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(integer) => Value::String(integer.to_string()),
        ValueRef::Real(real) => Value::String(real.to_string()),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
        }
    }
}
