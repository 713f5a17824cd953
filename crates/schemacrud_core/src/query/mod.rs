//! Statement shapes, SQL compilation and the per-model statement cache.
//!
//! # Responsibility
//! - Derive a literal-free shape and cache key from each request.
//! - Compile shapes into parameterized SQL with a positional argument contract.
//! - Cache compiled statements so each shape compiles at most once.
//!
//! # Invariants
//! - SQL text contains identifiers from the schema registry only; every
//!   literal is a `?` placeholder.
//! - Requests with equal shapes map to the same `ShapeKey` whatever their literals.

use crate::request::{CrudRequest, FilterOp, Scalar};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod cache;
pub mod compiler;

pub use cache::StatementCache;
pub use compiler::{check_fields, compile};

pub type QueryResult<T> = Result<T, QueryError>;

/// The four generic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrudType {
    Create,
    Read,
    Update,
    Delete,
}

impl CrudType {
    pub const ALL: [CrudType; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for CrudType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a create request does not cover the model's columns exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateViolation {
    MissingColumns(Vec<String>),
    UnknownColumns(Vec<String>),
    DuplicateField(String),
}

impl Display for CreateViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumns(columns) => write!(f, "missing columns: {}", columns.join(", ")),
            Self::UnknownColumns(columns) => write!(f, "unknown columns: {}", columns.join(", ")),
            Self::DuplicateField(field) => write!(f, "field `{field}` given more than once"),
        }
    }
}

/// Shape rejected before any SQL is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidCreate(CreateViolation),
    UnknownField { model: String, field: String },
    DuplicateField(String),
    EmptyUpdate,
    MissingFilter(CrudType),
    UnexpectedValue { crud_type: CrudType, field: String },
    UnexpectedFilter { crud_type: CrudType, field: String },
    ArgumentMismatch { key: ShapeKey },
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCreate(violation) => write!(f, "invalid create: {violation}"),
            Self::UnknownField { model, field } => {
                write!(f, "model `{model}` has no field `{field}`")
            }
            Self::DuplicateField(field) => write!(f, "field `{field}` given more than once"),
            Self::EmptyUpdate => write!(f, "update requires at least one value"),
            Self::MissingFilter(crud_type) => {
                write!(f, "{crud_type} requires at least one `where` filter")
            }
            Self::UnexpectedValue { crud_type, field } => {
                write!(f, "{crud_type} takes no values, got `{field}`")
            }
            Self::UnexpectedFilter { crud_type, field } => {
                write!(f, "{crud_type} takes no `where` filters, got `{field}`")
            }
            Self::ArgumentMismatch { key } => {
                write!(f, "request does not match compiled shape `{key}`")
            }
        }
    }
}

impl Error for QueryError {}

/// Canonical cache key: crud type plus sorted filter and value names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey(String);

impl ShapeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ShapeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Literal-free description of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestShape {
    crud_type: CrudType,
    values: Vec<String>,
    filters: Vec<(String, FilterOp)>,
}

impl RequestShape {
    /// Expects `values` and `filters` in canonical order, as produced by
    /// [`CrudRequest::shape`].
    pub fn new(crud_type: CrudType, values: Vec<String>, filters: Vec<(String, FilterOp)>) -> Self {
        Self {
            crud_type,
            values,
            filters,
        }
    }

    pub fn crud_type(&self) -> CrudType {
        self.crud_type
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn filters(&self) -> &[(String, FilterOp)] {
        &self.filters
    }

    /// e.g. `read|where=status=|set=` or `update|where=id=|set=name,status`.
    pub fn key(&self) -> ShapeKey {
        let filters = self
            .filters
            .iter()
            .map(|(name, op)| format!("{name}{op}"))
            .collect::<Vec<_>>()
            .join(",");
        ShapeKey(format!(
            "{}|where={}|set={}",
            self.crud_type,
            filters,
            self.values.join(",")
        ))
    }
}

/// Where a positional argument is taken from in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentSlot {
    /// Index into `CrudRequest::values()`.
    Value(usize),
    /// Index into `CrudRequest::filters()`.
    Filter(usize),
}

/// Compiled SQL template with its binding contract. Never mutated once cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    key: ShapeKey,
    crud_type: CrudType,
    sql: String,
    arguments: Vec<ArgumentSlot>,
}

impl CompiledStatement {
    pub fn key(&self) -> &ShapeKey {
        &self.key
    }

    pub fn crud_type(&self) -> CrudType {
        self.crud_type
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Argument slots in placeholder order.
    pub fn arguments(&self) -> &[ArgumentSlot] {
        &self.arguments
    }

    /// Picks the request literals in placeholder order.
    ///
    /// # Errors
    /// `ArgumentMismatch` when the request does not have the compiled shape.
    pub fn bind<'r>(&self, request: &'r CrudRequest) -> QueryResult<Vec<&'r Scalar>> {
        let mismatch = || QueryError::ArgumentMismatch {
            key: self.key.clone(),
        };
        self.arguments
            .iter()
            .map(|slot| match *slot {
                ArgumentSlot::Value(index) => request
                    .values()
                    .get(index)
                    .map(|value| &value.value)
                    .ok_or_else(mismatch),
                ArgumentSlot::Filter(index) => request
                    .filters()
                    .get(index)
                    .map(|filter| &filter.value)
                    .ok_or_else(mismatch),
            })
            .collect()
    }
}
