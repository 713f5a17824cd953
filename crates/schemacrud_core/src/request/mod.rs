//! Request descriptor: the canonical form of one CRUD call.
//!
//! # Responsibility
//! - Hold the values to write and the filters to match for one call.
//! - Coerce decoded JSON into closed scalar variants exactly once.
//!
//! # Invariants
//! - `values` and `filters` are always sorted by field name; this fixes the
//!   shape key and the positional argument order of compiled statements.
//! - Literals never leave this layer as SQL text; they are bound by the driver.

use crate::query::{CrudType, RequestShape};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde_json::Number;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod json;

/// Reserved top-level key holding the filter mapping.
pub const WHERE_KEY: &str = "where";

pub type RequestResult<T> = Result<T, RequestError>;

/// Failure while canonicalizing a decoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    NotAnObject,
    InvalidWhere,
    UnsupportedValueType { field: String, found: &'static str },
    Json(String),
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "request body must be a JSON object"),
            Self::InvalidWhere => write!(f, "`{WHERE_KEY}` must be a JSON object"),
            Self::UnsupportedValueType { field, found } => {
                write!(f, "field `{field}` has unsupported value type {found}")
            }
            Self::Json(message) => write!(f, "request body is not valid JSON: {message}"),
        }
    }
}

impl Error for RequestError {}

/// Literal value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    /// Decimal number as decoded from JSON.
    Number(Number),
    Text(String),
    Boolean(bool),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn integer(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
            Self::Boolean(flag) => write!(f, "{flag}"),
        }
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            Self::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    ToSqlOutput::Owned(Value::Integer(integer))
                } else if let Some(real) = number.as_f64() {
                    ToSqlOutput::Owned(Value::Real(real))
                } else {
                    ToSqlOutput::Owned(Value::Text(number.to_string()))
                }
            }
            Self::Text(text) => ToSqlOutput::from(text.as_str()),
            Self::Boolean(flag) => ToSqlOutput::Owned(Value::Integer(i64::from(*flag))),
        };
        Ok(output)
    }
}

/// Comparison operator of one filter predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterOp {
    #[default]
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
}

impl FilterOp {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "=" => Some(Self::Eq),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            "<>" | "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Ne => "<>",
        }
    }
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// New data for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub name: String,
    pub value: Scalar,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: Scalar) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One `WHERE` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub name: String,
    pub op: FilterOp,
    pub value: Scalar,
}

impl FieldFilter {
    /// Equality filter, the default for request bodies.
    pub fn eq(name: impl Into<String>, value: Scalar) -> Self {
        Self::new(name, FilterOp::Eq, value)
    }

    pub fn new(name: impl Into<String>, op: FilterOp, value: Scalar) -> Self {
        Self {
            name: name.into(),
            op,
            value,
        }
    }
}

/// Canonicalized values and filters of one inbound call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrudRequest {
    values: Vec<FieldValue>,
    filters: Vec<FieldFilter>,
}

impl CrudRequest {
    pub fn new(values: Vec<FieldValue>, filters: Vec<FieldFilter>) -> Self {
        let mut request = Self { values, filters };
        request.canonicalize();
        request
    }

    /// Appends one value, keeping canonical order.
    pub fn with_value(mut self, name: impl Into<String>, value: Scalar) -> Self {
        self.values.push(FieldValue::new(name, value));
        self.canonicalize();
        self
    }

    /// Appends one filter, keeping canonical order.
    pub fn with_filter(mut self, name: impl Into<String>, op: FilterOp, value: Scalar) -> Self {
        self.filters.push(FieldFilter::new(name, op, value));
        self.canonicalize();
        self
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    /// Literal-free shape of this request for `crud_type`.
    pub fn shape(&self, crud_type: CrudType) -> RequestShape {
        RequestShape::new(
            crud_type,
            self.values.iter().map(|value| value.name.clone()).collect(),
            self.filters
                .iter()
                .map(|filter| (filter.name.clone(), filter.op))
                .collect(),
        )
    }

    fn canonicalize(&mut self) {
        self.values.sort_by(|left, right| left.name.cmp(&right.name));
        self.filters
            .sort_by(|left, right| (&left.name, left.op).cmp(&(&right.name, right.op)));
    }
}
