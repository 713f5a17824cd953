//! Schema registry: validated model definitions.
//!
//! # Responsibility
//! - Turn declarative model specs into immutable `Model` values.
//! - Provide canonical column lists and DDL strings for other layers.
//!
//! # Invariants
//! - Field names are unique within a model.
//! - Fields are stored sorted by name; this order is the canonical column order.
//! - Model and field names are plain SQL identifiers and are the only
//!   identifiers ever written into SQL text.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod loader;
mod model;

pub use loader::{load, load_from_path, load_from_str, FieldSpec, ModelSpec};
pub use model::{quote_ident, Field, FieldKind, Model};

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Load-time schema failure. Fatal to startup, never raised by a running request.
#[derive(Debug)]
pub enum SchemaError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidIdentifier(String),
    EmptyModel(String),
    DuplicateModel(String),
    DuplicateField { model: String, field: String },
    UnknownKind {
        model: String,
        field: String,
        kind: String,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read schema: {err}"),
            Self::Parse(err) => write!(f, "failed to parse schema: {err}"),
            Self::InvalidIdentifier(name) => {
                write!(f, "`{name}` is not a valid model or field identifier")
            }
            Self::EmptyModel(model) => write!(f, "model `{model}` declares no fields"),
            Self::DuplicateModel(model) => write!(f, "model `{model}` is declared twice"),
            Self::DuplicateField { model, field } => {
                write!(f, "model `{model}` declares field `{field}` more than once")
            }
            Self::UnknownKind { model, field, kind } => write!(
                f,
                "field `{model}.{field}` has unrecognized kind `{kind}`"
            ),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
