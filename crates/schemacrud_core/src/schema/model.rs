//! Model and field definitions.

use super::{SchemaError, SchemaResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

const VARCHAR_DDL_WIDTH: u32 = 255;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// SQL scalar type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Char,
    Varchar,
    Boolean,
    SmallInt,
    Integer,
    Decimal,
    Numeric,
    Real,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    Clob,
    Blob,
}

impl FieldKind {
    /// Parses a schema kind string, case-insensitively.
    ///
    /// `INT` and `DOUBLE PRECISION` are accepted as aliases.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let kind = match normalized.as_str() {
            "CHAR" => Self::Char,
            "VARCHAR" => Self::Varchar,
            "BOOLEAN" => Self::Boolean,
            "SMALLINT" => Self::SmallInt,
            "INTEGER" | "INT" => Self::Integer,
            "DECIMAL" => Self::Decimal,
            "NUMERIC" => Self::Numeric,
            "REAL" => Self::Real,
            "FLOAT" => Self::Float,
            "DOUBLE" | "DOUBLE PRECISION" => Self::Double,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" => Self::Timestamp,
            "CLOB" => Self::Clob,
            "BLOB" => Self::Blob,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical schema name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::Boolean => "BOOLEAN",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::Decimal => "DECIMAL",
            Self::Numeric => "NUMERIC",
            Self::Real => "REAL",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Clob => "CLOB",
            Self::Blob => "BLOB",
        }
    }

    /// Column type used in `CREATE TABLE`.
    ///
    /// Character kinds are widened to a fixed-width `VARCHAR`.
    pub fn ddl_type(self) -> String {
        match self {
            Self::Char | Self::Varchar => format!("VARCHAR({VARCHAR_DDL_WIDTH})"),
            Self::Double => "DOUBLE PRECISION".to_string(),
            other => other.as_str().to_string(),
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column: name and scalar kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }
}

/// Named, canonically ordered set of typed fields describing one table.
///
/// Only constructible through [`Model::new`], so every live `Model` has
/// unique, valid, sorted field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    name: String,
    fields: Vec<Field>,
}

impl Model {
    /// Validates and canonicalizes a model definition.
    ///
    /// # Errors
    /// - `InvalidIdentifier` when the model or a field name is not a plain identifier.
    /// - `EmptyModel` when no fields are declared.
    /// - `DuplicateField` when a field name repeats.
    pub fn new(name: impl Into<String>, mut fields: Vec<Field>) -> SchemaResult<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(SchemaError::InvalidIdentifier(name));
        }
        if fields.is_empty() {
            return Err(SchemaError::EmptyModel(name));
        }

        let mut seen = BTreeSet::new();
        for field in &fields {
            if !is_identifier(field.name()) {
                return Err(SchemaError::InvalidIdentifier(format!(
                    "{name}.{}",
                    field.name()
                )));
            }
            if !seen.insert(field.name()) {
                return Err(SchemaError::DuplicateField {
                    model: name,
                    field: field.name().to_string(),
                });
            }
        }

        fields.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(Self { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in canonical (name-sorted) order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Column names in canonical order.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .binary_search_by(|field| field.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.fields[index])
    }

    /// Column definitions for `CREATE TABLE`, e.g. `"id" INTEGER, "name" VARCHAR(255)`.
    pub fn ddl_columns(&self) -> String {
        self.fields
            .iter()
            .map(|field| format!("{} {}", quote_ident(field.name()), field.kind().ddl_type()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Quotes a registry identifier for SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}
