//! Schema ingestion from declarative specs.

use super::model::{Field, FieldKind, Model};
use super::{SchemaError, SchemaResult};
use log::{error, info};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Declarative model input, e.g. `{"Name": "users", "Fields": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSpec {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Fields", alias = "fields")]
    pub fields: Vec<FieldSpec>,
}

/// Declarative field input, e.g. `{"Name": "id", "Kind": "INTEGER"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,
    #[serde(rename = "Kind", alias = "kind")]
    pub kind: String,
}

impl ModelSpec {
    pub fn new<N, K>(name: impl Into<String>, fields: impl IntoIterator<Item = (N, K)>) -> Self
    where
        N: Into<String>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, kind)| FieldSpec {
                    name: name.into(),
                    kind: kind.into(),
                })
                .collect(),
        }
    }
}

/// Validates specs into models, preserving input model order.
///
/// # Errors
/// Fails on the first model with an unknown kind, a duplicate field, an
/// invalid identifier, no fields, or a name already used by another model.
pub fn load(specs: Vec<ModelSpec>) -> SchemaResult<Vec<Model>> {
    let mut model_names = BTreeSet::new();
    let mut models = Vec::with_capacity(specs.len());

    for spec in specs {
        if !model_names.insert(spec.name.clone()) {
            return Err(SchemaError::DuplicateModel(spec.name));
        }

        let mut fields = Vec::with_capacity(spec.fields.len());
        for field in spec.fields {
            let kind = FieldKind::parse(&field.kind).ok_or_else(|| SchemaError::UnknownKind {
                model: spec.name.clone(),
                field: field.name.clone(),
                kind: field.kind.clone(),
            })?;
            fields.push(Field::new(field.name, kind));
        }

        models.push(Model::new(spec.name, fields)?);
    }

    Ok(models)
}

/// Parses a JSON schema document and loads it.
pub fn load_from_str(json: &str) -> SchemaResult<Vec<Model>> {
    let specs: Vec<ModelSpec> = serde_json::from_str(json)?;
    load(specs)
}

/// Reads a JSON schema file and loads it.
///
/// # Side effects
/// - Emits `schema_load` logging events with model count or error.
pub fn load_from_path(path: impl AsRef<Path>) -> SchemaResult<Vec<Model>> {
    let path = path.as_ref();
    let result = std::fs::read_to_string(path)
        .map_err(SchemaError::from)
        .and_then(|json| load_from_str(&json));

    match &result {
        Ok(models) => info!(
            "event=schema_load module=schema status=ok path={} models={}",
            path.display(),
            models.len()
        ),
        Err(err) => error!(
            "event=schema_load module=schema status=error path={} error={}",
            path.display(),
            err
        ),
    }

    result
}
