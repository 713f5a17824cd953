//! Canonicalization of decoded JSON bodies into `CrudRequest`.

use super::{
    CrudRequest, FieldFilter, FieldValue, RequestError, RequestResult, Scalar, WHERE_KEY,
};
use serde_json::{Map, Value};

impl CrudRequest {
    /// Builds a request from a decoded JSON object.
    ///
    /// Top-level keys become values; entries of the reserved `where` object
    /// become equality filters.
    ///
    /// # Errors
    /// - `NotAnObject` when `body` is not an object.
    /// - `InvalidWhere` when `where` is present but not an object.
    /// - `UnsupportedValueType` for null, array or nested object literals.
    pub fn from_json(body: &Value) -> RequestResult<Self> {
        let Value::Object(entries) = body else {
            return Err(RequestError::NotAnObject);
        };
        Self::from_json_map(entries)
    }

    /// Same as [`CrudRequest::from_json`] for an already-unwrapped object.
    pub fn from_json_map(entries: &Map<String, Value>) -> RequestResult<Self> {
        let mut values = Vec::with_capacity(entries.len());
        let mut filters = Vec::new();

        for (key, value) in entries {
            if key == WHERE_KEY {
                let Value::Object(conditions) = value else {
                    return Err(RequestError::InvalidWhere);
                };
                for (name, literal) in conditions {
                    filters.push(FieldFilter::eq(name.clone(), coerce_scalar(name, literal)?));
                }
                continue;
            }

            values.push(FieldValue::new(key.clone(), coerce_scalar(key, value)?));
        }

        Ok(Self::new(values, filters))
    }

    /// Parses a raw JSON body. An empty body is an empty request.
    pub fn from_json_str(body: &str) -> RequestResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        let decoded: Value =
            serde_json::from_str(body).map_err(|err| RequestError::Json(err.to_string()))?;
        Self::from_json(&decoded)
    }
}

fn coerce_scalar(field: &str, value: &Value) -> RequestResult<Scalar> {
    match value {
        Value::Number(number) => Ok(Scalar::Number(number.clone())),
        Value::String(text) => Ok(Scalar::Text(text.clone())),
        Value::Bool(flag) => Ok(Scalar::Boolean(*flag)),
        other => Err(RequestError::UnsupportedValueType {
            field: field.to_string(),
            found: json_type_name(other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
