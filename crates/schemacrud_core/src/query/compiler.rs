//! Pure SQL compilation from (crud type, model, shape).
//!
//! Templates produced here:
//! - create: `INSERT INTO "m" ("a", "b") VALUES (?, ?)`, arguments in column order.
//! - read: `SELECT * FROM "m" WHERE "f" = ?`, or `WHERE 1 = 1` without filters.
//! - update: `UPDATE "m" SET "a" = ? WHERE "f" = ?`, values then filters.
//! - delete: `DELETE FROM "m" WHERE "f" = ?`.

use super::{
    ArgumentSlot, CompiledStatement, CreateViolation, CrudType, QueryError, QueryResult,
    RequestShape,
};
use crate::request::FilterOp;
use crate::schema::{quote_ident, Model};
use std::collections::BTreeSet;

const ALWAYS_TRUE: &str = "1 = 1";

/// Checks every name in `shape` against `model`.
///
/// Runs before a shape becomes a cache key: names that pass are model
/// columns, so keys stay unambiguous and bounded by the model's fields.
///
/// # Errors
/// - `InvalidCreate` with `UnknownColumns` or `DuplicateField` for create.
/// - `UnknownField` when a value or filter names no column of `model`.
/// - `DuplicateField` when a value or filter repeats.
/// - `UnexpectedValue` for values on read or delete.
/// - `UnexpectedFilter` for filters on create.
pub fn check_fields(model: &Model, shape: &RequestShape) -> QueryResult<()> {
    let crud_type = shape.crud_type();

    if crud_type == CrudType::Create {
        let mut seen = BTreeSet::new();
        for name in shape.values() {
            if !seen.insert(name.as_str()) {
                return Err(QueryError::InvalidCreate(CreateViolation::DuplicateField(
                    name.clone(),
                )));
            }
        }
        let unknown: Vec<String> = shape
            .values()
            .iter()
            .filter(|name| model.field(name).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(QueryError::InvalidCreate(CreateViolation::UnknownColumns(
                unknown,
            )));
        }
    } else {
        let mut seen = BTreeSet::new();
        for name in shape.values() {
            resolve_column(model, name)?;
            if !seen.insert(name.as_str()) {
                return Err(QueryError::DuplicateField(name.clone()));
            }
            if matches!(crud_type, CrudType::Read | CrudType::Delete) {
                return Err(QueryError::UnexpectedValue {
                    crud_type,
                    field: name.clone(),
                });
            }
        }
    }

    let mut seen = BTreeSet::new();
    for (name, op) in shape.filters() {
        resolve_column(model, name)?;
        if !seen.insert((name.as_str(), *op)) {
            return Err(QueryError::DuplicateField(name.clone()));
        }
        if crud_type == CrudType::Create {
            return Err(QueryError::UnexpectedFilter {
                crud_type,
                field: name.clone(),
            });
        }
    }
    Ok(())
}

/// Compiles `shape` against `model`.
///
/// # Errors
/// - Everything [`check_fields`] reports.
/// - `InvalidCreate` when a create shape does not cover the columns exactly.
/// - `EmptyUpdate` / `MissingFilter` for update or delete shapes that would
///   not name what to change or which rows to touch.
pub fn compile(model: &Model, shape: &RequestShape) -> QueryResult<CompiledStatement> {
    check_fields(model, shape)?;
    let (sql, arguments) = match shape.crud_type() {
        CrudType::Create => compile_create(model, shape)?,
        CrudType::Read => compile_read(model, shape)?,
        CrudType::Update => compile_update(model, shape)?,
        CrudType::Delete => compile_delete(model, shape)?,
    };

    Ok(CompiledStatement {
        key: shape.key(),
        crud_type: shape.crud_type(),
        sql,
        arguments,
    })
}

fn compile_create(
    model: &Model,
    shape: &RequestShape,
) -> QueryResult<(String, Vec<ArgumentSlot>)> {
    let mut arguments = Vec::with_capacity(model.fields().len());
    let mut missing = Vec::new();
    for column in model.columns() {
        match shape.values().iter().position(|name| name == column) {
            Some(index) => arguments.push(ArgumentSlot::Value(index)),
            None => missing.push(column.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(QueryError::InvalidCreate(CreateViolation::MissingColumns(
            missing,
        )));
    }

    let columns = model
        .columns()
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; arguments.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_ident(model.name())
    );

    Ok((sql, arguments))
}

fn compile_read(
    model: &Model,
    shape: &RequestShape,
) -> QueryResult<(String, Vec<ArgumentSlot>)> {
    let (predicate, arguments) = where_clause(model, shape.filters())?;
    let sql = format!(
        "SELECT * FROM {} WHERE {predicate}",
        quote_ident(model.name())
    );
    Ok((sql, arguments))
}

fn compile_update(
    model: &Model,
    shape: &RequestShape,
) -> QueryResult<(String, Vec<ArgumentSlot>)> {
    if shape.values().is_empty() {
        return Err(QueryError::EmptyUpdate);
    }
    if shape.filters().is_empty() {
        return Err(QueryError::MissingFilter(CrudType::Update));
    }

    let mut assignments = Vec::with_capacity(shape.values().len());
    let mut arguments = Vec::with_capacity(shape.values().len() + shape.filters().len());
    for (index, name) in shape.values().iter().enumerate() {
        let column = resolve_column(model, name)?;
        assignments.push(format!("{} = ?", quote_ident(column)));
        arguments.push(ArgumentSlot::Value(index));
    }

    let (predicate, filter_arguments) = where_clause(model, shape.filters())?;
    arguments.extend(filter_arguments);

    let sql = format!(
        "UPDATE {} SET {} WHERE {predicate}",
        quote_ident(model.name()),
        assignments.join(", ")
    );
    Ok((sql, arguments))
}

fn compile_delete(
    model: &Model,
    shape: &RequestShape,
) -> QueryResult<(String, Vec<ArgumentSlot>)> {
    if shape.filters().is_empty() {
        return Err(QueryError::MissingFilter(CrudType::Delete));
    }

    let (predicate, arguments) = where_clause(model, shape.filters())?;
    let sql = format!("DELETE FROM {} WHERE {predicate}", quote_ident(model.name()));
    Ok((sql, arguments))
}

fn where_clause(
    model: &Model,
    filters: &[(String, FilterOp)],
) -> QueryResult<(String, Vec<ArgumentSlot>)> {
    if filters.is_empty() {
        return Ok((ALWAYS_TRUE.to_string(), Vec::new()));
    }

    let mut predicates = Vec::with_capacity(filters.len());
    let mut arguments = Vec::with_capacity(filters.len());
    for (index, (name, op)) in filters.iter().enumerate() {
        let column = resolve_column(model, name)?;
        predicates.push(format!("{} {} ?", quote_ident(column), op.as_sql()));
        arguments.push(ArgumentSlot::Filter(index));
    }

    Ok((predicates.join(" AND "), arguments))
}

// Returns the registry's copy of the name so request strings never reach SQL text.
fn resolve_column<'m>(model: &'m Model, name: &str) -> QueryResult<&'m str> {
    model
        .field(name)
        .map(|field| field.name())
        .ok_or_else(|| QueryError::UnknownField {
            model: model.name().to_string(),
            field: name.to_string(),
        })
}
