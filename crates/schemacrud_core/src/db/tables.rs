//! Table bootstrap from model DDL.

use super::{DbResult, Database};
use crate::schema::{quote_ident, Model};
use log::info;
use rusqlite::Connection;

/// Returns whether a table named `name` exists.
pub fn table_exists(conn: &Connection, name: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Creates the table for `model` when absent. Returns `true` when created.
///
/// Existing tables are left untouched, even when their columns differ.
pub fn ensure_table(db: &Database, model: &Model) -> DbResult<bool> {
    let conn = db.acquire()?;
    if table_exists(&conn, model.name())? {
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote_ident(model.name()),
        model.ddl_columns()
    ))?;
    info!(
        "event=table_create module=db status=ok model={} columns={}",
        model.name(),
        model.fields().len()
    );
    Ok(true)
}

/// Runs [`ensure_table`] for every model; returns the names of created tables.
pub fn ensure_tables<'m>(
    db: &Database,
    models: impl IntoIterator<Item = &'m Model>,
) -> DbResult<Vec<String>> {
    let mut created = Vec::new();
    for model in models {
        if ensure_table(db, model)? {
            created.push(model.name().to_string());
        }
    }
    Ok(created)
}
