//! DDL for the mirrored tables and the sync log.

use std::collections::HashSet;

use adjunct_core::errors::Result;
use adjunct_core::sync::{ColumnDef, MirroredTable, FULL_SYNC_ORDER};
use log::info;
use rusqlite::Connection;

use crate::codec::quote_identifier;
use crate::errors::StorageError;

pub const SYNC_LOG_TABLE: &str = "sync_log";

const SYNC_LOG_DDL: &str = "CREATE TABLE IF NOT EXISTS sync_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT,
    direction TEXT,
    record_count INTEGER,
    status TEXT,
    timestamp TEXT
);";

fn column_ddl(column: &ColumnDef) -> String {
    let mut ddl = format!(
        "{} {}",
        quote_identifier(column.name),
        column.column_type.sql_type()
    );
    if !column.constraint.is_empty() {
        ddl.push(' ');
        ddl.push_str(column.constraint);
    }
    ddl
}

pub fn create_table_sql(table: MirroredTable) -> String {
    let columns = table.columns().map(column_ddl).collect::<Vec<_>>();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote_identifier(table.table_name()),
        columns.join(",\n    ")
    )
}

/// `ALTER TABLE ADD COLUMN` cannot add keys, uniqueness, or non-constant
/// defaults, so only constant defaults are carried over.
fn add_column_sql(table: MirroredTable, column: &ColumnDef) -> String {
    let keep_constraint =
        column.constraint.starts_with("DEFAULT ") && !column.constraint.contains('(');
    let mut ddl = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_identifier(table.table_name()),
        quote_identifier(column.name),
        column.column_type.sql_type()
    );
    if keep_constraint {
        ddl.push(' ');
        ddl.push_str(column.constraint);
    }
    ddl
}

pub(crate) fn existing_columns(conn: &Connection, table_name: &str) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_identifier(table_name)))
        .map_err(StorageError::from)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>("name"))
        .map_err(StorageError::from)?
        .collect::<rusqlite::Result<HashSet<_>>>()
        .map_err(StorageError::from)?;
    Ok(names)
}

/// Creates every table if absent and adds descriptor columns missing from
/// tables created by an older schema. Safe to run on every start.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for table in FULL_SYNC_ORDER {
        conn.execute_batch(&create_table_sql(table))
            .map_err(StorageError::from)?;

        let existing = existing_columns(conn, table.table_name())?;
        for column in table.columns() {
            if !existing.contains(column.name) {
                info!(
                    "[LocalStore] Adding missing column {}.{}",
                    table, column.name
                );
                conn.execute_batch(&add_column_sql(table, column))
                    .map_err(StorageError::from)?;
            }
        }
    }
    conn.execute_batch(SYNC_LOG_DDL).map_err(StorageError::from)?;
    Ok(())
}
