//! Local Store: the mirrored tables on disk and the primitives every other
//! component writes and reads through.

use std::path::Path;

use adjunct_core::errors::{Error, Result};
use adjunct_core::sync::{
    key_to_string, primary_key_value, strip_sync_control, MirroredTable, Record, RecordFailure,
    RemoteApplyOutcome, DELETED_COLUMN, LAST_SYNCED_AT_COLUMN, PENDING_SYNC_COLUMN,
};
use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

use crate::codec::{json_to_sql, quote_identifier, read_record, EncodedRecord};
use crate::db::{self, WriteHandle};
use crate::errors::StorageError;
use crate::schema::initialize_schema;
use crate::sync_log::SyncLogRepository;

/// How a write sets the sync-control columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMarks {
    /// Local edit: the row is replaced wholesale with `pending_sync = 1,
    /// deleted = 0`. `last_synced_at` carries over from the replaced row;
    /// other columns absent from the record fall back to defaults.
    LocalEdit,
    /// Authoritative remote copy: `pending_sync = 0, deleted = 0,
    /// last_synced_at = synced_at`, whatever the incoming row says.
    Authoritative { synced_at: String },
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    writer: WriteHandle,
    sync_log: SyncLogRepository,
}

impl LocalStore {
    /// Opens the store file; call [`LocalStore::initialize`] before use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_writer(db::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_writer(db::open_in_memory()?))
    }

    fn from_writer(writer: WriteHandle) -> Self {
        Self {
            sync_log: SyncLogRepository::new(writer.clone()),
            writer,
        }
    }

    pub(crate) fn writer(&self) -> &WriteHandle {
        &self.writer
    }

    pub fn sync_log(&self) -> &SyncLogRepository {
        &self.sync_log
    }

    /// Creates all tables if absent. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.writer.exec(|tx| initialize_schema(tx)).await?;
        info!("[LocalStore] Local DB initialized");
        Ok(())
    }

    /// Writes one record with the given sync marks.
    pub async fn insert_or_replace(
        &self,
        table: MirroredTable,
        record: Record,
        marks: SyncMarks,
    ) -> Result<()> {
        self.writer
            .exec(move |tx| write_record(tx, table, record, &marks))
            .await
    }

    /// Rows with `deleted = 0`, in physical order.
    pub async fn select_rows(&self, table: MirroredTable) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = 0",
            quote_identifier(table.table_name()),
            DELETED_COLUMN
        );
        self.writer
            .read(move |conn| query_records(conn, &sql, Vec::new(), Some(table)))
            .await
    }

    pub(crate) async fn select_where(
        &self,
        table: MirroredTable,
        clause: String,
        params: Vec<Value>,
    ) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            quote_identifier(table.table_name()),
            clause
        );
        self.writer
            .read(move |conn| query_records(conn, &sql, params, Some(table)))
            .await
    }

    /// Runs statements verbatim, inside a transaction.
    pub async fn exec_raw(&self, sql: impl Into<String>) -> Result<()> {
        let sql = sql.into();
        self.writer
            .exec(move |tx| {
                tx.execute_batch(&sql).map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    /// Runs one query with positional parameters; values come back untyped.
    pub async fn query_raw(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Vec<Record>> {
        let sql = sql.into();
        self.writer
            .read(move |conn| query_records(conn, &sql, params, None))
            .await
    }

    /// Overwrites local rows with remote ones. Each row is applied in its own
    /// savepoint; a failing row is reported and skipped.
    pub async fn apply_remote_rows(
        &self,
        table: MirroredTable,
        rows: Vec<Record>,
        synced_at: String,
    ) -> Result<RemoteApplyOutcome> {
        self.writer
            .exec(move |tx| {
                let marks = SyncMarks::Authoritative { synced_at };
                let mut outcome = RemoteApplyOutcome::default();
                for row in rows {
                    let key = row.get(table.primary_key()).map(key_to_string);
                    let savepoint = tx.savepoint().map_err(StorageError::from)?;
                    match write_record(&savepoint, table, row, &marks) {
                        Ok(()) => {
                            savepoint.commit().map_err(StorageError::from)?;
                            outcome.applied += 1;
                        }
                        // Dropping the savepoint rolls the row back.
                        Err(err) => outcome.failures.push(RecordFailure {
                            key,
                            reason: err.to_string(),
                        }),
                    }
                }
                Ok(outcome)
            })
            .await
    }

    /// Clears `pending_sync` on rows that still match the pushed snapshot
    /// column for column. A row edited after the snapshot was taken stays
    /// pending for the next push.
    pub async fn mark_rows_synced(
        &self,
        table: MirroredTable,
        pushed: Vec<Record>,
        synced_at: String,
    ) -> Result<usize> {
        self.writer
            .exec(move |tx| {
                let mut updated = 0;
                for row in &pushed {
                    primary_key_value(table, row)?;
                    let mut matches = Vec::with_capacity(row.len());
                    let mut values = vec![SqlValue::Text(synced_at.clone())];
                    for (column, value) in row {
                        values.push(json_to_sql(value));
                        matches.push(format!("{} IS ?{}", quote_identifier(column), values.len()));
                    }
                    let sql = format!(
                        "UPDATE {} SET {} = 0, {} = ?1 WHERE {}",
                        quote_identifier(table.table_name()),
                        PENDING_SYNC_COLUMN,
                        LAST_SYNCED_AT_COLUMN,
                        matches.join(" AND ")
                    );
                    updated += tx
                        .execute(&sql, params_from_iter(values.iter()))
                        .map_err(StorageError::from)?;
                }
                if updated < pushed.len() {
                    info!(
                        "[LocalStore] {}: {} row(s) changed during push, left pending",
                        table,
                        pushed.len() - updated
                    );
                }
                debug!("[LocalStore] {}: marked {} row(s) synced", table, updated);
                Ok(updated)
            })
            .await
    }
}

/// Encodes and writes one record. Shared by local edits and remote applies.
pub(crate) fn write_record(
    conn: &Connection,
    table: MirroredTable,
    mut record: Record,
    marks: &SyncMarks,
) -> Result<()> {
    let key = primary_key_value(table, &record)?;

    let (statement, encoded) = match marks {
        SyncMarks::LocalEdit => {
            for column in [DELETED_COLUMN, LAST_SYNCED_AT_COLUMN] {
                if record.contains_key(column) {
                    return Err(Error::validation(format!(
                        "Local writes must not set '{}' on '{}'",
                        column, table
                    )));
                }
            }
            record.remove(PENDING_SYNC_COLUMN);
            let mut encoded = EncodedRecord::from_record(&record);
            encoded.push(PENDING_SYNC_COLUMN, SqlValue::Integer(1));
            // A re-insert revives a tombstoned row.
            encoded.push(DELETED_COLUMN, SqlValue::Integer(0));
            encoded.push_carried(
                LAST_SYNCED_AT_COLUMN,
                table.table_name(),
                table.primary_key(),
                json_to_sql(&key),
            );
            (encoded.replace_sql(table.table_name()), encoded)
        }
        SyncMarks::Authoritative { synced_at } => {
            let mut encoded = EncodedRecord::from_record(&strip_sync_control(record));
            encoded.push(PENDING_SYNC_COLUMN, SqlValue::Integer(0));
            encoded.push(DELETED_COLUMN, SqlValue::Integer(0));
            encoded.push(LAST_SYNCED_AT_COLUMN, SqlValue::Text(synced_at.clone()));
            (encoded.replace_sql(table.table_name()), encoded)
        }
    };
    conn.execute(&statement, params_from_iter(encoded.values.iter()))
        .map_err(StorageError::from)?;
    Ok(())
}

pub(crate) fn query_records(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
    table: Option<MirroredTable>,
) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(sql).map_err(StorageError::from)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let values: Vec<SqlValue> = params.iter().map(json_to_sql).collect();
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            read_record(row, &columns, table)
        })
        .map_err(StorageError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(StorageError::from)?;
    Ok(rows)
}
