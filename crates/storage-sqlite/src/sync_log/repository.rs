//! Append-only audit trail of push/pull attempts.

use adjunct_core::errors::{DatabaseError, Error, Result};
use adjunct_core::sync::{now_timestamp, SyncDirection, SyncLogEntry, SyncLogStatus};
use log::debug;
use rusqlite::{OptionalExtension, Row};

use crate::db::WriteHandle;
use crate::errors::StorageError;

#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    writer: WriteHandle,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, i64, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn to_entry(raw: (i64, String, String, i64, String, String)) -> Result<SyncLogEntry> {
    let (id, table_name, direction, record_count, status, timestamp) = raw;
    let direction = SyncDirection::parse(&direction).ok_or_else(|| {
        Error::Database(DatabaseError::Internal(format!(
            "Unknown sync direction '{}' in sync_log row {}",
            direction, id
        )))
    })?;
    let status = SyncLogStatus::parse(&status).ok_or_else(|| {
        Error::Database(DatabaseError::Internal(format!(
            "Unknown sync status '{}' in sync_log row {}",
            status, id
        )))
    })?;
    Ok(SyncLogEntry {
        id,
        table_name,
        direction,
        record_count,
        status,
        timestamp,
    })
}

const SELECT_COLUMNS: &str = "id, table_name, direction, record_count, status, timestamp";

impl SyncLogRepository {
    pub fn new(writer: WriteHandle) -> Self {
        Self { writer }
    }

    /// Appends one entry stamped with the current time; returns its id.
    pub async fn log_sync(
        &self,
        table_name: &str,
        direction: SyncDirection,
        record_count: usize,
        status: SyncLogStatus,
    ) -> Result<i64> {
        let table_name = table_name.to_string();
        let timestamp = now_timestamp();
        self.writer
            .exec(move |tx| {
                tx.execute(
                    "INSERT INTO sync_log (table_name, direction, record_count, status, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (
                        table_name.as_str(),
                        direction.as_str(),
                        record_count as i64,
                        status.as_str(),
                        timestamp.as_str(),
                    ),
                )
                .map_err(StorageError::from)?;
                let id = tx.last_insert_rowid();
                debug!(
                    "[LocalStore] sync_log #{}: {} {} {} ({})",
                    id, table_name, direction, status, record_count
                );
                Ok(id)
            })
            .await
    }

    /// Most recent entries first.
    pub async fn fetch_sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let sql = format!(
            "SELECT {} FROM sync_log ORDER BY id DESC LIMIT ?1",
            SELECT_COLUMNS
        );
        let raw = self
            .writer
            .read(move |conn| {
                let mut stmt = conn.prepare(&sql).map_err(StorageError::from)?;
                let rows = stmt
                    .query_map([limit as i64], entry_from_row)
                    .map_err(StorageError::from)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(StorageError::from)?;
                Ok(rows)
            })
            .await?;
        raw.into_iter().map(to_entry).collect()
    }

    /// Latest `ok` entry for one table and direction.
    pub async fn last_success(
        &self,
        table_name: &str,
        direction: SyncDirection,
    ) -> Result<Option<SyncLogEntry>> {
        let sql = format!(
            "SELECT {} FROM sync_log
             WHERE table_name = ?1 AND direction = ?2 AND status = ?3
             ORDER BY id DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let table_name = table_name.to_string();
        let raw = self
            .writer
            .read(move |conn| {
                conn.query_row(
                    &sql,
                    (
                        table_name.as_str(),
                        direction.as_str(),
                        SyncLogStatus::Ok.as_str(),
                    ),
                    entry_from_row,
                )
                .optional()
                .map_err(|e| Error::from(StorageError::from(e)))
            })
            .await?;
        raw.map(to_entry).transpose()
    }
}
