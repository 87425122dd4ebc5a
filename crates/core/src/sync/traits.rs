//! Seams between the sync engine, the local store and the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::Record;
use super::sync_log_model::{SyncDirection, SyncLogEntry, SyncLogStatus};
use super::tables::MirroredTable;
use crate::errors::Result;

/// A pulled row that could not be written locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    pub key: Option<String>,
    pub reason: String,
}

/// Result of overwriting local rows with authoritative remote rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteApplyOutcome {
    pub applied: usize,
    pub failures: Vec<RecordFailure>,
}

/// Sort direction for ordered local reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Local store operations the sync engine drives.
#[async_trait]
pub trait SyncStoreTrait: Send + Sync {
    /// Rows with `pending_sync = 1 AND deleted = 0`.
    async fn select_pending(&self, table: MirroredTable) -> Result<Vec<Record>>;

    /// Clears `pending_sync` and stamps `last_synced_at` on each pushed row,
    /// but only where the stored row still equals the pushed snapshot.
    async fn mark_synced(
        &self,
        table: MirroredTable,
        pushed: Vec<Record>,
        synced_at: String,
    ) -> Result<usize>;

    /// Overwrites local rows with remote ones, forcing them clean and live.
    async fn apply_remote(
        &self,
        table: MirroredTable,
        rows: Vec<Record>,
        synced_at: String,
    ) -> Result<RemoteApplyOutcome>;

    /// Physically deletes rows whose primary key has the wrong shape.
    async fn sweep_invalid_keys(&self) -> Result<usize>;

    async fn log_sync(
        &self,
        table: &str,
        direction: SyncDirection,
        record_count: usize,
        status: SyncLogStatus,
    ) -> Result<i64>;

    async fn fetch_sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>>;
}

/// The write path application code uses, plus the reads screens render from.
#[async_trait]
pub trait LocalRecordRepositoryTrait: Send + Sync {
    /// Upserts a record and marks it `pending_sync`. Errors are logged and returned.
    async fn insert_local(&self, table: MirroredTable, record: Record) -> Result<()>;

    /// Tombstones a row: `deleted = 1, pending_sync = 1`.
    async fn delete_local(&self, table: MirroredTable, key: Value) -> Result<bool>;

    /// All rows with `deleted = 0`, in physical order.
    async fn select_all(&self, table: MirroredTable) -> Result<Vec<Record>>;

    async fn select_all_ordered(
        &self,
        table: MirroredTable,
        column: &str,
        order: SortOrder,
    ) -> Result<Vec<Record>>;

    async fn select_by_key(&self, table: MirroredTable, key: Value) -> Result<Option<Record>>;
}

/// The relational backend as seen by the sync engine.
#[async_trait]
pub trait RemoteBackendTrait: Send + Sync {
    async fn select_all(&self, table: MirroredTable) -> Result<Vec<Record>>;

    /// Insert-or-update keyed by `conflict_key`; atomic from the caller's view.
    async fn upsert(
        &self,
        table: MirroredTable,
        rows: Vec<Record>,
        conflict_key: &str,
    ) -> Result<()>;

    async fn delete(&self, table: MirroredTable, key_column: &str, key: &Value) -> Result<()>;
}
