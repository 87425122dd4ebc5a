//! The sync engine's view of the local store.

use adjunct_core::errors::Result;
use adjunct_core::sync::{
    MirroredTable, Record, RemoteApplyOutcome, SyncDirection, SyncLogEntry, SyncLogStatus,
    SyncStoreTrait, DELETED_COLUMN, PENDING_SYNC_COLUMN,
};
use async_trait::async_trait;

use crate::integrity::sweep_all;
use crate::store::LocalStore;

#[async_trait]
impl SyncStoreTrait for LocalStore {
    async fn select_pending(&self, table: MirroredTable) -> Result<Vec<Record>> {
        self.select_where(
            table,
            format!("{} = 1 AND {} = 0", PENDING_SYNC_COLUMN, DELETED_COLUMN),
            Vec::new(),
        )
        .await
    }

    async fn mark_synced(
        &self,
        table: MirroredTable,
        pushed: Vec<Record>,
        synced_at: String,
    ) -> Result<usize> {
        self.mark_rows_synced(table, pushed, synced_at).await
    }

    async fn apply_remote(
        &self,
        table: MirroredTable,
        rows: Vec<Record>,
        synced_at: String,
    ) -> Result<RemoteApplyOutcome> {
        self.apply_remote_rows(table, rows, synced_at).await
    }

    async fn sweep_invalid_keys(&self) -> Result<usize> {
        self.writer().exec(|tx| sweep_all(tx)).await
    }

    async fn log_sync(
        &self,
        table: &str,
        direction: SyncDirection,
        record_count: usize,
        status: SyncLogStatus,
    ) -> Result<i64> {
        self.sync_log()
            .log_sync(table, direction, record_count, status)
            .await
    }

    async fn fetch_sync_log(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        self.sync_log().fetch_sync_log(limit).await
    }
}
