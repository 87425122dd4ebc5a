//! Push/pull orchestration per mirrored table.
//!
//! Each phase is self-contained: it never returns an error to the caller. The
//! outcome is written to the sync log and to the `log` facade, and returned as a
//! [`PhaseReport`] for callers that want to surface it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::record::{primary_key_value, strip_sync_control};
use super::sync_log_model::{SyncDirection, SyncLogStatus};
use super::tables::{MirroredTable, FULL_SYNC_ORDER};
use super::traits::{RemoteBackendTrait, SyncStoreTrait};
use crate::errors::{Error, Result};

/// Default per-call backend timeout.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Upper bound on every backend call; expiry counts as a backend error.
    pub call_timeout: Duration,
    /// Tables visited by a full sync, in order.
    pub tables: Vec<MirroredTable>,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            tables: FULL_SYNC_ORDER.to_vec(),
        }
    }
}

/// Outcome of one push or pull phase for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub table: MirroredTable,
    pub direction: SyncDirection,
    pub status: SyncLogStatus,
    pub record_count: usize,
    /// Pulled rows that failed to apply locally.
    pub failed_records: usize,
    pub message: Option<String>,
}

impl PhaseReport {
    fn ok(table: MirroredTable, direction: SyncDirection, record_count: usize) -> Self {
        Self {
            table,
            direction,
            status: SyncLogStatus::Ok,
            record_count,
            failed_records: 0,
            message: None,
        }
    }

    fn failed(
        table: MirroredTable,
        direction: SyncDirection,
        status: SyncLogStatus,
        record_count: usize,
        message: String,
    ) -> Self {
        Self {
            table,
            direction,
            status,
            record_count,
            failed_records: 0,
            message: Some(message),
        }
    }

    /// Classifies an error escaping a phase: backend failures are `error`,
    /// everything else is `crash` and reports zero records.
    fn from_error(
        table: MirroredTable,
        direction: SyncDirection,
        attempted: usize,
        err: &Error,
    ) -> Self {
        if err.is_backend_failure() {
            Self::failed(table, direction, SyncLogStatus::Error, attempted, err.to_string())
        } else {
            Self::failed(table, direction, SyncLogStatus::Crash, 0, err.to_string())
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SyncLogStatus::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncReport {
    pub phases: Vec<PhaseReport>,
    pub swept_rows: usize,
    pub duration_ms: i64,
}

impl FullSyncReport {
    pub fn pushed_count(&self) -> usize {
        self.count(SyncDirection::Push)
    }

    pub fn pulled_count(&self) -> usize {
        self.count(SyncDirection::Pull)
    }

    pub fn failed_phases(&self) -> impl Iterator<Item = &PhaseReport> {
        self.phases.iter().filter(|p| !p.is_ok())
    }

    fn count(&self, direction: SyncDirection) -> usize {
        self.phases
            .iter()
            .filter(|p| p.direction == direction && p.is_ok())
            .map(|p| p.record_count)
            .sum()
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic without message".to_string()
    }
}

/// Reconciles local dirty rows with the backend, then refreshes local state.
pub struct SyncEngine {
    store: Arc<dyn SyncStoreTrait>,
    backend: Arc<dyn RemoteBackendTrait>,
    config: SyncEngineConfig,
    // Serializes full syncs so two cycles never interleave writes.
    cycle_mutex: Mutex<()>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn SyncStoreTrait>, backend: Arc<dyn RemoteBackendTrait>) -> Self {
        Self::with_config(store, backend, SyncEngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn SyncStoreTrait>,
        backend: Arc<dyn RemoteBackendTrait>,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
            cycle_mutex: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    /// Uploads every dirty, live row of `table` as one upsert batch.
    pub async fn push(&self, table: MirroredTable) -> PhaseReport {
        let outcome = AssertUnwindSafe(self.push_phase(table)).catch_unwind().await;
        let report = match outcome {
            Ok(report) => report,
            Err(payload) => PhaseReport::failed(
                table,
                SyncDirection::Push,
                SyncLogStatus::Crash,
                0,
                panic_message(payload.as_ref()),
            ),
        };
        self.record(&report).await;
        report
    }

    /// Runs the integrity sweep, then overwrites local rows with the backend's.
    pub async fn pull(&self, table: MirroredTable) -> PhaseReport {
        self.pull_with_sweep(table, true).await
    }

    /// Deletes rows with malformed keys. Failures are logged, never raised.
    pub async fn sweep(&self) -> usize {
        match self.store.sweep_invalid_keys().await {
            Ok(0) => 0,
            Ok(removed) => {
                info!("[Sync] Integrity sweep removed {} row(s) with invalid keys", removed);
                removed
            }
            Err(err) => {
                warn!("[Sync] Integrity sweep failed: {}", err);
                0
            }
        }
    }

    /// Push-then-pull for every configured table, best-effort across tables.
    pub async fn full_sync(&self) -> FullSyncReport {
        let _cycle_guard = self.cycle_mutex.lock().await;
        let started_at = Instant::now();
        info!("[Sync] Starting full sync over {} table(s)", self.config.tables.len());

        let swept_rows = self.sweep().await;
        let mut phases = Vec::with_capacity(self.config.tables.len() * 2);
        for table in &self.config.tables {
            phases.push(self.push(*table).await);
            phases.push(self.pull_with_sweep(*table, false).await);
        }

        let report = FullSyncReport {
            phases,
            swept_rows,
            duration_ms: started_at.elapsed().as_millis() as i64,
        };
        info!(
            "[Sync] Full sync completed in {}ms pushed={} pulled={} failed_phases={}",
            report.duration_ms,
            report.pushed_count(),
            report.pulled_count(),
            report.failed_phases().count()
        );
        report
    }

    async fn pull_with_sweep(&self, table: MirroredTable, sweep: bool) -> PhaseReport {
        let outcome = AssertUnwindSafe(self.pull_phase(table, sweep))
            .catch_unwind()
            .await;
        let report = match outcome {
            Ok(report) => report,
            Err(payload) => PhaseReport::failed(
                table,
                SyncDirection::Pull,
                SyncLogStatus::Crash,
                0,
                panic_message(payload.as_ref()),
            ),
        };
        self.record(&report).await;
        report
    }

    async fn push_phase(&self, table: MirroredTable) -> PhaseReport {
        let pending = match self.store.select_pending(table).await {
            Ok(rows) => rows,
            Err(err) => return PhaseReport::from_error(table, SyncDirection::Push, 0, &err),
        };
        debug!("[Sync] push {}: {} pending record(s)", table, pending.len());

        if pending.is_empty() {
            return PhaseReport::ok(table, SyncDirection::Push, 0);
        }

        let attempted = pending.len();
        let mut payload = Vec::with_capacity(attempted);
        for row in &pending {
            if let Err(err) = primary_key_value(table, row) {
                return PhaseReport::from_error(table, SyncDirection::Push, attempted, &err);
            }
            payload.push(strip_sync_control(row.clone()));
        }

        if let Err(err) = self
            .call_backend(self.backend.upsert(table, payload, table.primary_key()))
            .await
        {
            return PhaseReport::from_error(table, SyncDirection::Push, attempted, &err);
        }

        match self.store.mark_synced(table, pending, now_timestamp()).await {
            Ok(_) => PhaseReport::ok(table, SyncDirection::Push, attempted),
            Err(err) => PhaseReport::from_error(table, SyncDirection::Push, attempted, &err),
        }
    }

    async fn pull_phase(&self, table: MirroredTable, sweep: bool) -> PhaseReport {
        if sweep {
            self.sweep().await;
        }

        let rows = match self.call_backend(self.backend.select_all(table)).await {
            Ok(rows) => rows,
            Err(err) => return PhaseReport::from_error(table, SyncDirection::Pull, 0, &err),
        };
        let fetched = rows.len();
        debug!("[Sync] pull {}: fetched {} record(s)", table, fetched);

        match self.store.apply_remote(table, rows, now_timestamp()).await {
            Ok(outcome) => {
                for failure in &outcome.failures {
                    warn!(
                        "[Sync] pull {}: record {} not applied: {}",
                        table,
                        failure.key.as_deref().unwrap_or("<no key>"),
                        failure.reason
                    );
                }
                let mut report = PhaseReport::ok(table, SyncDirection::Pull, fetched);
                report.failed_records = outcome.failures.len();
                report
            }
            Err(err) => PhaseReport::from_error(table, SyncDirection::Pull, 0, &err),
        }
    }

    async fn call_backend<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.call_timeout)),
        }
    }

    async fn record(&self, report: &PhaseReport) {
        match report.status {
            SyncLogStatus::Ok => info!(
                "[Sync] {} {}: ok ({} record(s))",
                report.direction, report.table, report.record_count
            ),
            status => warn!(
                "[Sync] {} {}: {} ({} record(s)): {}",
                report.direction,
                report.table,
                status,
                report.record_count,
                report.message.as_deref().unwrap_or("")
            ),
        }

        if let Err(err) = self
            .store
            .log_sync(
                report.table.table_name(),
                report.direction,
                report.record_count,
                report.status,
            )
            .await
        {
            warn!(
                "[Sync] Failed to write sync log for {} {}: {}",
                report.direction, report.table, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::record::Record;
    use crate::sync::sync_log_model::SyncLogEntry;
    use crate::sync::traits::RemoteApplyOutcome;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeStore {
        pending: StdMutex<Vec<Record>>,
        synced: StdMutex<Vec<Record>>,
        applied: StdMutex<Vec<Record>>,
        log: StdMutex<Vec<(String, SyncDirection, usize, SyncLogStatus)>>,
        sweeps: StdMutex<usize>,
        fail_apply: bool,
    }

    #[async_trait]
    impl SyncStoreTrait for FakeStore {
        async fn select_pending(&self, _table: MirroredTable) -> Result<Vec<Record>> {
            Ok(self.pending.lock().unwrap().clone())
        }

        async fn mark_synced(
            &self,
            _table: MirroredTable,
            pushed: Vec<Record>,
            _synced_at: String,
        ) -> Result<usize> {
            let count = pushed.len();
            self.synced.lock().unwrap().extend(pushed);
            Ok(count)
        }

        async fn apply_remote(
            &self,
            _table: MirroredTable,
            rows: Vec<Record>,
            _synced_at: String,
        ) -> Result<RemoteApplyOutcome> {
            if self.fail_apply {
                return Err(Error::validation("disk full"));
            }
            let applied = rows.len();
            self.applied.lock().unwrap().extend(rows);
            Ok(RemoteApplyOutcome {
                applied,
                failures: Vec::new(),
            })
        }

        async fn sweep_invalid_keys(&self) -> Result<usize> {
            *self.sweeps.lock().unwrap() += 1;
            Ok(0)
        }

        async fn log_sync(
            &self,
            table: &str,
            direction: SyncDirection,
            record_count: usize,
            status: SyncLogStatus,
        ) -> Result<i64> {
            let mut log = self.log.lock().unwrap();
            log.push((table.to_string(), direction, record_count, status));
            Ok(log.len() as i64)
        }

        async fn fetch_sync_log(&self, _limit: usize) -> Result<Vec<SyncLogEntry>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        upserts: StdMutex<Vec<Vec<Record>>>,
        rows: Vec<Record>,
        fail_upsert: bool,
        hang: bool,
        panic_on_select: bool,
    }

    #[async_trait]
    impl RemoteBackendTrait for FakeBackend {
        async fn select_all(&self, _table: MirroredTable) -> Result<Vec<Record>> {
            if self.panic_on_select {
                panic!("decoder exploded");
            }
            if self.hang {
                futures::future::pending::<()>().await;
            }
            Ok(self.rows.clone())
        }

        async fn upsert(
            &self,
            _table: MirroredTable,
            rows: Vec<Record>,
            _conflict_key: &str,
        ) -> Result<()> {
            if self.fail_upsert {
                return Err(Error::backend(Some(500), "upsert rejected"));
            }
            self.upserts.lock().unwrap().push(rows);
            Ok(())
        }

        async fn delete(
            &self,
            _table: MirroredTable,
            _key_column: &str,
            _key: &Value,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn engine(store: Arc<FakeStore>, backend: Arc<FakeBackend>) -> SyncEngine {
        SyncEngine::with_config(
            store,
            backend,
            SyncEngineConfig {
                call_timeout: Duration::from_millis(50),
                tables: vec![MirroredTable::Todos],
            },
        )
    }

    #[tokio::test]
    async fn push_with_nothing_pending_logs_ok_zero() {
        let store = Arc::new(FakeStore::default());
        let backend = Arc::new(FakeBackend::default());
        let report = engine(store.clone(), backend.clone())
            .push(MirroredTable::Todos)
            .await;

        assert_eq!(report.status, SyncLogStatus::Ok);
        assert_eq!(report.record_count, 0);
        assert!(backend.upserts.lock().unwrap().is_empty());
        assert_eq!(
            store.log.lock().unwrap().as_slice(),
            &[("todos".to_string(), SyncDirection::Push, 0, SyncLogStatus::Ok)]
        );
    }

    #[tokio::test]
    async fn push_strips_control_columns_and_hands_back_snapshot() {
        let store = Arc::new(FakeStore::default());
        store.pending.lock().unwrap().push(record(json!({
            "id": "t1",
            "title": "buy milk",
            "pending_sync": true,
            "deleted": false,
            "last_synced_at": null
        })));
        let backend = Arc::new(FakeBackend::default());

        let report = engine(store.clone(), backend.clone())
            .push(MirroredTable::Todos)
            .await;

        assert!(report.is_ok());
        assert_eq!(report.record_count, 1);
        let upserts = backend.upserts.lock().unwrap();
        assert_eq!(
            Value::Object(upserts[0][0].clone()),
            json!({ "id": "t1", "title": "buy milk" })
        );
        // The unstripped row goes back so the store can tell if it changed.
        let synced = store.synced.lock().unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0]["pending_sync"], json!(true));
        assert_eq!(synced[0]["title"], json!("buy milk"));
    }

    #[tokio::test]
    async fn failed_upsert_logs_error_with_attempted_count() {
        let store = Arc::new(FakeStore::default());
        store
            .pending
            .lock()
            .unwrap()
            .extend([record(json!({ "id": "a" })), record(json!({ "id": "b" }))]);
        let backend = Arc::new(FakeBackend {
            fail_upsert: true,
            ..Default::default()
        });

        let report = engine(store.clone(), backend).push(MirroredTable::Todos).await;

        assert_eq!(report.status, SyncLogStatus::Error);
        assert_eq!(report.record_count, 2);
        assert!(store.synced.lock().unwrap().is_empty());
        assert_eq!(store.log.lock().unwrap()[0].3, SyncLogStatus::Error);
    }

    #[tokio::test]
    async fn hung_backend_times_out_as_error() {
        let store = Arc::new(FakeStore::default());
        let backend = Arc::new(FakeBackend {
            hang: true,
            ..Default::default()
        });

        let report = engine(store.clone(), backend).pull(MirroredTable::Todos).await;

        assert_eq!(report.status, SyncLogStatus::Error);
        assert_eq!(report.record_count, 0);
        assert!(report.message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn panic_inside_phase_is_logged_as_crash() {
        let store = Arc::new(FakeStore::default());
        let backend = Arc::new(FakeBackend {
            panic_on_select: true,
            ..Default::default()
        });

        let report = engine(store.clone(), backend).pull(MirroredTable::Todos).await;

        assert_eq!(report.status, SyncLogStatus::Crash);
        assert_eq!(report.message.as_deref(), Some("decoder exploded"));
        assert_eq!(store.log.lock().unwrap()[0].3, SyncLogStatus::Crash);
    }

    #[tokio::test]
    async fn local_apply_failure_is_a_crash_not_an_error() {
        let store = Arc::new(FakeStore {
            fail_apply: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend {
            rows: vec![record(json!({ "id": "t1" }))],
            ..Default::default()
        });

        let report = engine(store, backend).pull(MirroredTable::Todos).await;

        assert_eq!(report.status, SyncLogStatus::Crash);
        assert_eq!(report.record_count, 0);
    }

    #[tokio::test]
    async fn full_sync_sweeps_once_before_pulls() {
        let store = Arc::new(FakeStore::default());
        let backend = Arc::new(FakeBackend::default());
        let engine = SyncEngine::new(store.clone(), backend);

        let report = engine.full_sync().await;

        assert_eq!(*store.sweeps.lock().unwrap(), 1);
        assert_eq!(report.phases.len(), FULL_SYNC_ORDER.len() * 2);
        let order: Vec<_> = report
            .phases
            .iter()
            .map(|p| (p.table, p.direction))
            .collect();
        assert_eq!(order[0], (MirroredTable::Messages, SyncDirection::Push));
        assert_eq!(order[1], (MirroredTable::Messages, SyncDirection::Pull));
        assert_eq!(
            order.last().copied(),
            Some((MirroredTable::Conversations, SyncDirection::Pull))
        );
    }
}
