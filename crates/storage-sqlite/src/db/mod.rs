//! Connection ownership: one worker thread owns the SQLite connection and runs
//! every read and write in submission order.
//!
//! Async callers never block on SQLite; they hand a closure to the worker and
//! await its reply. Each job is atomic, but nothing spans two jobs: a push
//! that reads rows and later marks them synced relies on the mark being
//! conditional on the row being unchanged.

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use adjunct_core::errors::{DatabaseError, Error, Result};
use log::{debug, error};
use rusqlite::{Connection, Transaction};
use tokio::sync::oneshot;

use crate::errors::StorageError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Handle to the database worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WriteHandle {
    jobs: mpsc::Sender<Job>,
}

/// Opens (creating if needed) the store file and starts its worker.
pub fn open(path: impl AsRef<Path>) -> Result<WriteHandle> {
    let path = path.as_ref();
    let conn = Connection::open(path).map_err(|source| StorageError::Open {
        path: path.display().to_string(),
        source,
    })?;
    configure(&conn).map_err(|source| StorageError::Open {
        path: path.display().to_string(),
        source,
    })?;
    debug!("[LocalStore] Opened database at {}", path.display());
    spawn_worker(conn)
}

/// Private in-memory store, mostly for tests.
pub fn open_in_memory() -> Result<WriteHandle> {
    let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
        path: ":memory:".to_string(),
        source,
    })?;
    spawn_worker(conn)
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // journal_mode answers with the resulting mode, so it has to be read as a row.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    debug!("[LocalStore] journal_mode={}", mode);
    Ok(())
}

fn spawn_worker(conn: Connection) -> Result<WriteHandle> {
    let (jobs, inbox) = mpsc::channel::<Job>();
    thread::Builder::new()
        .name("adjunct-db".to_string())
        .spawn(move || {
            let mut conn = conn;
            while let Ok(job) = inbox.recv() {
                job(&mut conn);
            }
            debug!("[LocalStore] Database worker stopped");
        })
        .map_err(StorageError::from)?;
    Ok(WriteHandle { jobs })
}

fn run_in_transaction<T, F>(conn: &mut Connection, job: F) -> Result<T>
where
    F: FnOnce(&mut Transaction<'_>) -> Result<T>,
{
    let mut tx = conn.transaction().map_err(StorageError::from)?;
    let value = job(&mut tx)?;
    tx.commit().map_err(StorageError::from)?;
    Ok(value)
}

impl WriteHandle {
    /// Runs `job` inside a transaction on the worker; rolled back if it fails.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move |conn| run_in_transaction(conn, job)).await
    }

    /// Runs `job` on the worker without opening a transaction.
    pub async fn read<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move |conn| job(conn)).await
    }

    async fn submit<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let boxed: Job = Box::new(move |conn| {
            // The caller may have gone away; nothing to do then.
            let _ = reply.send(job(conn));
        });
        if self.jobs.send(boxed).is_err() {
            error!("[LocalStore] Database worker is not running");
            return Err(Error::Database(DatabaseError::WorkerUnavailable));
        }
        response
            .await
            .map_err(|_| Error::Database(DatabaseError::WorkerUnavailable))?
    }
}
