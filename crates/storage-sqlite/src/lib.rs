//! SQLite-backed local store for the Adjunct sync layer.
//!
//! Every table the app mirrors lives here with three extra bookkeeping
//! columns (`pending_sync`, `deleted`, `last_synced_at`), plus the `sync_log`
//! audit table.

pub mod codec;
pub mod db;
pub mod errors;
mod integrity;
mod mutations;
pub mod schema;
mod store;
pub mod sync_log;
mod sync_store;

pub use errors::StorageError;
pub use store::{LocalStore, SyncMarks};
pub use sync_log::SyncLogRepository;
