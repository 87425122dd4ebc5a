//! Offline-first sync domain: mirrored tables, records, the sync log model and the engine.

mod engine;
mod identifiers;
mod record;
mod scheduler;
mod sync_log_model;
mod tables;
mod traits;

pub use engine::*;
pub use identifiers::*;
pub use record::*;
pub use scheduler::*;
pub use sync_log_model::*;
pub use tables::*;
pub use traits::*;
