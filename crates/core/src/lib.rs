//! Domain core for the adjunct offline-first sync layer.
//!
//! Storage and transport live in sibling crates; this crate owns the table
//! catalogue, the record model and the push/pull engine that drives them.

pub mod errors;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};
