//! HTTP client for the relational backend the local store mirrors.
//!
//! The backend speaks the PostgREST dialect: one resource per table under
//! `/rest/v1/`, upserts via `on_conflict`, filters as `column=eq.value`.

pub mod client;
pub mod error;

pub use client::{BackendClient, BackendConfig};
pub use error::BackendError;
