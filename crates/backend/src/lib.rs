//! Backend sync client.
//!
//! Reads and writes the canonical experiment representation held by the
//! backend system of record.

pub mod client;

pub use client::{BackendClient, BackendError, AUTH_HEADER};
