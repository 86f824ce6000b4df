//! Domain layer for the Stax experiment orchestrator.
//!
//! Holds the experiment model and its completion predicate, the catalogue
//! of compute functions dispatched per experiment, the error taxonomy, and
//! the collaborator traits implemented by the database and backend crates.

pub mod error;
pub mod experiment;
pub mod job;
pub mod ports;
pub mod types;
