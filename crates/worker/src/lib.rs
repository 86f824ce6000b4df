//! `stax-worker` library crate.
//!
//! Hosts the two polling loops of the orchestrator: the [`Dispatcher`],
//! which submits each pending experiment's compute jobs exactly once, and
//! the [`CompletionWatcher`], which finalizes experiments whose results
//! are all present. The binary entrypoint lives in `main.rs`.

pub mod completion;
pub mod config;
pub mod deadline;
pub mod dispatcher;
pub mod logging;

pub use completion::{CompletionReport, CompletionWatcher};
pub use config::{ConfigError, WorkerConfig};
pub use dispatcher::{DispatchReport, Dispatcher};
