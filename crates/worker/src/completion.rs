//! Completion watcher.
//!
//! Polls for pending experiments every `poll_interval`. An experiment whose
//! partial results satisfy the completion predicate is fetched from the
//! backend, marked complete there, and only after the backend acknowledged
//! with 200 is the local record moved to `complete`. Any failure leaves the
//! experiment pending so the next cycle tries again; re-sending `complete`
//! is a plain overwrite on the backend.

use std::sync::Arc;
use std::time::Duration;

use stax_core::error::CoreError;
use stax_core::experiment::{mark_representation, Experiment, ExperimentStatus};
use stax_core::ports::{ExperimentBackend, ExperimentStore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::deadline::{bounded, Callee, DEFAULT_CALL_TIMEOUT};
use crate::logging::log_experiment_error;

/// Default polling interval for the watcher loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Status code the backend answers a successful update with.
const UPDATE_OK: u16 = 200;

const LOOP_NAME: &str = "completion_watcher";

/// Counts from one watcher cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    pub completed: usize,
    pub not_ready: usize,
    pub failed: usize,
}

enum CompletionOutcome {
    Completed,
    NotReady,
}

pub struct CompletionWatcher {
    store: Arc<dyn ExperimentStore>,
    backend: Arc<dyn ExperimentBackend>,
    poll_interval: Duration,
    call_timeout: Duration,
}

impl CompletionWatcher {
    pub fn new(store: Arc<dyn ExperimentStore>, backend: Arc<dyn ExperimentBackend>) -> Self {
        Self {
            store,
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Limit on each store call; backend calls are bounded by the client.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run the watcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Completion watcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Completion watcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) if report.completed > 0 || report.failed > 0 => {
                            tracing::info!(
                                completed = report.completed,
                                not_ready = report.not_ready,
                                failed = report.failed,
                                "Completion cycle finished",
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(class = %e.class(), error = %e, "Completion cycle failed");
                        }
                    }
                }
            }
        }
    }

    /// One pass over every pending experiment.
    pub async fn run_cycle(&self) -> Result<CompletionReport, CoreError> {
        let pending = bounded(
            Callee::Store,
            "list_by_status",
            self.call_timeout,
            self.store.list_by_status(ExperimentStatus::Pending),
        )
        .await?;
        let mut report = CompletionReport::default();

        for experiment in &pending {
            match self.complete_one(experiment).await {
                Ok(CompletionOutcome::Completed) => report.completed += 1,
                Ok(CompletionOutcome::NotReady) => report.not_ready += 1,
                Err(e) => {
                    report.failed += 1;
                    log_experiment_error(LOOP_NAME, &experiment.id, &e);
                }
            }
        }

        Ok(report)
    }

    async fn complete_one(&self, experiment: &Experiment) -> Result<CompletionOutcome, CoreError> {
        let results = experiment.results()?;
        if !results.is_complete() {
            tracing::debug!(
                experiment_id = %experiment.id,
                missing = ?results.missing(),
                "Experiment not ready",
            );
            return Ok(CompletionOutcome::NotReady);
        }

        let mut representation = self.backend.fetch(&experiment.id).await?;
        mark_representation(&mut representation, ExperimentStatus::Complete)?;

        let status = self.backend.update(&experiment.id, &representation).await?;
        if status != UPDATE_OK {
            return Err(CoreError::BackendStatus(status));
        }

        let transitioned = bounded(
            Callee::Store,
            "transition_status",
            self.call_timeout,
            self.store.transition_status(
                &experiment.id,
                ExperimentStatus::Pending,
                ExperimentStatus::Complete,
            ),
        )
        .await?;
        if !transitioned {
            tracing::debug!(
                experiment_id = %experiment.id,
                "Experiment left pending before the local transition",
            );
        }

        tracing::info!(experiment_id = %experiment.id, status, "Experiment marked complete");
        Ok(CompletionOutcome::Completed)
    }
}
