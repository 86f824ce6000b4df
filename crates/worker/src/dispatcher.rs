//! Experiment job dispatcher.
//!
//! Polls for pending experiments every `poll_interval` and submits the
//! four compute jobs of each experiment that has no dispatch record yet.
//! The dispatch record is written only after the whole batch was accepted
//! by the queue, so a failed submission is simply retried next cycle.

use std::sync::Arc;
use std::time::Duration;

use stax_core::error::CoreError;
use stax_core::experiment::{Experiment, ExperimentStatus};
use stax_core::job::{job_batch, DEFAULT_JOB_TIMEOUT};
use stax_core::ports::{ExperimentStore, JobQueue};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::deadline::{bounded, Callee, DEFAULT_CALL_TIMEOUT};
use crate::logging::log_experiment_error;

/// Default polling interval for the dispatcher loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

const LOOP_NAME: &str = "dispatcher";

/// Counts from one dispatch cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Experiments whose jobs were submitted in this cycle.
    pub dispatched: usize,
    /// Experiments skipped because a dispatch record already exists.
    pub already_dispatched: usize,
    /// Experiments that failed and will be retried next cycle.
    pub failed: usize,
}

enum DispatchOutcome {
    Dispatched,
    AlreadyDispatched,
}

/// Background job dispatcher.
///
/// A single long-lived Tokio task; experiments within a cycle are handled
/// sequentially.
pub struct Dispatcher {
    store: Arc<dyn ExperimentStore>,
    queue: Arc<dyn JobQueue>,
    poll_interval: Duration,
    job_timeout: Duration,
    call_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with the default 20-second poll interval and
    /// 600-second job timeout.
    pub fn new(store: Arc<dyn ExperimentStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            store,
            queue,
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    /// Limit on each store and queue call made during a cycle.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            job_timeout_secs = self.job_timeout.as_secs(),
            "Experiment dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Experiment dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(report) if report.dispatched > 0 || report.failed > 0 => {
                            tracing::info!(
                                dispatched = report.dispatched,
                                already_dispatched = report.already_dispatched,
                                failed = report.failed,
                                "Dispatch cycle finished",
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(class = %e.class(), error = %e, "Dispatch cycle failed");
                        }
                    }
                }
            }
        }
    }

    /// One dispatch cycle over every pending experiment.
    ///
    /// Only a failure to list pending experiments fails the cycle; errors
    /// on individual experiments are logged and counted.
    pub async fn run_cycle(&self) -> Result<DispatchReport, CoreError> {
        let pending = bounded(
            Callee::Store,
            "list_by_status",
            self.call_timeout,
            self.store.list_by_status(ExperimentStatus::Pending),
        )
        .await?;
        let mut report = DispatchReport::default();

        for experiment in &pending {
            match self.dispatch_one(experiment).await {
                Ok(DispatchOutcome::Dispatched) => report.dispatched += 1,
                Ok(DispatchOutcome::AlreadyDispatched) => report.already_dispatched += 1,
                Err(e) => {
                    report.failed += 1;
                    log_experiment_error(LOOP_NAME, &experiment.id, &e);
                }
            }
        }

        Ok(report)
    }

    async fn dispatch_one(&self, experiment: &Experiment) -> Result<DispatchOutcome, CoreError> {
        let target = experiment.dispatch_target()?;

        let exists = bounded(
            Callee::Store,
            "dispatch_record_exists",
            self.call_timeout,
            self.store.dispatch_record_exists(target.experiment_id),
        )
        .await?;
        if exists {
            return Ok(DispatchOutcome::AlreadyDispatched);
        }

        // The credential only has to exist; the jobs resolve it themselves.
        let credential = bounded(
            Callee::Store,
            "find_credential",
            self.call_timeout,
            self.store.find_credential(target.user_uid),
        )
        .await?;
        if credential.is_none() {
            return Err(CoreError::MissingCredential(target.user_uid.to_string()));
        }

        let jobs = job_batch(target.series_id, target.experiment_id, self.job_timeout);
        let job_ids = bounded(
            Callee::Queue,
            "submit_batch",
            self.call_timeout,
            self.queue.submit_batch(&jobs),
        )
        .await?;
        tracing::info!(
            experiment_id = target.experiment_id,
            series_id = target.series_id,
            ?job_ids,
            "Enqueued experiment jobs",
        );

        let recorded = bounded(
            Callee::Store,
            "create_dispatch_record",
            self.call_timeout,
            self.store.create_dispatch_record(target.experiment_id),
        )
        .await;
        match recorded {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    experiment_id = target.experiment_id,
                    "Dispatch record already present after submission",
                );
            }
            Err(e) => {
                tracing::error!(
                    experiment_id = target.experiment_id,
                    error = %e,
                    "Jobs submitted but dispatch record not written; experiment will be dispatched again",
                );
                return Err(e);
            }
        }

        Ok(DispatchOutcome::Dispatched)
    }
}
