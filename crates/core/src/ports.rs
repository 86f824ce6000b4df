//! Collaborator traits.
//!
//! The dispatcher and completion watcher only talk to the outside world
//! through these traits. Production implementations live in `stax-db`
//! (store and queue) and `stax-backend` (backend sync client); tests use
//! in-memory fakes.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::experiment::{Experiment, ExperimentStatus};
use crate::job::JobUnit;
use crate::types::DbId;

/// A token associated with a user identity.
#[derive(Clone, PartialEq, Eq)]
pub struct OwnerCredential {
    pub user_uid: String,
    pub token: String,
}

impl std::fmt::Debug for OwnerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerCredential")
            .field("user_uid", &self.user_uid)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Experiment documents, dispatch records and owner credentials.
///
/// Every method is a single atomic read or write on one document.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// All experiments currently in `status`.
    async fn list_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>, CoreError>;

    /// Whether a dispatch record exists for the experiment.
    async fn dispatch_record_exists(&self, experiment_id: &str) -> Result<bool, CoreError>;

    /// Create the dispatch record. Returns `false` if one already existed.
    async fn create_dispatch_record(&self, experiment_id: &str) -> Result<bool, CoreError>;

    /// Look up the credential for a user.
    async fn find_credential(&self, user_uid: &str) -> Result<Option<OwnerCredential>, CoreError>;

    /// Move an experiment from `from` to `to`. Returns `false` if the
    /// experiment was not in `from`.
    async fn transition_status(
        &self,
        experiment_id: &str,
        from: ExperimentStatus,
        to: ExperimentStatus,
    ) -> Result<bool, CoreError>;
}

/// Submission side of the work queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a batch of job units. Either every unit is enqueued or none
    /// is. Returns the queue identifiers in submission order.
    async fn submit_batch(&self, jobs: &[JobUnit]) -> Result<Vec<DbId>, CoreError>;
}

/// Read/write access to the canonical experiment representation.
///
/// Implementations do not retry; the completion watcher re-drives failed
/// calls on its next cycle.
#[async_trait]
pub trait ExperimentBackend: Send + Sync {
    /// Fetch the full representation of an experiment.
    async fn fetch(&self, experiment_id: &str) -> Result<serde_json::Value, CoreError>;

    /// Overwrite the representation. Returns the HTTP status code of the
    /// response, whatever it is; only transport failures are errors.
    async fn update(
        &self,
        experiment_id: &str,
        representation: &serde_json::Value,
    ) -> Result<u16, CoreError>;
}
