//! Queue rows for submitted job units.

use sqlx::FromRow;
use stax_core::job::ComputeFunction;
use stax_core::types::{DbId, Timestamp};

use super::status::{JobUnitStatus, StatusId};

/// A row from the `job_units` table.
#[derive(Debug, Clone, FromRow)]
pub struct QueuedJobUnit {
    pub id: DbId,
    pub function_name: String,
    pub series_id: String,
    pub experiment_id: String,
    pub timeout_secs: i32,
    pub status_id: StatusId,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub enqueued_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl QueuedJobUnit {
    /// The compute function this unit names, if the executor knows it.
    pub fn function(&self) -> Option<ComputeFunction> {
        ComputeFunction::from_name(&self.function_name)
    }

    pub fn status(&self) -> Option<JobUnitStatus> {
        JobUnitStatus::from_id(self.status_id)
    }
}
