//! Postgres-backed implementations of the collaborator traits.

use async_trait::async_trait;
use stax_core::error::CoreError;
use stax_core::experiment::{Experiment, ExperimentStatus};
use stax_core::job::JobUnit;
use stax_core::ports::{ExperimentStore, JobQueue, OwnerCredential};
use stax_core::types::DbId;

use crate::repositories::{DispatchRecordRepo, ExperimentRepo, JobUnitRepo, TokenRepo};
use crate::{queue_error, store_error, DbPool};

/// Experiment store over the `experiments`, `dispatch_records` and
/// `user_tokens` tables.
#[derive(Clone)]
pub struct PgExperimentStore {
    pool: DbPool,
}

impl PgExperimentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ExperimentStore for PgExperimentStore {
    async fn list_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>, CoreError> {
        let rows = ExperimentRepo::list_by_status(&self.pool, status)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Experiment::from).collect())
    }

    async fn dispatch_record_exists(&self, experiment_id: &str) -> Result<bool, CoreError> {
        DispatchRecordRepo::exists(&self.pool, experiment_id)
            .await
            .map_err(store_error)
    }

    async fn create_dispatch_record(&self, experiment_id: &str) -> Result<bool, CoreError> {
        DispatchRecordRepo::create(&self.pool, experiment_id)
            .await
            .map_err(store_error)
    }

    async fn find_credential(&self, user_uid: &str) -> Result<Option<OwnerCredential>, CoreError> {
        let row = TokenRepo::find_by_user(&self.pool, user_uid)
            .await
            .map_err(store_error)?;
        Ok(row.map(OwnerCredential::from))
    }

    async fn transition_status(
        &self,
        experiment_id: &str,
        from: ExperimentStatus,
        to: ExperimentStatus,
    ) -> Result<bool, CoreError> {
        ExperimentRepo::transition_status(&self.pool, experiment_id, from, to)
            .await
            .map_err(store_error)
    }
}

/// Work queue over the `job_units` table.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn submit_batch(&self, jobs: &[JobUnit]) -> Result<Vec<DbId>, CoreError> {
        JobUnitRepo::enqueue_batch(&self.pool, jobs)
            .await
            .map_err(queue_error)
    }
}
