//! Repository for the `job_units` queue table.
//!
//! The submission side (`enqueue_batch`) is used by the dispatcher. The
//! consumer side (`claim_next`, `finish`, `fail`, `requeue_timed_out`) is
//! used by compute executors. Delivery is at-least-once: a unit whose
//! claim outlives its timeout is handed out again.

use sqlx::PgPool;
use stax_core::job::JobUnit;
use stax_core::types::DbId;

use crate::models::job_unit::QueuedJobUnit;
use crate::models::status::JobUnitStatus;

/// Column list for `job_units` queries.
const COLUMNS: &str = "\
    id, function_name, series_id, experiment_id, timeout_secs, status_id, \
    attempts, error_message, enqueued_at, claimed_at, completed_at";

pub struct JobUnitRepo;

impl JobUnitRepo {
    /// Enqueue every unit in one transaction. Returns the new ids in
    /// submission order.
    pub async fn enqueue_batch(pool: &PgPool, jobs: &[JobUnit]) -> Result<Vec<DbId>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut ids = Vec::with_capacity(jobs.len());

        for job in jobs {
            let id = sqlx::query_scalar::<_, DbId>(
                "INSERT INTO job_units \
                     (function_name, series_id, experiment_id, timeout_secs, status_id) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id",
            )
            .bind(job.function.name())
            .bind(&job.series_id)
            .bind(&job.experiment_id)
            .bind(i32::try_from(job.timeout.as_secs()).unwrap_or(i32::MAX))
            .bind(JobUnitStatus::Queued.id())
            .fetch_one(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Atomically claim the oldest queued unit.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent executors never
    /// claim the same unit.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<QueuedJobUnit>, sqlx::Error> {
        let query = format!(
            "UPDATE job_units \
             SET status_id = $1, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM job_units \
                 WHERE status_id = $2 \
                 ORDER BY enqueued_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueuedJobUnit>(&query)
            .bind(JobUnitStatus::Running.id())
            .bind(JobUnitStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a running unit as finished.
    pub async fn finish(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE job_units SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(JobUnitStatus::Finished.id())
        .bind(JobUnitStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Mark a running unit as failed with an error message.
    ///
    /// Failed units are not retried automatically.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE job_units SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(JobUnitStatus::Failed.id())
        .bind(error)
        .bind(JobUnitStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Put units whose claim has outlived their timeout back in the queue.
    /// Returns how many were requeued.
    pub async fn requeue_timed_out(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE job_units SET status_id = $1, claimed_at = NULL \
             WHERE status_id = $2 \
               AND claimed_at + timeout_secs * INTERVAL '1 second' < NOW()",
        )
        .bind(JobUnitStatus::Queued.id())
        .bind(JobUnitStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected())
    }

    pub async fn list_for_experiment(
        pool: &PgPool,
        experiment_id: &str,
    ) -> Result<Vec<QueuedJobUnit>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_units WHERE experiment_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, QueuedJobUnit>(&query)
            .bind(experiment_id)
            .fetch_all(pool)
            .await
    }
}
