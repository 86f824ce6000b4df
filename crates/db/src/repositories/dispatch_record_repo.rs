//! Repository for the `dispatch_records` side table.
//!
//! The primary key on `experiment_id` guarantees at most one record per
//! experiment; existence of the row is the dispatcher's only
//! de-duplication signal.

use sqlx::PgPool;

use crate::models::dispatch_record::DispatchRecord;

pub struct DispatchRecordRepo;

impl DispatchRecordRepo {
    pub async fn exists(pool: &PgPool, experiment_id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM dispatch_records WHERE experiment_id = $1)",
        )
        .bind(experiment_id)
        .fetch_one(pool)
        .await
    }

    /// Insert the record. Returns `false` if it already existed.
    pub async fn create(pool: &PgPool, experiment_id: &str) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "INSERT INTO dispatch_records (experiment_id) VALUES ($1) \
             ON CONFLICT (experiment_id) DO NOTHING",
        )
        .bind(experiment_id)
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    pub async fn find(
        pool: &PgPool,
        experiment_id: &str,
    ) -> Result<Option<DispatchRecord>, sqlx::Error> {
        sqlx::query_as::<_, DispatchRecord>(
            "SELECT experiment_id, created_at FROM dispatch_records WHERE experiment_id = $1",
        )
        .bind(experiment_id)
        .fetch_optional(pool)
        .await
    }
}
