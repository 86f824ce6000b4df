//! Repository for the `experiments` table.
//!
//! Producers create experiments, compute jobs write partial results, and
//! the completion watcher performs the single pending -> complete
//! transition. Every write is a single-row statement.

use sqlx::PgPool;
use stax_core::experiment::ExperimentStatus;

use crate::models::experiment::{CreateExperiment, ExperimentRow};

/// Column list for `experiments` queries.
const COLUMNS: &str = "\
    id, series_id, user_uid, status, models, decomposition, autocorrelation, \
    created_at, updated_at";

/// Provides CRUD operations for experiments.
pub struct ExperimentRepo;

impl ExperimentRepo {
    /// Insert a new pending experiment with no partial results.
    pub async fn create(
        pool: &PgPool,
        input: &CreateExperiment,
    ) -> Result<ExperimentRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO experiments (id, series_id, user_uid, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExperimentRow>(&query)
            .bind(&input.id)
            .bind(&input.series_id)
            .bind(&input.user_uid)
            .bind(ExperimentStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ExperimentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM experiments WHERE id = $1");
        sqlx::query_as::<_, ExperimentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All experiments in the given status, oldest first.
    pub async fn list_by_status(
        pool: &PgPool,
        status: ExperimentStatus,
    ) -> Result<Vec<ExperimentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM experiments WHERE status = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, ExperimentRow>(&query)
            .bind(status.as_str())
            .fetch_all(pool)
            .await
    }

    /// Store one model's output under `model_key`, replacing any earlier
    /// output for the same model. Returns `false` if the experiment does
    /// not exist.
    pub async fn record_model_result(
        pool: &PgPool,
        id: &str,
        model_key: &str,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE experiments \
             SET models = models || jsonb_build_object($2::TEXT, $3::JSONB), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(model_key)
        .bind(result)
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    pub async fn record_decomposition(
        pool: &PgPool,
        id: &str,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE experiments SET decomposition = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    pub async fn record_autocorrelation(
        pool: &PgPool,
        id: &str,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE experiments SET autocorrelation = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Conditionally move an experiment from `from` to `to`.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub async fn transition_status(
        pool: &PgPool,
        id: &str,
        from: ExperimentStatus,
        to: ExperimentStatus,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE experiments SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }
}
