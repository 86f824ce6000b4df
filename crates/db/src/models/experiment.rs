//! Experiment row and create DTO.

use serde::Deserialize;
use sqlx::FromRow;
use stax_core::experiment::Experiment;
use stax_core::types::Timestamp;

/// A row from the `experiments` table.
#[derive(Debug, Clone, FromRow)]
pub struct ExperimentRow {
    pub id: String,
    pub series_id: Option<String>,
    pub user_uid: Option<String>,
    pub status: String,
    pub models: serde_json::Value,
    pub decomposition: Option<serde_json::Value>,
    pub autocorrelation: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ExperimentRow> for Experiment {
    fn from(row: ExperimentRow) -> Self {
        Experiment {
            id: row.id,
            series_id: row.series_id,
            user_uid: row.user_uid,
            status: row.status,
            models: row.models,
            decomposition: row.decomposition,
            autocorrelation: row.autocorrelation,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DTO for creating a pending experiment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExperiment {
    pub id: String,
    pub series_id: String,
    pub user_uid: String,
}
