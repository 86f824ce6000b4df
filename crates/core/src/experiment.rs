//! Experiment documents and the completion predicate.
//!
//! An [`Experiment`] is kept exactly as the store holds it: loosely typed
//! result fields, optional identity fields. Validation happens lazily per
//! experiment (see [`Experiment::dispatch_target`] and
//! [`Experiment::results`]) so one malformed document only fails its own
//! evaluation, never a whole polling cycle.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ExperimentId, Timestamp};

/// Number of model results required before an experiment can complete.
pub const REQUIRED_MODEL_RESULTS: usize = 3;

/// Field name of the status on the backend representation.
pub const STATUS_FIELD: &str = "status";

/// Experiment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Pending,
    Complete,
}

impl ExperimentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExperimentStatus::Pending => "pending",
            ExperimentStatus::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperimentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExperimentStatus::Pending),
            "complete" => Ok(ExperimentStatus::Complete),
            other => Err(CoreError::Malformed(format!(
                "unknown experiment status '{other}'"
            ))),
        }
    }
}

/// An experiment document as held by the experiment store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    /// Reference to the input time series.
    pub series_id: Option<String>,
    /// Owning user; keys the credential lookup.
    pub user_uid: Option<String>,
    pub status: String,
    /// Model outputs keyed by model name. Expected to be a JSON object.
    pub models: serde_json::Value,
    pub decomposition: Option<serde_json::Value>,
    pub autocorrelation: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The validated arguments needed to dispatch an experiment's jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTarget<'a> {
    pub experiment_id: &'a str,
    pub series_id: &'a str,
    pub user_uid: &'a str,
}

/// Partial results written back by the compute jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialResults {
    pub models: BTreeMap<String, serde_json::Value>,
    pub decomposition: Option<serde_json::Value>,
    pub autocorrelation: Option<serde_json::Value>,
}

impl PartialResults {
    /// The completion predicate: exactly three model results, plus both
    /// statistics outputs.
    pub fn is_complete(&self) -> bool {
        self.models.len() == REQUIRED_MODEL_RESULTS
            && self.decomposition.is_some()
            && self.autocorrelation.is_some()
    }

    /// Names of the outputs still missing, for logging.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.models.len() != REQUIRED_MODEL_RESULTS {
            missing.push("models");
        }
        if self.decomposition.is_none() {
            missing.push("decomposition");
        }
        if self.autocorrelation.is_none() {
            missing.push("autocorrelation");
        }
        missing
    }
}

impl Experiment {
    /// A freshly created experiment: pending, no partial results.
    pub fn pending(
        id: impl Into<ExperimentId>,
        series_id: impl Into<String>,
        user_uid: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: id.into(),
            series_id: Some(series_id.into()),
            user_uid: Some(user_uid.into()),
            status: ExperimentStatus::Pending.as_str().to_string(),
            models: serde_json::Value::Object(serde_json::Map::new()),
            decomposition: None,
            autocorrelation: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Result<ExperimentStatus, CoreError> {
        self.status.parse()
    }

    /// Validate the fields the dispatcher needs.
    pub fn dispatch_target(&self) -> Result<DispatchTarget<'_>, CoreError> {
        let series_id = non_empty(self.series_id.as_deref())
            .ok_or_else(|| self.malformed("missing series reference"))?;
        let user_uid = non_empty(self.user_uid.as_deref())
            .ok_or_else(|| self.malformed("missing owning user"))?;
        Ok(DispatchTarget {
            experiment_id: &self.id,
            series_id,
            user_uid,
        })
    }

    /// Parse the partial result fields.
    ///
    /// JSON `null` in a statistics field counts as absent. A `models` field
    /// that is not a JSON object is a data error.
    pub fn results(&self) -> Result<PartialResults, CoreError> {
        let models = match &self.models {
            serde_json::Value::Object(map) => map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            other => {
                return Err(self.malformed(&format!(
                    "models must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        Ok(PartialResults {
            models,
            decomposition: present(&self.decomposition),
            autocorrelation: present(&self.autocorrelation),
        })
    }

    fn malformed(&self, reason: &str) -> CoreError {
        CoreError::Malformed(format!("experiment {}: {reason}", self.id))
    }
}

/// Set `status` on a backend representation, which must be a JSON object.
pub fn mark_representation(
    representation: &mut serde_json::Value,
    status: ExperimentStatus,
) -> Result<(), CoreError> {
    match representation {
        serde_json::Value::Object(map) => {
            map.insert(
                STATUS_FIELD.to_string(),
                serde_json::Value::String(status.as_str().to_string()),
            );
            Ok(())
        }
        other => Err(CoreError::Malformed(format!(
            "backend representation must be an object, got {}",
            json_kind(other)
        ))),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn present(value: &Option<serde_json::Value>) -> Option<serde_json::Value> {
    value.as_ref().filter(|v| !v.is_null()).cloned()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
