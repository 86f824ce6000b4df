//! Compute functions and the job units submitted for each experiment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-job execution timeout handed to the queue.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// The opaque compute routines run by the executor.
///
/// Three model-training functions plus the combined statistics function,
/// which produces both the decomposition and the autocorrelation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeFunction {
    Arima,
    Ets,
    Tbats,
    Statistics,
}

impl ComputeFunction {
    /// Every function dispatched once per experiment.
    pub const ALL: [ComputeFunction; 4] = [
        ComputeFunction::Arima,
        ComputeFunction::Ets,
        ComputeFunction::Statistics,
        ComputeFunction::Tbats,
    ];

    /// Function identifier the executor resolves.
    pub fn name(self) -> &'static str {
        match self {
            ComputeFunction::Arima => "run_arima_job",
            ComputeFunction::Ets => "run_ets_job",
            ComputeFunction::Tbats => "run_tbats_job",
            ComputeFunction::Statistics => "run_statistics_job",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Model key the function writes into the experiment's `models` field,
    /// or `None` for the statistics function.
    pub fn model_key(self) -> Option<&'static str> {
        match self {
            ComputeFunction::Arima => Some("arima"),
            ComputeFunction::Ets => Some("ets"),
            ComputeFunction::Tbats => Some("tbats"),
            ComputeFunction::Statistics => None,
        }
    }
}

impl std::fmt::Display for ComputeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of work: a compute function and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobUnit {
    pub function: ComputeFunction,
    pub series_id: String,
    pub experiment_id: String,
    #[serde(with = "timeout_secs")]
    pub timeout: Duration,
}

impl JobUnit {
    /// Positional arguments in submission order: series, then experiment.
    pub fn args(&self) -> [&str; 2] {
        [&self.series_id, &self.experiment_id]
    }
}

/// Build the full batch of job units for one experiment.
pub fn job_batch(series_id: &str, experiment_id: &str, timeout: Duration) -> Vec<JobUnit> {
    ComputeFunction::ALL
        .into_iter()
        .map(|function| JobUnit {
            function,
            series_id: series_id.to_string(),
            experiment_id: experiment_id.to_string(),
            timeout,
        })
        .collect()
}

mod timeout_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
