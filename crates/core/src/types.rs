/// Experiment identities are opaque strings assigned by the producer.
pub type ExperimentId = String;

/// Queue primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
