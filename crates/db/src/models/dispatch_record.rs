use sqlx::FromRow;
use stax_core::types::Timestamp;

/// A row from the `dispatch_records` table.
#[derive(Debug, Clone, FromRow)]
pub struct DispatchRecord {
    pub experiment_id: String,
    pub created_at: Timestamp,
}
