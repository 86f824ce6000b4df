//! Postgres persistence for experiments, dispatch records, credentials and
//! the job queue.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use stax_core::error::CoreError;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::{PgExperimentStore, PgJobQueue};

pub type DbPool = sqlx::PgPool;

/// Upper bound on waiting for a pooled connection, so an unreachable
/// database fails a cycle instead of hanging it.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a connection pool from a database URL.
///
/// Every connection runs with `statement_timeout` set, so the server
/// cancels a statement that outlives it.
pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
    statement_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    let options = connect_options(database_url, statement_timeout)?;
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
}

fn connect_options(database_url: &str, statement_timeout: Duration) -> Result<PgConnectOptions, sqlx::Error> {
    Ok(PgConnectOptions::from_str(database_url)?
        .options([("statement_timeout", statement_timeout.as_millis().to_string())]))
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Classify a sqlx error raised by an experiment store operation.
pub fn store_error(err: sqlx::Error) -> CoreError {
    if is_data_error(&err) {
        CoreError::Malformed(err.to_string())
    } else {
        CoreError::Store(err.to_string())
    }
}

/// Classify a sqlx error raised by a queue operation.
pub fn queue_error(err: sqlx::Error) -> CoreError {
    if is_data_error(&err) {
        CoreError::Malformed(err.to_string())
    } else {
        CoreError::Queue(err.to_string())
    }
}

fn is_data_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. }
    )
}
