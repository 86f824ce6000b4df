//! Tracing setup and per-experiment failure logging.

use stax_core::error::{CoreError, ErrorClass};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "stax_worker=info,stax_db=info,stax_backend=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Log a failure that was contained to one experiment.
///
/// Transient and data errors are expected to clear (on their own or after
/// a data fix) and log at `warn`; fatal errors log at `error`.
pub fn log_experiment_error(loop_name: &'static str, experiment_id: &str, err: &CoreError) {
    let class = err.class();
    match class {
        ErrorClass::Transient | ErrorClass::Data => tracing::warn!(
            loop_name,
            experiment_id,
            class = %class,
            error = %err,
            "Experiment left for the next cycle",
        ),
        ErrorClass::Fatal => tracing::error!(
            loop_name,
            experiment_id,
            class = %class,
            error = %err,
            "Unexpected failure while processing experiment",
        ),
    }
}

/// Log how a loop task ended at shutdown. Returns `true` for a clean exit;
/// a panicked or aborted task is logged at `error`.
pub fn log_loop_exit(loop_name: &'static str, joined: Result<(), tokio::task::JoinError>) -> bool {
    match joined {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(loop_name, panicked = e.is_panic(), error = %e, "Loop task ended abnormally");
            false
        }
    }
}
