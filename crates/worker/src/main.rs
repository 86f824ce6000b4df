//! `stax-worker` -- experiment orchestration daemon.
//!
//! Runs the dispatcher and the completion watcher side by side until
//! SIGINT/SIGTERM. See [`WorkerConfig::from_env`] for the environment
//! variables it reads.

use std::sync::Arc;

use anyhow::Context;
use stax_backend::BackendClient;
use stax_db::{PgExperimentStore, PgJobQueue};
use stax_worker::config::WorkerConfig;
use stax_worker::{logging, CompletionWatcher, Dispatcher};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    // --- Configuration ---
    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(?config, "Loaded worker configuration");

    // --- Database ---
    let pool = stax_db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.store_timeout,
    )
    .await
        .context("Failed to connect to experiment database")?;
    stax_db::health_check(&pool)
        .await
        .context("Experiment database health check failed")?;
    stax_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Experiment database ready");

    let queue_pool = if config.queue_database_url == config.database_url {
        pool.clone()
    } else {
        let queue_pool = stax_db::create_pool(
            &config.queue_database_url,
            config.db_max_connections,
            config.store_timeout,
        )
        .await
        .context("Failed to connect to queue database")?;
        stax_db::run_migrations(&queue_pool)
            .await
            .context("Failed to run queue database migrations")?;
        queue_pool
    };
    tracing::info!("Queue database ready");

    // --- Collaborators ---
    let store = Arc::new(PgExperimentStore::new(pool.clone()));
    let queue = Arc::new(PgJobQueue::new(queue_pool.clone()));
    let backend = Arc::new(
        BackendClient::new(
            &config.backend_uri,
            &config.backend_auth_token,
            config.backend_timeout,
        )
        .context("Failed to build backend client")?,
    );

    // --- Loops ---
    let cancel = CancellationToken::new();

    let dispatcher = Dispatcher::new(store.clone(), queue)
        .with_poll_interval(config.dispatch_interval)
        .with_job_timeout(config.job_timeout)
        .with_call_timeout(config.store_timeout);
    let dispatcher_cancel = cancel.clone();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run(dispatcher_cancel).await;
    });

    let watcher = CompletionWatcher::new(store, backend)
        .with_poll_interval(config.completion_interval)
        .with_call_timeout(config.store_timeout);
    let watcher_cancel = cancel.clone();
    let watcher_handle = tokio::spawn(async move {
        watcher.run(watcher_cancel).await;
    });

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    let joined = tokio::time::timeout(config.shutdown_timeout, async {
        logging::log_loop_exit("dispatcher", dispatcher_handle.await);
        logging::log_loop_exit("completion_watcher", watcher_handle.await);
    })
    .await;
    if joined.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout.as_secs(),
            "Loops did not stop in time",
        );
    }

    queue_pool.close().await;
    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
