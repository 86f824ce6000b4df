//! Integration tests for the completion watcher.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{InMemoryBackend, InMemoryStore};
use serde_json::json;
use stax_core::error::{CoreError, ErrorClass};
use stax_core::ports::ExperimentBackend;
use stax_worker::{CompletionReport, CompletionWatcher};
use tokio_util::sync::CancellationToken;

struct Fixture {
    store: Arc<InMemoryStore>,
    backend: Arc<InMemoryBackend>,
    watcher: CompletionWatcher,
}

fn fixture(ids: &[&str]) -> Fixture {
    let store = Arc::new(InMemoryStore::default());
    let backend = Arc::new(InMemoryBackend::default());
    for id in ids {
        store.insert_pending(id, "user-1");
        backend.insert_pending(id);
    }
    let watcher = CompletionWatcher::new(store.clone(), backend.clone());
    Fixture {
        store,
        backend,
        watcher,
    }
}

// ---------------------------------------------------------------------------
// Test: completion predicate drives the transition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn complete_results_transition_to_complete() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");

    let report = f.watcher.run_cycle().await.unwrap();

    assert_eq!(
        report,
        CompletionReport {
            completed: 1,
            not_ready: 0,
            failed: 0
        }
    );
    let backend_copy = f.backend.experiment("e1").unwrap();
    assert_eq!(backend_copy["status"], "complete");
    // Fields the backend owns are preserved.
    assert_eq!(backend_copy["title"], "Experiment e1");
    assert_eq!(f.store.experiment("e1").status, "complete");
}

#[tokio::test]
async fn any_missing_output_prevents_completion() {
    let f = fixture(&["models", "decomp", "acf"]);
    for id in ["models", "decomp", "acf"] {
        f.store.complete_results(id);
    }
    f.store
        .update("models", |exp| exp.models = json!({"arima": {}, "ets": {}}));
    f.store.update("decomp", |exp| exp.decomposition = None);
    f.store.update("acf", |exp| exp.autocorrelation = None);

    let report = f.watcher.run_cycle().await.unwrap();

    assert_eq!(report.not_ready, 3);
    assert_eq!(report.completed, 0);
    assert!(f.backend.updates().is_empty());
    for id in ["models", "decomp", "acf"] {
        assert_eq!(f.store.experiment(id).status, "pending");
        assert_eq!(f.backend.experiment(id).unwrap()["status"], "pending");
    }
}

#[tokio::test]
async fn two_models_never_complete_across_cycles() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");
    f.store
        .update("e1", |exp| exp.models = json!({"arima": {}, "tbats": {}}));

    for _ in 0..3 {
        let report = f.watcher.run_cycle().await.unwrap();
        assert_eq!(report.not_ready, 1);
    }
    assert_eq!(f.store.experiment("e1").status, "pending");
}

#[tokio::test]
async fn completed_experiment_is_not_revisited() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");

    f.watcher.run_cycle().await.unwrap();
    let report = f.watcher.run_cycle().await.unwrap();

    assert_eq!(report, CompletionReport::default());
    assert_eq!(f.backend.updates().len(), 1);
}

// ---------------------------------------------------------------------------
// Test: backend failures keep the experiment pending
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_200_update_keeps_local_state_and_retries() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");
    f.backend.script_codes(&[503]);

    let report = f.watcher.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(f.store.experiment("e1").status, "pending");

    let report = f.watcher.run_cycle().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(f.store.experiment("e1").status, "complete");

    // Both attempts sent the same overwrite.
    let updates = f.backend.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], updates[1]);
}

#[tokio::test]
async fn unreachable_backend_keeps_experiment_pending() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");
    f.backend.set_unreachable(true);

    let report = f.watcher.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(f.store.experiment("e1").status, "pending");

    f.backend.set_unreachable(false);
    let report = f.watcher.run_cycle().await.unwrap();
    assert_eq!(report.completed, 1);
}

#[tokio::test]
async fn non_object_backend_representation_is_a_data_error() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");
    f.backend.insert("e1", json!(["not", "an", "object"]));

    let report = f.watcher.run_cycle().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(f.backend.updates().is_empty());
    assert_eq!(f.store.experiment("e1").status, "pending");
}

// ---------------------------------------------------------------------------
// Test: isolation within one cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_experiment_does_not_block_completion_of_others() {
    let f = fixture(&["a-broken", "b-ready"]);
    f.store.complete_results("b-ready");
    f.store
        .update("a-broken", |exp| exp.models = json!("three models"));

    let report = f.watcher.run_cycle().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(f.store.experiment("b-ready").status, "complete");
    assert_eq!(f.backend.experiment("b-ready").unwrap()["status"], "complete");
}

#[tokio::test]
async fn backend_missing_one_experiment_does_not_block_others() {
    let f = fixture(&["e1", "e2"]);
    f.store.complete_results("e1");
    f.store.complete_results("e2");
    f.store.insert_pending("e3", "user-1");
    f.store.complete_results("e3");

    let report = f.watcher.run_cycle().await.unwrap();

    // e3 only exists locally: the backend answers 404 for it.
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(f.store.experiment("e3").status, "pending");
}

#[tokio::test]
async fn store_outage_fails_the_cycle() {
    let f = fixture(&["e1"]);
    f.store.fail_listing.store(true, Ordering::SeqCst);

    let err = f.watcher.run_cycle().await.unwrap_err();
    assert_matches!(err, CoreError::Store(_));
}

#[tokio::test]
async fn stalled_store_cannot_hang_the_cycle() {
    let f = fixture(&["e1"]);
    f.store.complete_results("e1");
    f.store.stall.store(true, Ordering::SeqCst);
    let watcher = CompletionWatcher::new(f.store.clone(), f.backend.clone())
        .with_call_timeout(Duration::from_millis(50));

    let err = tokio::time::timeout(Duration::from_secs(2), watcher.run_cycle())
        .await
        .expect("cycle finishes despite the stalled store")
        .unwrap_err();

    assert_matches!(err, CoreError::Store(_));
    assert!(f.backend.updates().is_empty());
}

#[tokio::test]
async fn experiment_missing_on_backend_is_a_data_error() {
    let f = fixture(&[]);
    f.store.insert_pending("local-only", "user-1");
    f.store.complete_results("local-only");

    let report = f.watcher.run_cycle().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(f.backend.updates().is_empty());
    let err = f.backend.fetch("local-only").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Data);
}

// ---------------------------------------------------------------------------
// Test: loop lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_loop_completes_and_stops_on_cancel() {
    let store = Arc::new(InMemoryStore::default());
    let backend = Arc::new(InMemoryBackend::default());
    store.insert_pending("e1", "user-1");
    backend.insert_pending("e1");
    backend.script_codes(&[500, 500]);

    let watcher = CompletionWatcher::new(store.clone(), backend.clone())
        .with_poll_interval(Duration::from_millis(10));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { watcher.run(cancel).await }
    });

    // Results land while the loop is already polling.
    tokio::time::sleep(Duration::from_millis(30)).await;
    store.complete_results("e1");

    tokio::time::timeout(Duration::from_secs(5), async {
        while store.experiment("e1").status != "complete" {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("experiment completed by the loop");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop stops after cancellation")
        .unwrap();
    assert_eq!(backend.updates().len(), 3);
}
