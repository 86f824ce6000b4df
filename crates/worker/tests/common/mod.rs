//! In-memory collaborators shared by the worker integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use stax_core::error::CoreError;
use stax_core::experiment::{Experiment, ExperimentStatus};
use stax_core::job::{ComputeFunction, JobUnit};
use stax_core::ports::{ExperimentBackend, ExperimentStore, JobQueue, OwnerCredential};
use stax_core::types::DbId;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    experiments: Mutex<BTreeMap<String, Experiment>>,
    dispatch_records: Mutex<HashSet<String>>,
    credentials: Mutex<HashMap<String, String>>,
    pub fail_listing: AtomicBool,
    pub fail_record_write: AtomicBool,
    /// Listing and transitions never answer while set.
    pub stall: AtomicBool,
}

impl InMemoryStore {
    pub fn insert(&self, experiment: Experiment) {
        self.experiments
            .lock()
            .unwrap()
            .insert(experiment.id.clone(), experiment);
    }

    /// Insert a pending experiment whose owner has a credential.
    pub fn insert_pending(&self, id: &str, user_uid: &str) {
        self.insert(Experiment::pending(id, format!("series-{id}"), user_uid));
        self.add_credential(user_uid, &format!("token-{user_uid}"));
    }

    pub fn add_credential(&self, user_uid: &str, token: &str) {
        self.credentials
            .lock()
            .unwrap()
            .insert(user_uid.to_string(), token.to_string());
    }

    pub fn experiment(&self, id: &str) -> Experiment {
        self.experiments.lock().unwrap()[id].clone()
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut Experiment)) {
        let mut experiments = self.experiments.lock().unwrap();
        f(experiments.get_mut(id).expect("experiment exists"));
    }

    pub fn has_dispatch_record(&self, id: &str) -> bool {
        self.dispatch_records.lock().unwrap().contains(id)
    }

    pub fn dispatch_record_count(&self) -> usize {
        self.dispatch_records.lock().unwrap().len()
    }

    /// Write the output of one job unit, as an executor would.
    pub fn apply_job(&self, job: &JobUnit) {
        self.update(&job.experiment_id, |exp| match job.function.model_key() {
            Some(model) => {
                exp.models[model] = json!({"function": job.function.name(), "aic": 1.0});
            }
            None => {
                exp.decomposition = Some(json!({"trend": [1.0, 1.5, 2.0]}));
                exp.autocorrelation = Some(json!({"acf": [1.0, 0.6, 0.2]}));
            }
        });
    }

    /// Populate all required results directly.
    pub fn complete_results(&self, id: &str) {
        self.update(id, |exp| {
            exp.models = json!({"arima": {}, "ets": {}, "tbats": {}});
            exp.decomposition = Some(json!({"trend": []}));
            exp.autocorrelation = Some(json!({"acf": []}));
        });
    }
}

#[async_trait]
impl ExperimentStore for InMemoryStore {
    async fn list_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>, CoreError> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(CoreError::Store("connection refused".into()));
        }
        Ok(self
            .experiments
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.status == status.as_str())
            .cloned()
            .collect())
    }

    async fn dispatch_record_exists(&self, experiment_id: &str) -> Result<bool, CoreError> {
        Ok(self.has_dispatch_record(experiment_id))
    }

    async fn create_dispatch_record(&self, experiment_id: &str) -> Result<bool, CoreError> {
        if self.fail_record_write.load(Ordering::SeqCst) {
            return Err(CoreError::Store("write timed out".into()));
        }
        Ok(self
            .dispatch_records
            .lock()
            .unwrap()
            .insert(experiment_id.to_string()))
    }

    async fn find_credential(&self, user_uid: &str) -> Result<Option<OwnerCredential>, CoreError> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .get(user_uid)
            .map(|token| OwnerCredential {
                user_uid: user_uid.to_string(),
                token: token.clone(),
            }))
    }

    async fn transition_status(
        &self,
        experiment_id: &str,
        from: ExperimentStatus,
        to: ExperimentStatus,
    ) -> Result<bool, CoreError> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let mut experiments = self.experiments.lock().unwrap();
        match experiments.get_mut(experiment_id) {
            Some(exp) if exp.status == from.as_str() => {
                exp.status = to.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingQueue {
    batches: Mutex<Vec<Vec<JobUnit>>>,
    failing_experiments: Mutex<HashSet<String>>,
    stalled_experiments: Mutex<HashSet<String>>,
    next_id: AtomicI64,
}

impl RecordingQueue {
    pub fn fail_for(&self, experiment_id: &str) {
        self.failing_experiments
            .lock()
            .unwrap()
            .insert(experiment_id.to_string());
    }

    /// Submissions for this experiment never answer.
    pub fn stall_for(&self, experiment_id: &str) {
        self.stalled_experiments
            .lock()
            .unwrap()
            .insert(experiment_id.to_string());
    }

    pub fn recover(&self) {
        self.failing_experiments.lock().unwrap().clear();
        self.stalled_experiments.lock().unwrap().clear();
    }

    pub fn batches(&self) -> Vec<Vec<JobUnit>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn jobs_for(&self, experiment_id: &str) -> Vec<JobUnit> {
        self.batches()
            .into_iter()
            .flatten()
            .filter(|j| j.experiment_id == experiment_id)
            .collect()
    }

    pub fn functions_for(&self, experiment_id: &str) -> HashSet<ComputeFunction> {
        self.jobs_for(experiment_id).iter().map(|j| j.function).collect()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn submit_batch(&self, jobs: &[JobUnit]) -> Result<Vec<DbId>, CoreError> {
        let stalled = {
            let stalled = self.stalled_experiments.lock().unwrap();
            jobs.iter().any(|j| stalled.contains(&j.experiment_id))
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let failing = self.failing_experiments.lock().unwrap();
        if jobs.iter().any(|j| failing.contains(&j.experiment_id)) {
            return Err(CoreError::Queue("queue unreachable".into()));
        }
        drop(failing);

        let ids = jobs
            .iter()
            .map(|_| self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
            .collect();
        self.batches.lock().unwrap().push(jobs.to_vec());
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryBackend {
    experiments: Mutex<HashMap<String, Value>>,
    scripted_codes: Mutex<VecDeque<u16>>,
    unreachable: AtomicBool,
    updates: Mutex<Vec<(String, Value)>>,
}

impl InMemoryBackend {
    pub fn insert(&self, id: &str, representation: Value) {
        self.experiments
            .lock()
            .unwrap()
            .insert(id.to_string(), representation);
    }

    /// Backend copy of a pending experiment as the producer created it.
    pub fn insert_pending(&self, id: &str) {
        self.insert(id, json!({"_id": id, "status": "pending", "title": format!("Experiment {id}")}));
    }

    pub fn experiment(&self, id: &str) -> Option<Value> {
        self.experiments.lock().unwrap().get(id).cloned()
    }

    /// Answer the next updates with these codes before falling back to 200.
    pub fn script_codes(&self, codes: &[u16]) {
        self.scripted_codes.lock().unwrap().extend(codes);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<(String, Value)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExperimentBackend for InMemoryBackend {
    async fn fetch(&self, experiment_id: &str) -> Result<Value, CoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CoreError::Backend("connection refused".into()));
        }
        self.experiment(experiment_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "backend experiment",
                id: experiment_id.to_string(),
            })
    }

    async fn update(&self, experiment_id: &str, representation: &Value) -> Result<u16, CoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CoreError::Backend("connection refused".into()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((experiment_id.to_string(), representation.clone()));

        let code = self.scripted_codes.lock().unwrap().pop_front().unwrap_or(200);
        if code == 200 {
            self.insert(experiment_id, representation.clone());
        }
        Ok(code)
    }
}
