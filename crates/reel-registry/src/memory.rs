//! In-memory job store.
//!
//! State lives for the lifetime of the process; a restart loses every job.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use reel_models::{Job, JobId, JobStatus};

use crate::error::{RegistryError, RegistryResult};
use crate::store::{apply_mutation, JobMutation, JobStore, Mutated};

/// Concurrent map of per-job locked records.
///
/// The map shards only guard lookup and insertion; a record's own mutex is
/// taken after the map guard is released, so a slow mutation of one job never
/// blocks access to another.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Arc<Mutex<Job>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn record(&self, id: &JobId) -> Option<Arc<Mutex<Job>>> {
        self.jobs.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> RegistryResult<()> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::already_exists(job.id.as_str())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(job)));
                Ok(())
            }
        }
    }

    async fn get(&self, id: &JobId) -> RegistryResult<Option<Job>> {
        match self.record(id) {
            Some(record) => Ok(Some(record.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn mutate(&self, id: &JobId, mutation: JobMutation) -> RegistryResult<Mutated> {
        let record = self
            .record(id)
            .ok_or_else(|| RegistryError::not_found(id.as_str()))?;

        let mut job = record.lock().await;
        let outcome = apply_mutation(&mut job, mutation)?;

        Ok(Mutated {
            outcome,
            job: job.clone(),
        })
    }

    async fn remove_pending(&self, id: &JobId) -> RegistryResult<Job> {
        let record = self
            .record(id)
            .ok_or_else(|| RegistryError::not_found(id.as_str()))?;

        let job = record.lock().await;
        if job.status != JobStatus::Pending {
            return Err(RegistryError::NotPending(id.to_string()));
        }
        self.jobs.remove(id);

        Ok(job.clone())
    }

    async fn list(&self) -> RegistryResult<Vec<Job>> {
        let records: Vec<Arc<Mutex<Job>>> = self
            .jobs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            jobs.push(record.lock().await.clone());
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{Transition, TransitionOutcome};

    use crate::store::MutationOutcome;

    fn job(id: &str) -> Job {
        Job::new(JobId::from(id), "Demo", None, format!("https://pub/{}.mp4", id))
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = InMemoryJobStore::new();
        store.insert(job("a")).await.unwrap();
        let err = store.insert(job("a")).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_mutate_unknown_job() {
        let store = InMemoryJobStore::new();
        let err = store
            .mutate(
                &JobId::from("missing"),
                JobMutation::Progress {
                    percent: Some(1.0),
                    message: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mutate_returns_snapshot() {
        let store = InMemoryJobStore::new();
        store.insert(job("a")).await.unwrap();

        let mutated = store
            .mutate(
                &JobId::from("a"),
                JobMutation::Transition(Transition::Start {
                    runpod_id: "rp".into(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            mutated.outcome,
            MutationOutcome::Transitioned(TransitionOutcome::Applied)
        );
        assert_eq!(mutated.job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_remove_pending_only() {
        let store = InMemoryJobStore::new();
        store.insert(job("a")).await.unwrap();
        store.insert(job("b")).await.unwrap();
        store
            .mutate(
                &JobId::from("b"),
                JobMutation::Transition(Transition::Start {
                    runpod_id: "rp".into(),
                }),
            )
            .await
            .unwrap();

        store.remove_pending(&JobId::from("a")).await.unwrap();
        assert!(store.get(&JobId::from("a")).await.unwrap().is_none());

        let err = store.remove_pending(&JobId::from("b")).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotPending(_)));
        assert!(store.get(&JobId::from("b")).await.unwrap().is_some());
    }
}
