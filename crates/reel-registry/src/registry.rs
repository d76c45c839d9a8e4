//! Job registry: the only owner of job records.

use std::sync::Arc;

use tracing::{debug, info, warn};

use reel_models::{Job, JobId, JobStatus, Transition, TransitionOutcome};

use crate::error::{RegistryError, RegistryResult};
use crate::memory::InMemoryJobStore;
use crate::store::{JobMutation, JobStore, MutationOutcome, Mutated};

/// Result of a transition request, with the record as it stands afterwards.
#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub outcome: TransitionOutcome,
    pub job: Job,
}

/// Lifecycle operations over a [`JobStore`].
#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Registry backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryJobStore::new()))
    }

    /// Register a new pending job. Fails if `job_id` is already registered.
    pub async fn create(
        &self,
        job_id: JobId,
        channel: &str,
        callback_url: Option<String>,
        output_url: &str,
    ) -> RegistryResult<Job> {
        let job = Job::new(job_id, channel, callback_url, output_url);
        self.store.insert(job.clone()).await?;
        debug!(job_id = %job.id, channel = %channel, "Registered job");
        Ok(job)
    }

    pub async fn get(&self, job_id: &JobId) -> RegistryResult<Job> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| RegistryError::not_found(job_id.as_str()))
    }

    /// Apply a lifecycle transition.
    ///
    /// A transition on a terminal job is a no-op reported as
    /// [`TransitionOutcome::AlreadyTerminal`]. A terminal report on a pending
    /// job is held and lands with `Start`. Any other illegal edge is an error.
    pub async fn transition(
        &self,
        job_id: &JobId,
        transition: Transition,
    ) -> RegistryResult<TransitionResult> {
        let target = transition.target();
        let Mutated { outcome, job } = self
            .store
            .mutate(job_id, JobMutation::Transition(transition))
            .await?;

        let MutationOutcome::Transitioned(outcome) = outcome else {
            return Err(RegistryError::Store(format!(
                "transition of {} produced a progress outcome",
                job_id
            )));
        };

        match outcome {
            TransitionOutcome::Applied => {
                info!(job_id = %job_id, status = %job.status, "Job transitioned");
            }
            TransitionOutcome::AlreadyTerminal(current) => {
                info!(
                    job_id = %job_id,
                    current = %current,
                    requested = %target,
                    "Job already terminal, transition ignored"
                );
            }
            TransitionOutcome::Deferred => {
                info!(
                    job_id = %job_id,
                    requested = %target,
                    "Job not started yet, terminal report held"
                );
            }
        }

        Ok(TransitionResult { outcome, job })
    }

    /// Append a progress report. Returns `false` when the job was already terminal.
    pub async fn append_progress(
        &self,
        job_id: &JobId,
        percent: Option<f64>,
        message: Option<String>,
    ) -> RegistryResult<bool> {
        let Mutated { outcome, .. } = self
            .store
            .mutate(job_id, JobMutation::Progress { percent, message })
            .await?;

        match outcome {
            MutationOutcome::ProgressRecorded(recorded) => {
                if !recorded {
                    debug!(job_id = %job_id, "Progress after terminal state ignored");
                }
                Ok(recorded)
            }
            MutationOutcome::Transitioned(_) => Err(RegistryError::Store(format!(
                "progress on {} produced a transition outcome",
                job_id
            ))),
        }
    }

    /// Roll back a job whose creation did not complete.
    pub async fn discard_pending(&self, job_id: &JobId) -> RegistryResult<()> {
        self.store.remove_pending(job_id).await?;
        warn!(job_id = %job_id, "Discarded pending job after failed creation");
        Ok(())
    }

    /// Snapshots of every job currently in `status`.
    pub async fn jobs_with_status(&self, status: JobStatus) -> RegistryResult<Vec<Job>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|job| job.status == status)
            .collect())
    }
}
