//! Job store abstraction.
//!
//! A store owns job records and applies every mutation to one record under
//! that record's own serialization; mutations of different jobs never wait on
//! each other.

use async_trait::async_trait;

use reel_models::{Job, JobId, Transition, TransitionOutcome};

use crate::error::{RegistryError, RegistryResult};

/// A change to a single job record.
#[derive(Debug, Clone, PartialEq)]
pub enum JobMutation {
    /// Lifecycle transition (see [`Job::apply`]).
    Transition(Transition),
    /// Append a worker progress report.
    Progress {
        percent: Option<f64>,
        message: Option<String>,
    },
}

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Transitioned(TransitionOutcome),
    /// `false` when the job was already terminal and nothing was appended.
    ProgressRecorded(bool),
}

/// Mutation outcome plus a snapshot of the record right after it.
#[derive(Debug, Clone)]
pub struct Mutated {
    pub outcome: MutationOutcome,
    pub job: Job,
}

/// Apply `mutation` to `job`. Shared by every store implementation.
pub fn apply_mutation(job: &mut Job, mutation: JobMutation) -> RegistryResult<MutationOutcome> {
    match mutation {
        JobMutation::Transition(transition) => job
            .apply(transition)
            .map(MutationOutcome::Transitioned)
            .map_err(|source| RegistryError::InvalidTransition {
                job_id: job.id.to_string(),
                source,
            }),
        JobMutation::Progress { percent, message } => Ok(MutationOutcome::ProgressRecorded(
            job.record_progress(percent, message),
        )),
    }
}

/// Key-value storage of job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record; fails with `AlreadyExists` if the ID is taken.
    async fn insert(&self, job: Job) -> RegistryResult<()>;

    /// Snapshot of a record.
    async fn get(&self, id: &JobId) -> RegistryResult<Option<Job>>;

    /// Apply one mutation, serialized with every other mutation of the same job.
    async fn mutate(&self, id: &JobId, mutation: JobMutation) -> RegistryResult<Mutated>;

    /// Remove a record that never left `pending`.
    ///
    /// Used to roll back a creation whose dispatch failed.
    async fn remove_pending(&self, id: &JobId) -> RegistryResult<Job>;

    /// Snapshots of every record, in no particular order.
    async fn list(&self) -> RegistryResult<Vec<Job>>;
}
