use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::api::job::models::{Job, JobState, NewJob};
use crate::db::job_repository::{JobStore, StoreError};

/// Process-local job store, used when no database is configured
#[derive(Default)]
pub struct MemoryJobStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    jobs: BTreeMap<i64, Job>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let now = Utc::now();
        let job = Job {
            id: inner.next_id,
            kind: job.kind,
            input: job.input,
            original_filename: job.original_filename,
            state: JobState::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.insert(job.id, job.clone());
        debug!("Job created with id={}", job.id);
        Ok(job)
    }

    async fn get(&self, id: i64) -> Result<Job, StoreError> {
        self.inner
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn transition(&self, id: i64, state: JobState) -> Result<Job, StoreError> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if job.state.is_terminal() {
            debug!("Job {} was not pending, keeping stored state", id);
        } else {
            debug!("Job {} transitioned to {}", id, state.status_str());
            job.state = state;
            job.updated_at = Utc::now();
        }
        Ok(job.clone())
    }

    async fn list(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        // Ids grow with creation time, so reverse id order is newest first.
        Ok(self
            .inner
            .read()
            .await
            .jobs
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
