use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::api::job::models::{Job, JobOutput, JobState, NewJob};
use crate::db::models::JobRow;

/// Errors raised by a job store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row violates the status/field invariant
    #[error("job {id} is corrupt: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Persistence contract for jobs.
///
/// `transition` only moves a job out of `Pending`. Once a job is terminal,
/// later transitions are ignored and the stored job is returned unchanged.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError>;

    async fn get(&self, id: i64) -> Result<Job, StoreError>;

    async fn transition(&self, id: i64, state: JobState) -> Result<Job, StoreError>;

    /// Most recently created jobs first
    async fn list(&self, limit: i64) -> Result<Vec<Job>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self) {}
}

const JOB_COLUMNS: &str = "id, kind, input_ref, original_filename, status, output, error_detail, created_at, updated_at";

/// Repository for Job database operations
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError> {
        debug!("Creating job: kind={}, input={}", job.kind, job.input);

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO jobs (kind, input_ref, original_filename, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(job.kind.as_str())
        .bind(job.input.as_str())
        .bind(job.original_filename.as_deref())
        .fetch_one(&self.pool)
        .await?;

        debug!("Job created with id={}", row.id);
        Job::try_from(row)
    }

    async fn get(&self, id: i64) -> Result<Job, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Job::try_from(row)
    }

    async fn transition(&self, id: i64, state: JobState) -> Result<Job, StoreError> {
        let (output, error_detail): (Option<Json<JobOutput>>, Option<String>) = match state {
            JobState::Pending => (None, None),
            JobState::Success { output } => (Some(Json(output)), None),
            JobState::Failed { error_detail } => (None, Some(error_detail)),
        };
        let status = match (&output, &error_detail) {
            (Some(_), _) => "success",
            (None, Some(_)) => "failed",
            (None, None) => "pending",
        };

        // The status guard makes the write a compare-and-set against other
        // processes sharing the database.
        let updated = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET status = $2, output = $3, error_detail = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(output)
        .bind(error_detail)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => {
                debug!("Job {} transitioned to {}", id, status);
                Job::try_from(row)
            }
            None => {
                debug!("Job {} was not pending, keeping stored state", id);
                self.get(id).await
            }
        }
    }

    async fn list(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
