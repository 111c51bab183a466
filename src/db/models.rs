use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::api::job::models::{BlobRef, Job, JobKind, JobOutput, JobState};
use crate::db::job_repository::StoreError;

/// Database representation of a job with all fields
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub kind: String,
    pub input_ref: String,
    pub original_filename: Option<String>,
    pub status: String,
    pub output: Option<Json<JobOutput>>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<JobKind>()
            .map_err(|e| StoreError::Corrupt { id: row.id, reason: e })?;

        let state = match (row.status.as_str(), row.output, row.error_detail) {
            ("pending", None, None) => JobState::Pending,
            ("success", Some(Json(output)), None) => JobState::Success { output },
            ("failed", None, Some(error_detail)) => JobState::Failed { error_detail },
            (status, output, detail) => {
                return Err(StoreError::Corrupt {
                    id: row.id,
                    reason: format!(
                        "status {} with output present={} and error detail present={}",
                        status,
                        output.is_some(),
                        detail.is_some()
                    ),
                })
            }
        };

        Ok(Job {
            id: row.id,
            kind,
            input: BlobRef::new(row.input_ref),
            original_filename: row.original_filename,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
