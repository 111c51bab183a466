use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::models::{Job, JobKind};

/// Multipart upload of a new job
#[derive(MultipartForm)]
pub struct UploadForm {
    pub kind: Text<JobKind>,
    pub file: Option<TempFile>,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
}

/// Response for a single job
#[derive(Serialize)]
pub struct JobResponse {
    pub message: String,
    pub job: Job,
}

/// Response for the job list, newest first
#[derive(Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<Job>,
}
