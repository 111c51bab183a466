use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of characters kept in a failed job's error detail
pub const MAX_ERROR_DETAIL_CHARS: usize = 255;

/// Which pipeline processes a job
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    MenuTranslation,
    PhotoMask,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::MenuTranslation => "menu_translation",
            JobKind::PhotoMask => "photo_mask",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu_translation" => Ok(JobKind::MenuTranslation),
            "photo_mask" => Ok(JobKind::PhotoMask),
            other => Err(format!("unknown job kind: {}", other)),
        }
    }
}

/// Opaque key of an uploaded file held by the blob store
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artifact produced by a successful pipeline
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutput {
    Translation {
        original_text: String,
        translated_text: String,
    },
    /// `path` is the public URL path of the processed image
    ProcessedImage { path: String },
}

/// Lifecycle state of a job.
///
/// Only `Success` carries an output and only `Failed` carries an error
/// detail, so the field-presence invariant holds by construction.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Success { output: JobOutput },
    Failed { error_detail: String },
}

impl JobState {
    /// Build a failed state, truncating the detail to [`MAX_ERROR_DETAIL_CHARS`]
    pub fn failed(detail: impl AsRef<str>) -> Self {
        JobState::Failed {
            error_detail: truncate_detail(detail.as_ref()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Success { .. } => "success",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// A unit of submitted work tracked from pending to a terminal outcome
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Job {
    pub id: i64,
    pub kind: JobKind,
    pub input: BlobRef,
    pub original_filename: Option<String>,
    #[serde(flatten)]
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a job is first recorded
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub input: BlobRef,
    pub original_filename: Option<String>,
}

/// Remove NUL characters, which PostgreSQL rejects in text and JSONB columns
pub fn strip_nul(text: &str) -> String {
    text.replace('\0', "")
}

/// Cut a message down to the stored error-detail length on a char boundary
pub fn truncate_detail(detail: &str) -> String {
    let cleaned = strip_nul(detail);
    let trimmed = cleaned.trim();
    match trimmed.char_indices().nth(MAX_ERROR_DETAIL_CHARS) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}
