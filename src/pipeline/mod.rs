//! External processing steps and the per-kind pipelines built from them.
//!
//! A step is an opaque success/failure oracle around an external process or
//! HTTP API. A pipeline runs its steps in order and stops at the first
//! failure.

pub mod menu;
pub mod ocr;
pub mod photo_mask;
pub mod process;
pub mod translate;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::api::job::models::{Job, JobKind, JobOutput};

pub use menu::MenuTranslationPipeline;
pub use ocr::{OcrStep, NO_TEXT_FOUND};
pub use photo_mask::PhotoMaskPipeline;
pub use process::{CommandSpec, FileTransform, ProcessStep};
pub use translate::TranslateStep;

/// Why an external step did not produce a usable result
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The external tool ran and reported failure
    #[error("{0}")]
    Failed(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} timed out after {}s", .after.as_secs())]
    Timeout { step: String, after: Duration },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("translation API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected translation API response (status {status}): {reason}")]
    MalformedResponse { status: u16, reason: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// One invocation of a tool outside this service
#[async_trait]
pub trait ExternalStep: Send + Sync {
    type Input: ?Sized + Sync;
    type Output: Send;

    fn name(&self) -> &str;

    async fn run(&self, input: &Self::Input) -> Result<Self::Output, StepError>;
}

/// Ordered steps that turn a job's input file into its output
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Output already present at this job's deterministic location, if any
    async fn existing_artifact(&self, _job: &Job) -> Option<JobOutput> {
        None
    }

    async fn run(&self, job: &Job, input: &Path) -> Result<JobOutput, StepError>;
}

/// Pipeline for each job kind
#[derive(Clone)]
pub struct Pipelines {
    pub menu_translation: Arc<dyn Pipeline>,
    pub photo_mask: Arc<dyn Pipeline>,
}

impl Pipelines {
    pub fn for_kind(&self, kind: JobKind) -> &dyn Pipeline {
        match kind {
            JobKind::MenuTranslation => self.menu_translation.as_ref(),
            JobKind::PhotoMask => self.photo_mask.as_ref(),
        }
    }
}
