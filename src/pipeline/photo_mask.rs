use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::process::{output_exists, FileTransform};
use super::{ExternalStep, Pipeline, StepError};
use crate::api::job::models::{Job, JobOutput};

/// Public subdirectory that holds processed images
pub const PROCESSED_IMAGES_DIR: &str = "processed_images";

pub type ImageTransform = dyn ExternalStep<Input = FileTransform, Output = PathBuf>;

/// Runs the image-processing script, writing `{id}_processed.png` under the
/// public directory
pub struct PhotoMaskPipeline {
    transform: Box<ImageTransform>,
    public_dir: PathBuf,
}

impl PhotoMaskPipeline {
    pub fn new(transform: Box<ImageTransform>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            transform,
            public_dir: public_dir.into(),
        }
    }

    fn file_name(job_id: i64) -> String {
        format!("{}_processed.png", job_id)
    }

    /// Filesystem location of a job's processed image
    pub fn output_path(&self, job_id: i64) -> PathBuf {
        self.public_dir
            .join(PROCESSED_IMAGES_DIR)
            .join(Self::file_name(job_id))
    }

    fn output(job_id: i64) -> JobOutput {
        JobOutput::ProcessedImage {
            path: format!("/{}/{}", PROCESSED_IMAGES_DIR, Self::file_name(job_id)),
        }
    }
}

#[async_trait]
impl Pipeline for PhotoMaskPipeline {
    async fn existing_artifact(&self, job: &Job) -> Option<JobOutput> {
        output_exists(&self.output_path(job.id))
            .await
            .then(|| Self::output(job.id))
    }

    async fn run(&self, job: &Job, input: &Path) -> Result<JobOutput, StepError> {
        let output = self.output_path(job.id);
        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        info!(job_id = job.id, step = self.transform.name(), "Running step");
        self.transform
            .run(&FileTransform {
                input: input.to_path_buf(),
                output,
            })
            .await?;

        Ok(Self::output(job.id))
    }
}
