use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{ExternalStep, Pipeline, StepError};
use crate::api::job::models::{Job, JobOutput};

pub type TextExtractor = dyn ExternalStep<Input = Path, Output = String>;
pub type TextTranslator = dyn ExternalStep<Input = str, Output = String>;

/// OCR the uploaded menu photo, then translate the recognized text
pub struct MenuTranslationPipeline {
    ocr: Box<TextExtractor>,
    translator: Box<TextTranslator>,
}

impl MenuTranslationPipeline {
    pub fn new(ocr: Box<TextExtractor>, translator: Box<TextTranslator>) -> Self {
        Self { ocr, translator }
    }
}

#[async_trait]
impl Pipeline for MenuTranslationPipeline {
    async fn run(&self, job: &Job, input: &Path) -> Result<JobOutput, StepError> {
        info!(job_id = job.id, step = self.ocr.name(), "Running step");
        let original_text = self.ocr.run(input).await?;

        info!(job_id = job.id, step = self.translator.name(), "Running step");
        let translated_text = self.translator.run(&original_text).await?;

        Ok(JobOutput::Translation {
            original_text,
            translated_text,
        })
    }
}
