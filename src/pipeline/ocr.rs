use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::process::{run_command, CommandSpec};
use super::{ExternalStep, StepError};
use crate::api::job::models::strip_nul;

/// Stand-in text for an image in which OCR found nothing
pub const NO_TEXT_FOUND: &str = "No text found in the image.";

/// Extracts text from an image with a tesseract-compatible executable.
///
/// Invoked as `<program> <args..> <image> stdout -l <language> --psm <mode>`.
pub struct OcrStep {
    spec: CommandSpec,
    language: String,
    page_seg_mode: u8,
    timeout: Duration,
}

impl OcrStep {
    pub fn new(spec: CommandSpec, language: impl Into<String>, page_seg_mode: u8, timeout: Duration) -> Self {
        Self {
            spec,
            language: language.into(),
            page_seg_mode,
            timeout,
        }
    }
}

#[async_trait]
impl ExternalStep for OcrStep {
    type Input = Path;
    type Output = String;

    fn name(&self) -> &str {
        "ocr"
    }

    async fn run(&self, image: &Path) -> Result<String, StepError> {
        let mut cmd = self.spec.command();
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string());

        let output = run_command(cmd, &self.spec.display_name(), self.timeout).await?;
        if !output.status.success() {
            return Err(StepError::Failed(output.failure_detail()));
        }

        let text = strip_nul(&output.stdout);
        let text = text.trim();
        if text.is_empty() {
            info!("OCR found no text");
            return Ok(NO_TEXT_FOUND.to_string());
        }
        Ok(text.to_string())
    }
}
