use actix_web::{HttpResponse, ResponseError};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::locks::JobLocks;
use super::models::{Job, JobKind, JobState, NewJob};
use crate::api::validation::ErrorResponse;
use crate::db::blob_store::BlobStore;
use crate::db::job_repository::{JobStore, StoreError};
use crate::pipeline::{Pipeline, Pipelines};

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Store operation failed
    #[error("Database error: {0}")]
    DatabaseError(StoreError),

    /// Uploaded file could not be stored
    #[error("Storage error: {0}")]
    StorageError(std::io::Error),

    /// Validation failed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(i64),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::DatabaseError(other),
        }
    }
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::DatabaseError(e) => {
                error!("Database error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Database error occurred"}),
                })
            }
            ServiceError::StorageError(e) => {
                error!("Storage error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "File storage error occurred"}),
                })
            }
            ServiceError::ValidationError(msg) => {
                warn!("Validation error: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Validation failed".to_string(),
                    fields: serde_json::json!({"file": {"errors": [msg]}}),
                })
            }
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                })
            }
        }
    }
}

/// Image file extensions accepted for upload
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// An uploaded file waiting to be submitted
#[derive(Debug, Clone)]
pub struct InputBlob {
    pub path: PathBuf,
    pub file_name: Option<String>,
    pub size: usize,
}

impl InputBlob {
    /// Whether the client-supplied file name carries an accepted image extension
    pub fn has_allowed_extension(&self) -> bool {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

/// Creates jobs and drives each one through its pipeline on first read
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    blobs: BlobStore,
    pipelines: Pipelines,
    locks: JobLocks,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn JobStore>, blobs: BlobStore, pipelines: Pipelines) -> Self {
        Self {
            store,
            blobs,
            pipelines,
            locks: JobLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Record an uploaded file as a pending job
    ///
    /// # Business Logic
    /// - Rejects a missing or empty upload, or one without an image extension,
    ///   before anything is stored
    /// - Copies the upload into the blob store
    /// - Creates the job as pending; no external step runs here
    pub async fn submit(&self, kind: JobKind, upload: Option<InputBlob>) -> Result<Job, ServiceError> {
        let upload = match upload {
            Some(upload) if upload.size > 0 => upload,
            Some(_) => return Err(ServiceError::ValidationError("Uploaded file is empty".to_string())),
            None => return Err(ServiceError::ValidationError("A file must be attached".to_string())),
        };
        if !upload.has_allowed_extension() {
            return Err(ServiceError::ValidationError(format!(
                "File type not allowed, expected one of: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let input = self
            .blobs
            .put(&upload.path, upload.file_name.as_deref())
            .await
            .map_err(ServiceError::StorageError)?;

        let job = self
            .store
            .create(NewJob {
                kind,
                input,
                original_filename: upload.file_name,
            })
            .await?;

        info!(job_id = job.id, kind = %kind, "Job submitted");
        Ok(job)
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Job>, ServiceError> {
        Ok(self.store.list(limit).await?)
    }

    /// Return the job, processing it first if it is still pending
    ///
    /// Terminal jobs are returned unchanged. Concurrent callers for the same
    /// job wait on a per-job lock, so the pipeline runs at most once. Step
    /// failures never escape: they end up in the job's failed state.
    pub async fn ensure_processed(&self, id: i64) -> Result<Job, ServiceError> {
        let job = self.store.get(id).await?;
        if job.state.is_terminal() {
            return Ok(job);
        }

        let _guard = self.locks.acquire(id).await;

        // Another caller may have finished while we waited.
        let job = self.store.get(id).await?;
        if job.state.is_terminal() {
            debug!(job_id = id, "Job finished by a concurrent caller");
            return Ok(job);
        }

        let pipeline = self.pipelines.for_kind(job.kind);
        let state = match pipeline.existing_artifact(&job).await {
            Some(output) => {
                info!(job_id = id, "Output already exists, skipping pipeline");
                JobState::Success { output }
            }
            None => self.run_pipeline(pipeline, &job).await,
        };

        let job = self.store.transition(id, state).await?;
        info!(job_id = id, status = job.state.status_str(), "Job processed");
        Ok(job)
    }

    async fn run_pipeline(&self, pipeline: &dyn Pipeline, job: &Job) -> JobState {
        info!(job_id = job.id, kind = %job.kind, "Running pipeline");

        let input = match self.blobs.checkout(&job.input).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(job_id = job.id, "Input file unavailable: {}", e);
                return JobState::failed(format!("Input file unavailable: {}", e));
            }
        };

        let result = AssertUnwindSafe(pipeline.run(job, input.path()))
            .catch_unwind()
            .await;
        drop(input);

        match result {
            Ok(Ok(output)) => JobState::Success { output },
            Ok(Err(e)) => {
                warn!(job_id = job.id, "Pipeline failed: {}", e);
                JobState::failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(job_id = job.id, "Pipeline panicked: {}", message);
                JobState::failed(format!("Processing crashed: {}", message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::job::models::JobOutput;
    use crate::db::memory::MemoryJobStore;
    use crate::config::TranslatorConfig;
    use crate::pipeline::{
        CommandSpec, ExternalStep, FileTransform, MenuTranslationPipeline, OcrStep,
        PhotoMaskPipeline, ProcessStep, StepError, TranslateStep, NO_TEXT_FOUND,
    };
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Counts invocations and answers with a canned result
    struct FakeStep<O> {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        result: fn() -> Result<O, StepError>,
    }

    impl<O> FakeStep<O> {
        fn new(result: fn() -> Result<O, StepError>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let step = Self {
                calls: calls.clone(),
                delay: Duration::ZERO,
                result,
            };
            (step, calls)
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        async fn invoke(&self) -> Result<O, StepError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.result)()
        }
    }

    #[async_trait]
    impl ExternalStep for FakeStep<String> {
        type Input = Path;
        type Output = String;

        fn name(&self) -> &str {
            "fake-ocr"
        }

        async fn run(&self, _input: &Path) -> Result<String, StepError> {
            self.invoke().await
        }
    }

    struct FakeTranslator(FakeStep<String>);

    #[async_trait]
    impl ExternalStep for FakeTranslator {
        type Input = str;
        type Output = String;

        fn name(&self) -> &str {
            "fake-translate"
        }

        async fn run(&self, _input: &str) -> Result<String, StepError> {
            self.0.invoke().await
        }
    }

    /// Writes the output file like the real script would
    struct FakeTransform(FakeStep<()>);

    #[async_trait]
    impl ExternalStep for FakeTransform {
        type Input = FileTransform;
        type Output = PathBuf;

        fn name(&self) -> &str {
            "fake-mask"
        }

        async fn run(&self, files: &FileTransform) -> Result<PathBuf, StepError> {
            self.0.invoke().await?;
            tokio::fs::copy(&files.input, &files.output).await?;
            Ok(files.output.clone())
        }
    }

    struct PanickingPipeline;

    #[async_trait]
    impl Pipeline for PanickingPipeline {
        async fn run(&self, _job: &Job, _input: &Path) -> Result<JobOutput, StepError> {
            panic!("decoder blew up");
        }
    }

    struct Harness {
        dir: TempDir,
        orchestrator: JobOrchestrator,
    }

    impl Harness {
        fn new(menu: Arc<dyn Pipeline>, photo: impl FnOnce(&Path) -> Arc<dyn Pipeline>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let photo_mask = photo(&dir.path().join("public"));
            let orchestrator = JobOrchestrator::new(
                Arc::new(MemoryJobStore::new()),
                BlobStore::new(dir.path().join("blobs")),
                Pipelines {
                    menu_translation: menu,
                    photo_mask,
                },
            );
            Self { dir, orchestrator }
        }

        fn public_dir(&self) -> PathBuf {
            self.dir.path().join("public")
        }

        fn upload(&self, name: &str) -> InputBlob {
            let path = self.dir.path().join(format!("upload-{}", name));
            std::fs::write(&path, b"\x89PNG fake image").unwrap();
            InputBlob {
                path,
                file_name: Some(name.to_string()),
                size: 15,
            }
        }

        async fn submit(&self, kind: JobKind) -> Job {
            let upload = self.upload("photo.png");
            self.orchestrator.submit(kind, Some(upload)).await.unwrap()
        }
    }

    fn unused_menu() -> Arc<dyn Pipeline> {
        Arc::new(PanickingPipeline)
    }

    fn menu_pipeline(
        ocr: fn() -> Result<String, StepError>,
        translate: fn() -> Result<String, StepError>,
    ) -> (Arc<dyn Pipeline>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let (ocr, ocr_calls) = FakeStep::new(ocr);
        let (translate, translate_calls) = FakeStep::new(translate);
        let pipeline = MenuTranslationPipeline::new(Box::new(ocr), Box::new(FakeTranslator(translate)));
        (Arc::new(pipeline), ocr_calls, translate_calls)
    }

    fn mask_pipeline(step: FakeStep<()>) -> impl FnOnce(&Path) -> Arc<dyn Pipeline> {
        move |public: &Path| -> Arc<dyn Pipeline> {
            Arc::new(PhotoMaskPipeline::new(Box::new(FakeTransform(step)), public))
        }
    }

    fn assert_state_invariant(job: &Job) {
        let value = serde_json::to_value(job).unwrap();
        let has_output = value.get("output").is_some();
        let has_error = value.get("error_detail").is_some();
        match value["status"].as_str().unwrap() {
            "pending" => assert!(!has_output && !has_error),
            "success" => assert!(has_output && !has_error),
            "failed" => assert!(!has_output && has_error),
            other => panic!("unexpected status {}", other),
        }
    }

    #[actix_web::test]
    async fn submit_without_file_is_rejected_and_creates_nothing() {
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let err = h.orchestrator.submit(JobKind::PhotoMask, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let empty = InputBlob {
            size: 0,
            ..h.upload("empty.png")
        };
        let err = h.orchestrator.submit(JobKind::PhotoMask, Some(empty)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        assert!(h.orchestrator.list(10).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn submit_accepts_only_image_extensions() {
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        for name in ["notes.txt", "archive.png.zip", "noextension"] {
            let err = h
                .orchestrator
                .submit(JobKind::PhotoMask, Some(h.upload(name)))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::ValidationError(_)), "{} accepted", name);
        }
        let unnamed = InputBlob {
            file_name: None,
            ..h.upload("unnamed.png")
        };
        assert!(h.orchestrator.submit(JobKind::PhotoMask, Some(unnamed)).await.is_err());
        assert!(h.orchestrator.list(10).await.unwrap().is_empty());

        for name in ["menu.JPG", "cat.jpeg", "anim.gif"] {
            assert!(h.orchestrator.submit(JobKind::PhotoMask, Some(h.upload(name))).await.is_ok());
        }
    }

    #[test]
    fn service_errors_render_readable_messages() {
        assert_eq!(ServiceError::NotFound(7).to_string(), "Job not found: 7");
        assert_eq!(
            ServiceError::ValidationError("A file must be attached".into()).to_string(),
            "Validation error: A file must be attached"
        );
        let store = ServiceError::from(StoreError::Database(sqlx::Error::PoolClosed));
        assert!(store.to_string().starts_with("Database error: "));
    }

    #[actix_web::test]
    async fn submit_creates_pending_job_without_running_steps() {
        let (step, calls) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let job = h.submit(JobKind::PhotoMask).await;
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.original_filename.as_deref(), Some("photo.png"));
        assert_state_invariant(&job);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn empty_ocr_text_is_passed_through_untranslated() {
        let ocr = OcrStep::new(
            CommandSpec::new("sh").arg("-c").arg("printf '\\n'").arg("tesseract"),
            "kor",
            6,
            Duration::from_secs(10),
        );
        // Nothing listens on the discard port, so a real request would fail the job.
        let translator = TranslateStep::new(
            TranslatorConfig {
                endpoint: "http://127.0.0.1:9/v2/translate".into(),
                auth_scheme: "DeepL-Auth-Key".into(),
                api_key: SecretString::from("unused".to_string()),
                source_lang: "KO".into(),
                target_lang: "EN".into(),
            },
            Duration::from_secs(2),
        )
        .unwrap();
        let menu = Arc::new(MenuTranslationPipeline::new(Box::new(ocr), Box::new(translator)));
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(menu, mask_pipeline(step));

        let job = h.submit(JobKind::MenuTranslation).await;
        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();

        assert_eq!(
            job.state,
            JobState::Success {
                output: JobOutput::Translation {
                    original_text: NO_TEXT_FOUND.into(),
                    translated_text: NO_TEXT_FOUND.into(),
                }
            }
        );
    }

    #[actix_web::test]
    async fn successful_translation_stores_both_texts() {
        let (menu, ocr_calls, translate_calls) =
            menu_pipeline(|| Ok("안녕하세요".to_string()), || Ok("Hello".to_string()));
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(menu, mask_pipeline(step));

        let job = h.submit(JobKind::MenuTranslation).await;
        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();

        assert_eq!(
            job.state,
            JobState::Success {
                output: JobOutput::Translation {
                    original_text: "안녕하세요".into(),
                    translated_text: "Hello".into(),
                }
            }
        );
        assert_state_invariant(&job);
        assert_eq!(ocr_calls.load(Ordering::SeqCst), 1);
        assert_eq!(translate_calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn failed_first_step_skips_the_rest() {
        let (menu, ocr_calls, translate_calls) = menu_pipeline(
            || Err(StepError::Failed("Error opening data file kor.traineddata".into())),
            || Ok("unused".to_string()),
        );
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(menu, mask_pipeline(step));

        let job = h.submit(JobKind::MenuTranslation).await;
        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();

        assert_eq!(job.state, JobState::failed("Error opening data file kor.traineddata"));
        assert_state_invariant(&job);
        assert_eq!(ocr_calls.load(Ordering::SeqCst), 1);
        assert_eq!(translate_calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn translation_failure_fails_the_job() {
        let (menu, _, translate_calls) = menu_pipeline(
            || Ok("안녕하세요".to_string()),
            || {
                Err(StepError::Api {
                    status: 456,
                    body: "Quota exceeded".into(),
                })
            },
        );
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(menu, mask_pipeline(step));

        let job = h.submit(JobKind::MenuTranslation).await;
        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();

        assert_eq!(translate_calls.load(Ordering::SeqCst), 1);
        match job.state {
            JobState::Failed { error_detail } => assert!(error_detail.contains("456")),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn failing_process_records_truncated_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = |script: &str| {
            let step = ProcessStep::new(
                "mask",
                CommandSpec::new("sh").arg("-c").arg(script).arg("process.py"),
                Duration::from_secs(10),
            );
            JobOrchestrator::new(
                Arc::new(MemoryJobStore::new()),
                BlobStore::new(dir.path().join("blobs")),
                Pipelines {
                    menu_translation: unused_menu(),
                    photo_mask: Arc::new(PhotoMaskPipeline::new(Box::new(step), dir.path().join("public"))),
                },
            )
        };
        let upload = || {
            let path = dir.path().join("upload.png");
            std::fs::write(&path, b"not really a png").unwrap();
            Some(InputBlob {
                path,
                file_name: Some("upload.png".into()),
                size: 16,
            })
        };

        let short = orchestrator("echo 'decode error' >&2; exit 1");
        let job = short.submit(JobKind::PhotoMask, upload()).await.unwrap();
        let job = short.ensure_processed(job.id).await.unwrap();
        assert_eq!(job.state, JobState::failed("decode error"));

        let long = orchestrator("printf 'e%.0s' $(seq 1 400) >&2; exit 1");
        let job = long.submit(JobKind::PhotoMask, upload()).await.unwrap();
        let job = long.ensure_processed(job.id).await.unwrap();
        match job.state {
            JobState::Failed { error_detail } => assert_eq!(error_detail, "e".repeat(255)),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn processed_job_is_not_reprocessed() {
        let (step, calls) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let job = h.submit(JobKind::PhotoMask).await;
        let first = h.orchestrator.ensure_processed(job.id).await.unwrap();
        let second = h.orchestrator.ensure_processed(job.id).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(
            first.state,
            JobState::Success {
                output: JobOutput::ProcessedImage {
                    path: format!("/processed_images/{}_processed.png", job.id),
                }
            }
        );
        assert!(h
            .public_dir()
            .join(format!("processed_images/{}_processed.png", job.id))
            .exists());
    }

    #[actix_web::test]
    async fn failed_job_stays_failed() {
        let (step, calls) = FakeStep::new(|| Err(StepError::Failed("decode error".into())));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let job = h.submit(JobKind::PhotoMask).await;
        let first = h.orchestrator.ensure_processed(job.id).await.unwrap();
        let second = h.orchestrator.ensure_processed(job.id).await.unwrap();

        assert_eq!(first.state, JobState::failed("decode error"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn existing_artifact_short_circuits_the_pipeline() {
        let (step, calls) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let job = h.submit(JobKind::PhotoMask).await;
        let artifact_dir = h.public_dir().join("processed_images");
        std::fs::create_dir_all(&artifact_dir).unwrap();
        std::fs::write(artifact_dir.join(format!("{}_processed.png", job.id)), b"done").unwrap();

        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();
        assert!(matches!(job.state, JobState::Success { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn concurrent_reads_run_the_pipeline_once() {
        let (step, calls) = FakeStep::new(|| Ok(()));
        let step = step.slow(Duration::from_millis(50));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let job = h.submit(JobKind::PhotoMask).await;
        let reads = futures_util::future::join_all(
            (0..8).map(|_| h.orchestrator.ensure_processed(job.id)),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let jobs: Vec<Job> = reads.into_iter().map(Result::unwrap).collect();
        assert!(jobs.iter().all(|j| j.state == jobs[0].state));
        assert!(matches!(jobs[0].state, JobState::Success { .. }));
    }

    #[actix_web::test]
    async fn panicking_pipeline_fails_the_job() {
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(Arc::new(PanickingPipeline), mask_pipeline(step));

        let job = h.submit(JobKind::MenuTranslation).await;
        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();
        assert_eq!(job.state, JobState::failed("Processing crashed: decoder blew up"));
    }

    #[actix_web::test]
    async fn missing_input_blob_fails_the_job() {
        let (step, calls) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let job = h.submit(JobKind::PhotoMask).await;
        std::fs::remove_dir_all(h.dir.path().join("blobs")).unwrap();

        let job = h.orchestrator.ensure_processed(job.id).await.unwrap();
        match job.state {
            JobState::Failed { error_detail } => assert!(error_detail.starts_with("Input file unavailable")),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn unknown_job_is_not_found() {
        let (step, _) = FakeStep::new(|| Ok(()));
        let h = Harness::new(unused_menu(), mask_pipeline(step));

        let err = h.orchestrator.ensure_processed(99).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(99)));
    }
}
