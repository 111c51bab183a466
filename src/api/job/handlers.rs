use actix_multipart::form::MultipartForm;
use actix_web::{
    get,
    http::header,
    post,
    web::{scope, Data, Path, ServiceConfig},
    HttpResponse,
};
use actix_web_validator::Query;

use super::dto::{JobListResponse, JobResponse, ListQuery, UploadForm};
use super::service::{InputBlob, JobOrchestrator, ServiceError};

#[post("")]
async fn create_job(
    orchestrator: Data<JobOrchestrator>,
    MultipartForm(form): MultipartForm<UploadForm>,
) -> Result<HttpResponse, ServiceError> {
    let UploadForm { kind, file } = form;

    // The temp file must outlive `submit`, which copies it into the blob store.
    let upload = file.as_ref().map(|f| InputBlob {
        path: f.file.path().to_path_buf(),
        file_name: f.file_name.clone(),
        size: f.size,
    });
    let job = orchestrator.submit(kind.into_inner(), upload).await?;
    drop(file);

    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/jobs/{}", job.id)))
        .json(JobResponse {
            message: "File uploaded, processing starts when the job is viewed".to_string(),
            job,
        }))
}

#[get("")]
async fn list_jobs(
    orchestrator: Data<JobOrchestrator>,
    query: Query<ListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let limit = query.limit.unwrap_or(ListQuery::DEFAULT_LIMIT);
    let jobs = orchestrator.list(limit).await?;

    Ok(HttpResponse::Ok().json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

#[get("/{id}")]
async fn show_job(
    orchestrator: Data<JobOrchestrator>,
    id: Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let job = orchestrator.ensure_processed(id.into_inner()).await?;
    let message = match job.state.status_str() {
        "success" => "Processing completed",
        "failed" => "Processing failed",
        _ => "Processing pending",
    };

    Ok(HttpResponse::Ok().json(JobResponse {
        message: message.to_string(),
        job,
    }))
}

pub fn job_config(config: &mut ServiceConfig) {
    config.service(
        scope("jobs")
            .service(create_job)
            .service(list_jobs)
            .service(show_job),
    );
}
