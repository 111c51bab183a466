use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use clap::{Parser, Subcommand};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, filter::LevelFilter};
mod api;
use crate::api::{
    health::health_config,
    job::{handlers::job_config, JobOrchestrator},
    validation,
};
mod config;
mod db;
mod pipeline;
mod shutdown;
use crate::db::{
    blob_store::BlobStore,
    job_repository::{JobRepository, JobStore},
    memory::MemoryJobStore,
};
use crate::pipeline::{
    photo_mask::PROCESSED_IMAGES_DIR, CommandSpec, MenuTranslationPipeline, OcrStep,
    PhotoMaskPipeline, Pipelines, ProcessStep, TranslateStep,
};
use crate::shutdown::ShutdownCoordinator;

/// Photo upload service that runs OCR/translation and image masking on demand
#[derive(Parser)]
#[command(name = "photo-jobs", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run migrations and start the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Process one pending job and print it as JSON
    Process { id: i64 },
}

/// Daily rotating, non-ANSI file output for one level
fn file_layer<S>(log_dir: &Path, name: &str, level: LevelFilter) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, name))
        .with_ansi(false)
        .with_filter(level)
}

fn init_logging(log_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Log files are created as: logs/info.log.2025-11-10, logs/error.log.2025-11-10, etc.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer(log_dir, "info.log", LevelFilter::INFO))
        .with(file_layer(log_dir, "warn.log", LevelFilter::WARN))
        .with(file_layer(log_dir, "error.log", LevelFilter::ERROR))
        .with(file_layer(log_dir, "debug.log", LevelFilter::DEBUG))
        .init();

    Ok(())
}

async fn open_store(
    database_url: Option<&str>,
    max_db_connections: u32,
) -> io::Result<Arc<dyn JobStore>> {
    match database_url {
        Some(url) => {
            let pool = db::connection::get_connection(url, max_db_connections)
                .await
                .map_err(io::Error::other)?;
            info!("Database connection pool established");

            db::migrations::run_migrations(&pool)
                .await
                .map_err(io::Error::other)?;
            Ok(Arc::new(JobRepository::new(pool)))
        }
        None => {
            warn!("DATABASE_URL is not set, jobs are kept in memory and lost on restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config::Config {
        database_url,
        max_payload_size,
        max_db_connections,
        bind_address,
        log_dir,
        storage_dir,
        public_dir,
        step_timeout,
        ocr,
        image_processor,
        translator,
    } = config::Config::from_env().map_err(io::Error::other)?;

    init_logging(&log_dir)?;

    info!("Starting photo-jobs application");
    info!("Configuration loaded successfully:");
    info!("  - Max payload size: {} bytes", max_payload_size);
    info!("  - Max database connections: {}", max_db_connections);
    info!("  - Step timeout: {}s", step_timeout.as_secs());
    info!("  - Storage directory: {}", storage_dir.display());
    info!("  - Public directory: {}", public_dir.display());

    let command = cli.command.unwrap_or(Command::Serve);
    if let Command::Migrate = command {
        if database_url.is_none() {
            return Err(io::Error::other("DATABASE_URL must be set to run migrations"));
        }
        open_store(database_url.as_deref(), max_db_connections).await?;
        return Ok(());
    }

    let translator = config::require_translator(translator).map_err(io::Error::other)?;
    let store = open_store(database_url.as_deref(), max_db_connections).await?;

    let pipelines = Pipelines {
        menu_translation: Arc::new(MenuTranslationPipeline::new(
            Box::new(OcrStep::new(
                CommandSpec::new(ocr.program),
                ocr.language,
                ocr.page_seg_mode,
                step_timeout,
            )),
            Box::new(TranslateStep::new(translator, step_timeout).map_err(io::Error::other)?),
        )),
        photo_mask: Arc::new(PhotoMaskPipeline::new(
            Box::new(ProcessStep::new(
                "photo_mask",
                CommandSpec::new(image_processor.program).arg(image_processor.script),
                step_timeout,
            )),
            public_dir.clone(),
        )),
    };

    // One orchestrator for all HTTP workers so per-job locks are shared.
    let orchestrator = web::Data::new(JobOrchestrator::new(
        store.clone(),
        BlobStore::new(storage_dir),
        pipelines,
    ));

    if let Command::Process { id } = command {
        let job = orchestrator.ensure_processed(id).await.map_err(io::Error::other)?;
        println!("{}", serde_json::to_string_pretty(&job)?);
        store.close().await;
        return Ok(());
    }

    let processed_dir = public_dir.join(PROCESSED_IMAGES_DIR);
    std::fs::create_dir_all(&processed_dir)?;

    let server = HttpServer::new(move || {
        // Configure payload size limits globally
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);

        App::new()
            .wrap(middleware::Logger::default())
            .app_data(orchestrator.clone())
            .app_data(payload_config) // Global payload size limit
            .app_data(validation::multipart_config(max_payload_size)) // Upload size limit and errors
            .app_data(validation::query_config()) // Query validation errors
            .configure(health_config) // Health check endpoints
            .configure(job_config)
            .service(Files::new(
                &format!("/{}", PROCESSED_IMAGES_DIR),
                processed_dir.clone(),
            ))
    });

    info!("Server starting on http://{}", bind_address);

    let server = server.bind(bind_address)?.run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();

    // Spawn server in background
    let server_task = actix_web::rt::spawn(server);

    let coordinator = ShutdownCoordinator::new(server_handle, server_task, store);

    coordinator.wait_for_shutdown().await
}
