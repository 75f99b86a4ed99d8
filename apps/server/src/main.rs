use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use mediaquiz_core::{
    Config, MediaService, Orchestrator, PipelineRuntime, UploadPolicy, UploadStore,
    build_question_engine, build_transcription_engine, open_store, recover_stale_files,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

/// How long in-flight runs get to finish once the server stops accepting requests.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "mediaquiz")]
#[command(about = "Upload lectures, transcribe them and generate quiz questions per five-minute window")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. "0.0.0.0:5000"
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory for records and uploaded files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mediaquiz=info,mediaquiz_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let store = open_store(&config.storage)
        .await
        .context("failed to open record store")?;
    let uploads = UploadStore::open(config.storage.uploads_dir())
        .await
        .context("failed to prepare upload directory")?;

    let transcriber =
        build_transcription_engine(&config.transcription, &config.storage.scratch_dir())?;
    let questions = build_question_engine(&config.questions)?;
    tracing::info!(
        transcriber = transcriber.name(),
        questions = questions.name(),
        "engines ready"
    );

    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        transcriber,
        questions,
        config.pipeline_settings(),
    )?;
    let runtime = PipelineRuntime::start(Arc::new(orchestrator), config.pipeline.max_concurrent)?;

    let report = recover_stale_files(
        store.as_ref(),
        &runtime.dispatcher(),
        config.recovery_settings(),
    )
    .await
    .context("startup recovery failed")?;
    if !report.resubmitted.is_empty() || !report.failed.is_empty() {
        tracing::info!(
            resubmitted = report.resubmitted.len(),
            failed = report.failed.len(),
            "recovered files from previous run"
        );
    }

    let service = MediaService::new(
        Arc::clone(&store),
        uploads,
        runtime.dispatcher(),
        UploadPolicy::with_max_bytes(config.server.max_upload_bytes),
    );
    let app = api::router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!("mediaquiz listening on http://{}", listener.local_addr()?);
    tracing::info!("data directory: {}", config.storage.data_dir().display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("draining pipeline");
    if !runtime.shutdown(SHUTDOWN_GRACE).await {
        tracing::warn!("some runs were still in flight at shutdown; they will be recovered on next start");
    }
    store.close().await?;

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&path)?.with_env_overrides()?;

    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
