use anyhow::{Context, Result};
use clap::Parser;
use facewatch_core::{
    EncodingDatabase, EventWriter, ModelPaths, ARCFACE_EMBEDDING_DIM, ARCFACE_MODEL_VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod config;
mod control;
mod engine;
mod extend;
mod render;

use config::Config;
use control::ControlState;
use engine::{Engine, EngineParts};
use extend::DatasetExtender;
use render::FrameRenderer;

fn main() -> Result<()> {
    let config = Config::parse();

    // stdout carries the event stream; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(run(config));
    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facewatchd starting");
    let mut events = EventWriter::stdout();

    events.status("loading encodings + face detector...")?;
    let database = EncodingDatabase::load(&config.encodings)
        .with_context(|| format!("failed to load encodings from {}", config.encodings.display()))?;
    database
        .check_compatible(ARCFACE_EMBEDDING_DIM, ARCFACE_MODEL_VERSION)
        .with_context(|| format!("unusable encodings in {}", config.encodings.display()))?;
    tracing::info!(
        path = %config.encodings.display(),
        records = database.len(),
        labels = database.label_counts().len(),
        "encodings loaded"
    );

    let model_dir = config.model_dir();
    let (detector, recognizer) = ModelPaths::in_dir(&model_dir)
        .load(config.detection_method)
        .with_context(|| format!("failed to load models from {}", model_dir.display()))?;
    tracing::info!(
        dir = %model_dir.display(),
        strategy = %config.detection_method,
        policy = %config.match_policy,
        "models loaded"
    );

    events.status("starting video stream...")?;
    let source = facewatch_hw::open_source(
        &config.source,
        config.resolution.width,
        config.resolution.height,
    )
    .with_context(|| format!("failed to open frame source {}", config.source))?;
    tracing::info!(source = %source.describe(), "frame source opened");

    let extender = if config.extend_dataset {
        let extender = DatasetExtender::new(&config.dataset)
            .with_context(|| format!("failed to prepare dataset {}", config.dataset.display()))?;
        Some(extender)
    } else {
        None
    };

    let control = Arc::new(ControlState::new());
    let parts = EngineParts {
        source,
        detector: Box::new(detector),
        encoder: Box::new(recognizer),
        matcher: config.match_policy.matcher(config.tolerance),
        renderer: Box::new(FrameRenderer::new(config.output_mm, config.preview.clone())),
        database,
        extender,
        prep: config.frame_prep(),
        interval: config.interval(),
    };

    if config.run_only_on_notification {
        let state = control.clone();
        tokio::spawn(async move {
            control::listen(BufReader::new(tokio::io::stdin()), &state).await;
        });
        events.status("Started stdin monitoring for triggering face recognition.")?;
    }

    events.status("Starting face recognition loop.")?;
    let handle = engine::spawn_engine(Engine::new(parts, control.clone(), events))
        .context("failed to spawn engine thread")?;

    let signals = control.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signals.request_shutdown();
    });

    let result = tokio::task::spawn_blocking(move || handle.join())
        .await
        .context("failed to join engine thread")?
        .map_err(|_| anyhow::anyhow!("engine thread panicked"))?;
    result.context("recognition loop failed")?;

    tracing::info!("facewatchd stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
