//! brx-ai - Respiratory sound analysis service
//!
//! `serve` (default) runs the HTTP API; `predict` and `features` run the
//! same pipeline once from the command line and print JSON to stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use brx_common::config::TomlConfig;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::signal;
use tracing::{error, info, warn, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use brx_ai::extractors::RespiratoryPipeline;
use brx_ai::services::{spawn_periodic_sweep, sweep_stale_files, InsightEngine, PredictionEngine};
use brx_ai::AppState;

/// Command-line arguments for brx-ai
#[derive(Parser, Debug)]
#[command(name = "brx-ai")]
#[command(about = "Respiratory sound classification service")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Classifier artifact (JSON)
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Classify one audio file
    Predict {
        file: PathBuf,
        /// Also generate an explanation
        #[arg(long)]
        insights: bool,
    },
    /// Print the feature table for one or more audio files
    Features {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(model) = &self.model {
            config.paths.model_path = model.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// Stderr logging, plus a plain-text file layer when configured
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let file_layer = match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// Stderr-only subscriber active while the config is being resolved
fn bootstrap_subscriber(cli: &Cli) -> impl Subscriber + Send + Sync + 'static {
    let level = cli.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
}

/// Load the config and apply CLI overrides, logging through `subscriber`
fn resolve_config<S>(cli: &Cli, subscriber: S) -> Result<TomlConfig>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing::subscriber::with_default(subscriber, || {
        let mut config = TomlConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
        cli.apply_overrides(&mut config);
        Ok(config)
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = resolve_config(&cli, bootstrap_subscriber(&cli))?;
    init_tracing(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Predict { file, insights } => predict_once(config, file, insights).await,
        Command::Features { files } => extract_features(config, files).await,
    }
}

async fn serve(config: TomlConfig) -> Result<()> {
    info!("Starting brx-ai v{}", env!("CARGO_PKG_VERSION"));
    info!("Model: {}", config.paths.model_path.display());
    info!("Temp directory: {}", config.paths.temp_dir.display());

    let temp_dir = config.paths.temp_dir.clone();
    std::fs::create_dir_all(&temp_dir)
        .with_context(|| format!("Failed to create temp directory {}", temp_dir.display()))?;

    let max_age = Duration::from_secs(config.cleanup.max_age_hours * 3600);
    sweep_stale_files(&temp_dir, max_age);
    let sweeper = spawn_periodic_sweep(
        temp_dir.clone(),
        Duration::from_secs(config.cleanup.sweep_interval_minutes.max(1) * 60),
        max_age,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config);
    if !state.engine.is_model_available() {
        warn!(
            "Model file {} not found; predictions will fail until it is present",
            state.engine.model_path().display()
        );
    }
    info!(
        "Explanation service: {}",
        if state.insights.is_configured() { "configured" } else { "fallback only" }
    );

    let app = brx_ai::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    let removed = sweep_stale_files(&temp_dir, max_age);
    info!("Server shutdown complete ({} stale temp files removed)", removed);
    Ok(())
}

async fn predict_once(config: TomlConfig, file: PathBuf, with_insights: bool) -> Result<()> {
    let pipeline = RespiratoryPipeline::new(&config.pipeline);
    let engine = Arc::new(PredictionEngine::new(pipeline, config.paths.model_path.clone()));

    let result = tokio::task::spawn_blocking({
        let engine = Arc::clone(&engine);
        let file = file.clone();
        move || engine.predict_file(&file)
    })
    .await
    .context("Prediction task failed")?
    .with_context(|| format!("Prediction failed for {}", file.display()))?;

    let ai_insights = if with_insights {
        let outcome = InsightEngine::from_config(&config.explanation)
            .generate(&result.prediction)
            .await;
        Some(outcome.into_insights())
    } else {
        None
    };

    let output = json!({
        "file": file.display().to_string(),
        "result": result.prediction,
        "audio_duration_seconds": result.original_duration_seconds,
        "features": result.features,
        "ai_insights": ai_insights,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn extract_features(config: TomlConfig, files: Vec<PathBuf>) -> Result<()> {
    let pipeline = RespiratoryPipeline::new(&config.pipeline);
    let table = tokio::task::spawn_blocking(move || pipeline.transform_batch(&files))
        .await
        .context("Feature extraction task failed")??;
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
