//! scorewave-sr - Score Renderer service
//!
//! Turns photographed or scanned sheet music into audio: page images are
//! density-checked, recognized into notation, assembled in page order,
//! expanded into a MIDI timeline and synthesized with a fixed sound bank.

use anyhow::{Context, Result};
use clap::Parser;
use scorewave_common::config::{RootFolderInitializer, TomlConfig};
use scorewave_sr::capability::{AudiverisRecognizer, FluidSynthSynthesizer};
use scorewave_sr::config::{CliOverrides, ServiceConfig, MODULE_NAME};
use scorewave_sr::pipeline::PipelineOrchestrator;
use scorewave_sr::services::{FsAudioLibrary, SqliteAccountStore};
use scorewave_sr::{build_router, AppState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for scorewave-sr
#[derive(Parser, Debug)]
#[command(name = "scorewave-sr")]
#[command(about = "Sheet music to audio rendering service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SCOREWAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and audio library
    #[arg(short, long, env = "SCOREWAVE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SCOREWAVE_SR_PORT")]
    port: Option<u16>,

    /// SoundFont used for synthesis
    #[arg(short, long, env = "SCOREWAVE_SOUND_BANK")]
    sound_bank: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before the subscriber exists; its own log lines are dropped
    let toml_config = TomlConfig::load(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load configuration")?;

    init_tracing(&toml_config)?;

    info!(
        "Starting Scorewave Score Renderer (scorewave-sr) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let cli = CliOverrides {
        root_folder: args.root_folder,
        port: args.port,
        sound_bank: args.sound_bank,
    };
    let config = ServiceConfig::resolve(&cli, &toml_config);
    config
        .validate()
        .context("Refusing to start with invalid configuration")?;

    // Step 1: Root folder layout
    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    // Step 2: Database
    let db_path = initializer.database_path();
    let db_pool = scorewave_sr::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database: {}", db_path.display());

    // Step 3: Pipeline with subprocess capabilities
    let orchestrator = PipelineOrchestrator::new(
        config.pipeline_config(),
        Arc::new(AudiverisRecognizer::new(config.recognizer_binary.clone())),
        Arc::new(FluidSynthSynthesizer::new(config.synthesizer_binary.clone())),
    );
    info!(
        recognizer = %config.recognizer_binary,
        recognition_timeout_secs = config.recognition_timeout.as_secs(),
        synthesizer = %config.synthesizer_binary,
        synthesis_timeout_secs = config.synthesis_timeout.as_secs(),
        "Pipeline ready"
    );

    let state = AppState::new(
        orchestrator,
        Arc::new(SqliteAccountStore::new(db_pool)),
        Arc::new(FsAudioLibrary::new(initializer.library_path())),
    )
    .with_max_upload_bytes(config.max_upload_bytes);

    let app = build_router(state);

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise the TOML `logging.level`
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }

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
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
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
