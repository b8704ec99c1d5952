use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use music_recommender_server::config::{AppConfig, CliConfig, FileConfig};
use music_recommender_server::inference::{HealthReport, InferenceOrchestrator};
use music_recommender_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use music_recommender_server::telemetry::TelemetryStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Optional TOML config file. Its values override the CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 5080)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9095)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Maximum size of an uploaded audio file, in megabytes.
    #[clap(long, default_value_t = 100)]
    pub max_upload_mb: u64,

    /// Python interpreter running the inference script.
    #[clap(long, value_parser = parse_path)]
    pub python_exe: Option<PathBuf>,

    /// The inference script.
    #[clap(long, value_parser = parse_path)]
    pub script_path: Option<PathBuf>,

    /// The genre classification model.
    #[clap(long, value_parser = parse_path)]
    pub model_path: Option<PathBuf>,

    #[clap(long, value_parser = parse_path)]
    pub labels_path: Option<PathBuf>,

    /// Embeddings index used for similar-song recommendations.
    #[clap(long, value_parser = parse_path)]
    pub embeddings_index_path: Option<PathBuf>,

    /// Directory holding `<songId>.<ext>` audio files.
    #[clap(long, value_parser = parse_path)]
    pub song_library_dir: Option<PathBuf>,

    /// Where uploads are stored while being analysed. Defaults to the OS temp dir.
    #[clap(long, value_parser = parse_path)]
    pub temp_dir: Option<PathBuf>,

    /// Inference timeout in seconds (never less than 10).
    #[clap(long, default_value_t = 60)]
    pub inference_timeout_secs: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            max_upload_mb: self.max_upload_mb,
            python_exe: self.python_exe.clone(),
            script_path: self.script_path.clone(),
            model_path: self.model_path.clone(),
            labels_path: self.labels_path.clone(),
            embeddings_index_path: self.embeddings_index_path.clone(),
            song_library_dir: self.song_library_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            inference_timeout_secs: self.inference_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let orchestrator = InferenceOrchestrator::new(app_config.inference.clone());
    if let Err(e) = orchestrator.validate() {
        warn!("Inference is not ready, requests will fail until fixed: {}", e);
    }
    let health = HealthReport::from_settings(&app_config.inference);
    info!("Inference paths ready: {}", health.is_ready());

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);
    run_server(
        ServerConfig::from(&app_config),
        app_config.inference,
        Arc::new(orchestrator),
        Arc::new(TelemetryStore::new()),
    )
    .await
}
