mod file_config;

pub use file_config::{FileConfig, InferenceConfig, OutboundConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lower bound applied to the configured inference timeout.
pub const MIN_INFERENCE_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_MB: u64 = 100;
const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 100;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BASE_DELAY_MS: u64 = 300;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_mb: u64,
    pub python_exe: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub embeddings_index_path: Option<PathBuf>,
    pub song_library_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub inference_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: u64,

    // Feature configs (with defaults)
    pub inference: InferenceSettings,
}

/// Paths and limits handed to the external inference process.
///
/// Required paths are kept even when empty so that a misconfigured server can
/// still start and report the problem through the health endpoint; they are
/// validated on every inference call instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceSettings {
    pub python_exe: PathBuf,
    pub script_path: PathBuf,
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub embeddings_index_path: Option<PathBuf>,
    pub song_library_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl InferenceSettings {
    /// Configured timeout, never lower than [`MIN_INFERENCE_TIMEOUT`].
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs).max(MIN_INFERENCE_TIMEOUT)
    }

    /// Directory for uploaded audio, falling back to the OS temp dir.
    pub fn upload_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Settings of the resilient HTTP pipeline used to call a running server.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for OutboundSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5080".to_string(),
            timeout: Duration::from_secs(DEFAULT_OUTBOUND_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl OutboundSettings {
    /// Resolve client settings. TOML values override the CLI base url.
    pub fn resolve(cli_base_url: Option<String>, file_config: Option<&FileConfig>) -> Result<Self> {
        let defaults = Self::default();
        let file = file_config
            .and_then(|f| f.outbound.clone())
            .unwrap_or_default();

        let base_url = non_empty(file.base_url)
            .or(cli_base_url)
            .unwrap_or(defaults.base_url);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!("base_url must be an http(s) URL, got {:?}", base_url);
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: file.max_retries.unwrap_or(defaults.max_retries),
            base_delay: file
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
        })
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port != 0 && port == metrics_port {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = non_empty(file.frontend_dir_path)
            .or_else(|| cli.frontend_dir_path.clone());

        let max_upload_mb = match file.max_upload_mb.unwrap_or(cli.max_upload_mb) {
            0 => DEFAULT_MAX_UPLOAD_MB,
            mb => mb,
        };
        let max_upload_bytes = match max_upload_mb.checked_mul(1024 * 1024) {
            Some(bytes) => bytes,
            None => bail!("max_upload_mb is too large ({})", max_upload_mb),
        };

        let inference_file = file.inference.unwrap_or_default();
        let inference = InferenceSettings {
            python_exe: pick_path(inference_file.python_exe, &cli.python_exe).unwrap_or_default(),
            script_path: pick_path(inference_file.script_path, &cli.script_path)
                .unwrap_or_default(),
            model_path: pick_path(inference_file.model_path, &cli.model_path).unwrap_or_default(),
            labels_path: pick_path(inference_file.labels_path, &cli.labels_path),
            embeddings_index_path: pick_path(
                inference_file.embeddings_index_path,
                &cli.embeddings_index_path,
            ),
            song_library_dir: pick_path(inference_file.song_library_dir, &cli.song_library_dir),
            temp_dir: pick_path(inference_file.temp_dir, &cli.temp_dir),
            timeout_secs: inference_file
                .timeout_secs
                .unwrap_or(match cli.inference_timeout_secs {
                    0 => DEFAULT_INFERENCE_TIMEOUT_SECS,
                    secs => secs,
                }),
        };

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            max_upload_bytes,
            inference,
        })
    }
}

/// Blank strings in TOML mean "not configured".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn pick_path(file_value: Option<String>, cli_value: &Option<PathBuf>) -> Option<PathBuf> {
    non_empty(file_value).map(PathBuf::from).or_else(|| {
        cli_value
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    })
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
