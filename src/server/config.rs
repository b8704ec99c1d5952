use super::RequestsLoggingLevel;
use crate::config::AppConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    pub frontend_dir_path: Option<String>,
    /// Upper bound for uploaded audio, in bytes.
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 5080,
            metrics_port: 9095,
            frontend_dir_path: None,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl From<&AppConfig> for ServerConfig {
    fn from(config: &AppConfig) -> Self {
        ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            metrics_port: config.metrics_port,
            frontend_dir_path: config.frontend_dir_path.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
