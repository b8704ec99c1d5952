use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub max_upload_mb: Option<u64>,

    // Feature configs
    pub inference: Option<InferenceConfig>,
    pub outbound: Option<OutboundConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct InferenceConfig {
    pub python_exe: Option<String>,
    pub script_path: Option<String>,
    pub model_path: Option<String>,
    pub labels_path: Option<String>,
    pub embeddings_index_path: Option<String>,
    pub song_library_dir: Option<String>,
    pub temp_dir: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Settings for clients calling a running server (see `recommender-cli`).
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct OutboundConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_toml() {
        let content = r#"
            port = 8080
            logging_level = "headers"
            max_upload_mb = 50

            [inference]
            python_exe = "/usr/bin/python3"
            script_path = "/srv/ml/infer.py"
            model_path = "/srv/ml/model.keras"
            embeddings_index_path = ""
            timeout_secs = 120

            [outbound]
            base_url = "http://localhost:5080"
            max_retries = 1
        "#;

        let config: FileConfig = toml::from_str(content).unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.logging_level.as_deref(), Some("headers"));
        assert_eq!(config.max_upload_mb, Some(50));
        assert!(config.metrics_port.is_none());

        let inference = config.inference.unwrap();
        assert_eq!(inference.python_exe.as_deref(), Some("/usr/bin/python3"));
        assert_eq!(inference.embeddings_index_path.as_deref(), Some(""));
        assert_eq!(inference.timeout_secs, Some(120));
        assert!(inference.labels_path.is_none());

        let outbound = config.outbound.unwrap();
        assert_eq!(outbound.base_url.as_deref(), Some("http://localhost:5080"));
        assert_eq!(outbound.max_retries, Some(1));
        assert!(outbound.base_delay_ms.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.port.is_none());
        assert!(config.inference.is_none());
        assert!(config.outbound.is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/recommender.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
