use crate::config::InferenceSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A configured path and whether it's present on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCheck {
    pub path: Option<String>,
    /// `None` when the path is not configured.
    pub exists: Option<bool>,
}

impl PathCheck {
    fn of(path: Option<&Path>) -> Self {
        match path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Self {
                path: Some(path.display().to_string()),
                exists: Some(path.exists()),
            },
            None => Self {
                path: None,
                exists: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    #[serde(alias = "pythonexe")]
    pub python_exe: PathCheck,
    #[serde(alias = "scriptpath")]
    pub script_path: PathCheck,
    #[serde(alias = "modelpath")]
    pub model_path: PathCheck,
    #[serde(alias = "labelspath")]
    pub labels_path: PathCheck,
    #[serde(alias = "embeddingsindexpath")]
    pub embeddings_index_path: PathCheck,
    #[serde(alias = "tempdir")]
    pub temp_dir: PathCheck,
    #[serde(alias = "songlibrarydir")]
    pub song_library_dir: PathCheck,
}

impl HealthReport {
    pub fn from_settings(settings: &InferenceSettings) -> Self {
        Self {
            python_exe: PathCheck::of(Some(&settings.python_exe)),
            script_path: PathCheck::of(Some(&settings.script_path)),
            model_path: PathCheck::of(Some(&settings.model_path)),
            labels_path: PathCheck::of(settings.labels_path.as_deref()),
            embeddings_index_path: PathCheck::of(settings.embeddings_index_path.as_deref()),
            temp_dir: PathCheck::of(settings.temp_dir.as_deref()),
            song_library_dir: PathCheck::of(settings.song_library_dir.as_deref()),
        }
    }

    /// True when every required path exists.
    pub fn is_ready(&self) -> bool {
        [&self.python_exe, &self.script_path, &self.model_path]
            .iter()
            .all(|check| check.exists == Some(true))
    }
}
