use super::error::InferenceError;
use super::models::InferenceResult;
use super::process::run_to_completion;
use crate::config::InferenceSettings;
use crate::server::metrics::record_inference_run;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Neighbours requested from the embeddings index.
pub const EMBEDDINGS_TOP_K: u32 = 8;

/// Turns an audio file into genre predictions and recommendations.
#[async_trait]
pub trait InferenceRunner: Send + Sync {
    async fn run(
        &self,
        audio_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, InferenceError>;
}

/// Runs the external inference script, one process per call.
#[derive(Clone)]
pub struct InferenceOrchestrator {
    settings: Arc<InferenceSettings>,
}

fn require_file(name: &'static str, path: &Path) -> Result<(), InferenceError> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(InferenceError::Configuration(format!(
            "{} is not configured",
            name
        )));
    }
    if !path.is_file() {
        return Err(InferenceError::NotFound {
            name,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

impl InferenceOrchestrator {
    pub fn new(settings: InferenceSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    /// Checks every configured path. Creates the temp dir when it's missing.
    pub fn validate(&self) -> Result<(), InferenceError> {
        let settings = &self.settings;
        require_file("python_exe", &settings.python_exe)?;
        require_file("script_path", &settings.script_path)?;
        require_file("model_path", &settings.model_path)?;
        if let Some(labels) = &settings.labels_path {
            if !labels.is_file() {
                return Err(InferenceError::NotFound {
                    name: "labels_path",
                    path: labels.clone(),
                });
            }
        }
        if let Some(temp_dir) = &settings.temp_dir {
            if !temp_dir.is_dir() {
                debug!("Creating temp dir {:?}", temp_dir);
                std::fs::create_dir_all(temp_dir)?;
            }
        }
        Ok(())
    }

    /// Arguments passed to the interpreter, in order.
    pub fn build_args(&self, audio_path: &Path) -> Vec<OsString> {
        let settings = &self.settings;
        let mut args: Vec<OsString> = vec![
            "-X".into(),
            "utf8".into(),
            settings.script_path.clone().into(),
            "--model".into(),
            settings.model_path.clone().into(),
            "--audio".into(),
            audio_path.into(),
        ];

        if let Some(labels) = &settings.labels_path {
            args.push("--labels".into());
            args.push(labels.into());
        }

        // a configured but missing index is skipped, not an error
        if let Some(index) = settings.embeddings_index_path.as_ref().filter(|p| p.is_file()) {
            args.push("--index".into());
            args.push(index.into());
            args.push("--topk".into());
            args.push(EMBEDDINGS_TOP_K.to_string().into());
        }

        args
    }

    fn build_command(&self, audio_path: &Path) -> Command {
        let mut command = Command::new(&self.settings.python_exe);
        command
            .args(self.build_args(audio_path))
            .env("PYTHONIOENCODING", "utf-8");
        command
    }

    async fn run_validated(
        &self,
        audio_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, InferenceError> {
        self.validate()?;

        let timeout = self.settings.effective_timeout();
        let output = run_to_completion(self.build_command(audio_path), timeout, cancel).await?;

        if !output.status.success() {
            return Err(InferenceError::ProcessFailed {
                code: output.status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        if !output.stderr.trim().is_empty() {
            debug!("Inference stderr: {}", output.stderr.trim());
        }

        Ok(InferenceResult::from_json(&output.stdout)?)
    }
}

#[async_trait]
impl InferenceRunner for InferenceOrchestrator {
    async fn run(
        &self,
        audio_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, InferenceError> {
        info!("Running inference on {:?}", audio_path);
        let start = Instant::now();

        let result = self.run_validated(audio_path, cancel).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(inference) => {
                info!(
                    "Inference completed in {}ms: genre={} recommendations={}",
                    elapsed.as_millis(),
                    inference.genre,
                    inference.recommendations.len()
                );
                record_inference_run("completed", elapsed);
            }
            Err(e) => {
                warn!("Inference failed after {}ms: {}", elapsed.as_millis(), e);
                record_inference_run(e.outcome_label(), elapsed);
            }
        }

        result
    }
}
