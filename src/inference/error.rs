use super::models::DecodeError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference misconfigured: {0}")]
    Configuration(String),

    #[error("{name} not found: {path:?}")]
    NotFound { name: &'static str, path: PathBuf },

    #[error("Failed to start inference process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Inference exceeded {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("Inference cancelled by caller")]
    Cancelled,

    #[error("Inference failed (exit {}): {}", exit_code_label(.code), .stderr)]
    ProcessFailed { code: Option<i32>, stderr: String },

    #[error("Invalid inference output: {0}")]
    InvalidOutput(#[from] DecodeError),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

impl InferenceError {
    /// Deadline hit or caller gave up; both surface as a gateway timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, InferenceError::TimedOut(_) | InferenceError::Cancelled)
    }

    /// Errors raised before any process was started.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            InferenceError::Configuration(_) | InferenceError::NotFound { .. }
        )
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            InferenceError::Configuration(_) | InferenceError::NotFound { .. } => "rejected",
            InferenceError::TimedOut(_) => "timed_out",
            InferenceError::Cancelled => "cancelled",
            InferenceError::InvalidOutput(_) => "invalid_output",
            InferenceError::Spawn(_)
            | InferenceError::Io(_)
            | InferenceError::ProcessFailed { .. } => "failed",
        }
    }
}
