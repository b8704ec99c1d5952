mod error;
mod health;
mod models;
mod orchestrator;
mod process;

pub use error::InferenceError;
pub use health::{HealthReport, PathCheck};
pub use models::{playback_url, DecodeError, InferenceResult, RecommendationItem};
pub use orchestrator::{InferenceOrchestrator, InferenceRunner, EMBEDDINGS_TOP_K};
pub use process::{run_to_completion, ProcessOutput};
