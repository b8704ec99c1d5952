//! Music genre recommender service.
//!
//! Exposes the server, the inference orchestration, the telemetry aggregator
//! and the resilient outbound client for the binaries and integration tests.

pub mod config;
pub mod inference;
pub mod json;
pub mod library;
pub mod outbound;
pub mod server;
pub mod telemetry;

pub use config::{AppConfig, CliConfig, InferenceSettings, OutboundSettings};
pub use inference::{InferenceOrchestrator, InferenceRunner};
pub use outbound::{RecommenderClient, RequestContext};
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
pub use telemetry::TelemetryStore;
