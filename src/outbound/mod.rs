//! Resilient outbound HTTP: correlation, logging and retry around a
//! reqwest transport.

mod client;
mod context;
mod correlation;
mod error;
mod logging;
mod pipeline;
mod retry;
mod transport;

pub use client::RecommenderClient;
pub use context::{CorrelationId, RequestContext, CORRELATION_HEADER};
pub use correlation::CorrelationLayer;
pub use error::OutboundError;
pub use logging::LoggingLayer;
pub use pipeline::OutboundPipeline;
pub use retry::{RetryLayer, RetryPolicy};
pub use transport::{HttpHandler, ReqwestTransport};
