use super::context::RequestContext;
use super::correlation::CorrelationLayer;
use super::error::OutboundError;
use super::logging::LoggingLayer;
use super::retry::{RetryLayer, RetryPolicy};
use super::transport::{HttpHandler, ReqwestTransport};
use crate::config::OutboundSettings;
use std::sync::Arc;

/// The fixed outbound stack: correlation, then logging, then retry, then
/// the transport.
///
/// Correlation sits outermost so that the log lines and every retried
/// attempt of one call share a single id.
#[derive(Clone)]
pub struct OutboundPipeline {
    handler: Arc<dyn HttpHandler>,
}

impl OutboundPipeline {
    pub fn new<T: HttpHandler + 'static>(transport: T, policy: RetryPolicy) -> Self {
        let handler = CorrelationLayer::new(LoggingLayer::new(RetryLayer::new(transport, policy)));
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_settings(settings: &OutboundSettings) -> Result<Self, OutboundError> {
        let transport = ReqwestTransport::new(settings.timeout)?;
        Ok(Self::new(transport, RetryPolicy::new(settings)))
    }

    pub async fn send(
        &self,
        request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError> {
        self.handler.send(request, ctx).await
    }
}
