use super::context::RequestContext;
use super::error::OutboundError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One stage of the outbound pipeline.
///
/// Layers own the next handler and delegate to it; the innermost handler is
/// the transport that actually talks to the network.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn send(
        &self,
        request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError>;
}

#[async_trait]
impl<T: HttpHandler + ?Sized> HttpHandler for Arc<T> {
    async fn send(
        &self,
        request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError> {
        self.as_ref().send(request, ctx).await
    }
}

/// Network transport backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OutboundError::from)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpHandler for ReqwestTransport {
    async fn send(
        &self,
        request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError> {
        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(OutboundError::Cancelled),
            result = self.client.execute(request) => result.map_err(OutboundError::from),
        }
    }
}
