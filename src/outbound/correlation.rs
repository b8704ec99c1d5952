use super::context::{CorrelationId, RequestContext, CORRELATION_HEADER};
use super::error::OutboundError;
use super::transport::HttpHandler;
use async_trait::async_trait;
use reqwest::header::HeaderValue;
use tracing::debug;

/// Attaches the ambient correlation id to requests that don't carry one.
///
/// An id already present on the request always wins. Without an ambient id
/// a fresh one is minted so downstream logs can still be joined.
pub struct CorrelationLayer<H> {
    inner: H,
}

impl<H> CorrelationLayer<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

fn header_value_for(ctx: &RequestContext) -> HeaderValue {
    if let Some(value) = ctx
        .correlation_id()
        .and_then(|id| HeaderValue::from_str(id.as_str()).ok())
    {
        return value;
    }
    let fresh = CorrelationId::generate();
    // uuid text is always a valid header value
    HeaderValue::from_str(fresh.as_str()).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

#[async_trait]
impl<H: HttpHandler> HttpHandler for CorrelationLayer<H> {
    async fn send(
        &self,
        mut request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError> {
        if !request.headers().contains_key(CORRELATION_HEADER) {
            let value = header_value_for(ctx);
            debug!("Attaching correlation id {:?} to {}", value, request.url());
            request.headers_mut().insert(CORRELATION_HEADER, value);
        }
        self.inner.send(request, ctx).await
    }
}
