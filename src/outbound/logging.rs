use super::context::{RequestContext, CORRELATION_HEADER};
use super::error::OutboundError;
use super::transport::HttpHandler;
use crate::server::metrics::record_outbound_request;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, warn};

/// Logs every outbound round trip with its timing and outcome.
///
/// Errors are logged and handed back untouched.
pub struct LoggingLayer<H> {
    inner: H,
}

impl<H> LoggingLayer<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

fn outcome_label(result: &Result<reqwest::Response, OutboundError>) -> String {
    match result {
        Ok(response) => response.status().as_u16().to_string(),
        Err(OutboundError::Cancelled) => "cancelled".to_string(),
        Err(e) if e.is_transport() => "transport_error".to_string(),
        Err(_) => "error".to_string(),
    }
}

#[async_trait]
impl<H: HttpHandler> HttpHandler for LoggingLayer<H> {
    async fn send(
        &self,
        request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let correlation_id = request
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        info!(correlation_id = %correlation_id, "HTTP {} {}", method, url);
        let start = Instant::now();

        let result = self.inner.send(request, ctx).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(response) => {
                info!(
                    correlation_id = %correlation_id,
                    "-> {} ({} ms)",
                    response.status().as_u16(),
                    elapsed_ms
                );
            }
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    "HTTP {} {} failed after {} ms: {}",
                    method,
                    url,
                    elapsed_ms,
                    e
                );
            }
        }

        record_outbound_request(method.as_str(), &outcome_label(&result));
        result
    }
}
