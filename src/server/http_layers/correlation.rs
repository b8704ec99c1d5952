//! Establishes the correlation id of each inbound request.

use crate::outbound::{CorrelationId, CORRELATION_HEADER};
use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};

/// Upper bound on accepted inbound ids; longer values are replaced.
const MAX_CORRELATION_ID_LENGTH: usize = 128;

fn inbound_id(request: &Request<Body>) -> Option<CorrelationId> {
    request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_CORRELATION_ID_LENGTH)
        .map(CorrelationId::from)
}

/// Reuses the caller's `X-Correlation-ID` or mints one, scopes all logs of
/// the request under it and echoes it on the response.
pub async fn propagate_correlation_id(request: Request<Body>, next: Next) -> Response {
    let correlation_id = inbound_id(&request).unwrap_or_else(CorrelationId::generate);

    let span = info_span!("request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
