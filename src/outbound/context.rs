//! Ambient per-request context carried through the outbound pipeline.

use std::fmt;
use tokio_util::sync::CancellationToken;

/// Header used to propagate the correlation id, both inbound and outbound.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Identifier shared by every log line and outbound call made on behalf of
/// one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Request-scoped values handed to every [`HttpHandler`](super::HttpHandler).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    correlation_id: Option<CorrelationId>,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
