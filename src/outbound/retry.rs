//! Bounded retry with linear backoff for idempotent, bodyless requests.

use super::context::RequestContext;
use super::error::OutboundError;
use super::transport::HttpHandler;
use crate::config::OutboundSettings;
use crate::server::metrics::record_outbound_retry;
use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries on top of the first attempt.
    pub max_retries: u32,
    /// Delay before retry `n` (0-based) is `base_delay * (n + 1)`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &OutboundSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.base_delay,
        }
    }

    /// Only GET and HEAD without a body are ever retried.
    pub fn applies_to(&self, request: &reqwest::Request) -> bool {
        matches!(*request.method(), Method::GET | Method::HEAD) && request.body().is_none()
    }

    pub fn should_retry(&self, transient: bool, retries_used: u32) -> bool {
        transient && retries_used < self.max_retries
    }

    pub fn delay_for(&self, retries_used: u32) -> Duration {
        self.base_delay * (retries_used + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&OutboundSettings::default())
    }
}

fn is_transient(result: &Result<reqwest::Response, OutboundError>) -> bool {
    match result {
        Ok(response) => response.status().is_server_error(),
        Err(e) => e.is_transport(),
    }
}

pub struct RetryLayer<H> {
    inner: H,
    policy: RetryPolicy,
}

impl<H> RetryLayer<H> {
    pub fn new(inner: H, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<H: HttpHandler> HttpHandler for RetryLayer<H> {
    async fn send(
        &self,
        request: reqwest::Request,
        ctx: &RequestContext,
    ) -> Result<reqwest::Response, OutboundError> {
        if !self.policy.applies_to(&request) {
            return self.inner.send(request, ctx).await;
        }

        let mut retries_used = 0;
        loop {
            let attempt = match request.try_clone() {
                Some(attempt) => attempt,
                None => return self.inner.send(request, ctx).await,
            };

            let result = self.inner.send(attempt, ctx).await;
            if !self.policy.should_retry(is_transient(&result), retries_used) {
                return result;
            }

            let delay = self.policy.delay_for(retries_used);
            warn!(
                "Retrying {} {} in {} ms (retry {}/{})",
                request.method(),
                request.url(),
                delay.as_millis(),
                retries_used + 1,
                self.policy.max_retries
            );
            record_outbound_retry();

            tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(OutboundError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            retries_used += 1;
        }
    }
}
