//! Gemini dispatcher
//!
//! Sends one attempt of a buffered inbound request to the Gemini API host
//! with a chosen key and classifies what came back.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::HeaderValue;
use reqwest::{Client, Url};
use std::time::Duration;

use super::backend_pool::Credential;
use super::upstream::{
    build_upstream_headers, is_retryable_status, strip_hop_by_hop, AttemptError, AttemptOutcome,
    Dispatcher, RequestContext, UpstreamResponse,
};
use crate::config::UpstreamConfig;
use crate::utils::{with_timeout, TimeoutError};

/// HTTP dispatcher for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiDispatcher {
    client: Client,
    base_url: Url,
    api_client: HeaderValue,
    attempt_timeout: Duration,
}

impl GeminiDispatcher {
    /// Create a dispatcher with its own connection-pooling client
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        let base_url = Url::parse(&config.base_url)?;
        let api_client = HeaderValue::from_str(&config.api_client)?;

        tracing::info!(
            upstream = %base_url,
            timeout_seconds = config.timeout_seconds,
            "Initialized Gemini dispatcher"
        );

        Ok(Self {
            client,
            base_url,
            api_client,
            attempt_timeout: config.timeout(),
        })
    }

    /// Upstream URL for a request: the configured origin with the inbound
    /// path and query substituted in
    pub fn target_url(&self, request: &RequestContext) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&request.path);
        url.set_query(request.query.as_deref());
        url
    }
}

#[async_trait]
impl Dispatcher for GeminiDispatcher {
    async fn dispatch(&self, request: &RequestContext, credential: &Credential) -> AttemptOutcome {
        let url = self.target_url(request);
        let headers = build_upstream_headers(
            &request.headers,
            credential,
            request.has_body(),
            &self.api_client,
        );

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            credential = %credential,
            "Dispatching upstream attempt"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if request.has_body() {
            builder = builder.body(request.body.clone());
        }

        let response = match with_timeout(self.attempt_timeout, builder.send()).await {
            Ok(response) => response,
            Err(TimeoutError::Timeout(after)) => {
                return AttemptOutcome::RetryableFailure(AttemptError::Timeout(after));
            }
            Err(TimeoutError::Inner(err)) => {
                return AttemptOutcome::RetryableFailure(AttemptError::Network(err));
            }
        };

        let status = response.status();

        if is_retryable_status(status) {
            // Drain so the connection goes back to the pool, but never past
            // the attempt deadline
            match with_timeout(self.attempt_timeout, response.bytes()).await {
                Ok(_) => {}
                Err(TimeoutError::Timeout(after)) => {
                    tracing::debug!(
                        status = status.as_u16(),
                        after = ?after,
                        "Gave up draining stalled retryable upstream response"
                    );
                }
                Err(TimeoutError::Inner(e)) => {
                    tracing::debug!(error = %e, "Failed to drain retryable upstream response");
                }
            }
            return AttemptOutcome::RetryableFailure(AttemptError::Status { status });
        }

        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        let upstream = UpstreamResponse::new(
            status,
            headers,
            Body::from_stream(response.bytes_stream()),
        );

        if status.is_success() {
            AttemptOutcome::Success(upstream)
        } else {
            AttemptOutcome::TerminalFailure(upstream)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
