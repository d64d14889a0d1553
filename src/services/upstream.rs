//! Upstream attempt model
//!
//! Types shared by the dispatcher and the retry loop: the buffered inbound
//! request that every attempt replays, the upstream response handed back to
//! the caller, and the classified result of a single attempt.

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

use super::backend_pool::Credential;

/// Header carrying the upstream API key (and, inbound, the caller's code)
pub const GOOG_API_KEY: HeaderName = HeaderName::from_static("x-goog-api-key");

/// Header identifying the client library to the upstream
pub const GOOG_API_CLIENT: HeaderName = HeaderName::from_static("x-goog-api-client");

/// Connection-scoped headers that never cross the proxy in either direction
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
}

/// Remove hop-by-hop headers in place
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

// ============================================================================
// Request Context
// ============================================================================

/// The inbound request, captured once so it can be replayed per attempt
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Inbound path, forwarded verbatim
    pub path: String,
    /// Inbound query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestContext {
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }
}

// ============================================================================
// Upstream Response
// ============================================================================

/// An upstream response passed through to the caller unchanged
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

// ============================================================================
// Attempt Outcome
// ============================================================================

/// Why a single upstream attempt is considered transient
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("Google API returned status {}", describe_status(.status))]
    Status { status: StatusCode },

    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

fn describe_status(status: &StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{}: {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

impl AttemptError {
    /// Upstream status, when the failure was an HTTP response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AttemptError::Status { status } => Some(*status),
            AttemptError::Network(err) => err.status(),
            AttemptError::Timeout(_) => None,
        }
    }
}

/// Classified result of one upstream attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    /// 2xx; returned to the caller as-is
    Success(UpstreamResponse),
    /// Non-retryable status (e.g. 400); returned to the caller as-is
    TerminalFailure(UpstreamResponse),
    /// 401, 429, 5xx or a transport failure; try another credential
    RetryableFailure(AttemptError),
}

/// 401 and 429 usually mean this particular key is revoked or throttled;
/// 5xx is an upstream availability problem. Both are worth another key.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Sends exactly one upstream attempt with a given credential
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: &RequestContext, credential: &Credential) -> AttemptOutcome;
}

/// Build outbound headers from the inbound ones
///
/// The caller's own `x-goog-api-key` and `authorization` headers are always
/// dropped so the caller secret never reaches the upstream, along with
/// `host`, `content-length` and hop-by-hop headers, which describe the
/// inbound connection rather than the request.
pub fn build_upstream_headers(
    inbound: &HeaderMap,
    credential: &Credential,
    has_body: bool,
    api_client: &HeaderValue,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 2);

    for (name, value) in inbound.iter() {
        if *name == GOOG_API_KEY
            || *name == header::AUTHORIZATION
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || is_hop_by_hop(name)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    headers.insert(GOOG_API_KEY, credential.header_value().clone());

    if has_body && !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    if !headers.contains_key(&GOOG_API_CLIENT) {
        headers.insert(GOOG_API_CLIENT, api_client.clone());
    }

    headers
}
