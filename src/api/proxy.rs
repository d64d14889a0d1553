//! Catch-all proxy endpoint
//!
//! Every authenticated request, whatever its method and path, is buffered
//! once and replayed against the upstream with pooled keys until one
//! attempt produces a response for the caller.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
};

use http_body_util::LengthLimitError;
use std::error::Error as StdError;

use crate::error::ProxyError;
use crate::server::state::AppState;
use crate::services::{CredentialPool, RequestContext, RetryOrchestrator};

/// Forward a request upstream with credential failover
///
/// ANY /*path
pub async fn forward(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ProxyError> {
    let limit = state.settings.max_request_body_bytes;
    let context = buffer_request(request, limit).await?;

    let mut pool = CredentialPool::new(&state.credentials);
    let orchestrator =
        RetryOrchestrator::new(state.dispatcher.as_ref(), state.settings.upstream.max_attempts);

    let response = orchestrator.execute(&context, &mut pool).await?;
    Ok(response.into_response())
}

/// Read the inbound body into memory so each attempt can resend it
pub async fn buffer_request(request: Request, limit: usize) -> Result<RequestContext, ProxyError> {
    let (parts, body) = request.into_parts();

    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > limit) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    let body = to_bytes(body, limit).await.map_err(|e| {
        if exceeds_length_limit(&e) {
            ProxyError::PayloadTooLarge { limit }
        } else {
            ProxyError::InvalidRequest(format!("failed to read request body: {}", e))
        }
    })?;

    Ok(RequestContext {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    })
}

/// Whether a buffering failure came from the body limit rather than the
/// connection
fn exceeds_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
