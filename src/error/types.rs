//! Proxy error types

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::AttemptError;

/// Errors surfaced to the caller
///
/// Retryable upstream failures never appear here individually; the retry
/// loop folds them into [`ProxyError::Exhausted`].
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Server misconfiguration: {0}")]
    Configuration(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("{}", exhaustion_message(.attempts, .last_error))]
    Exhausted {
        attempts: usize,
        last_error: Option<AttemptError>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn exhaustion_message(attempts: &usize, last_error: &Option<AttemptError>) -> String {
    match last_error {
        Some(err) => format!("All {} API key attempts failed: {}", attempts, err),
        None => "No API keys available to process the request after all attempts.".to_string(),
    }
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ProxyError::Configuration(_) | ProxyError::Internal(_) => {
                tracing::error!(status = status.as_u16(), error = %self, "Request failed");
            }
            ProxyError::Exhausted { attempts, last_error } => {
                tracing::error!(
                    status = status.as_u16(),
                    attempts = attempts,
                    last_status = last_error.as_ref().and_then(AttemptError::status).map(|s| s.as_u16()),
                    error = %self,
                    "Upstream attempts exhausted"
                );
            }
            _ => {
                tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
            }
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::Configuration("AUTH_CODE is not set.".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::Unauthorized("bad code".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::PayloadTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_exhaustion_is_always_503() {
        let err = ProxyError::Exhausted {
            attempts: 3,
            last_error: Some(AttemptError::Status {
                status: StatusCode::TOO_MANY_REQUESTS,
            }),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let message = err.to_string();
        assert!(message.starts_with("All 3 API key attempts failed"));
        assert!(message.contains("429"));
    }

    #[test]
    fn test_exhaustion_without_attempts() {
        let err = ProxyError::Exhausted {
            attempts: 0,
            last_error: None,
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("No API keys available"));
    }

    #[test]
    fn test_into_response_is_plain_text() {
        let response = ProxyError::Unauthorized("Invalid authorization code.".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
