//! Cross-origin decoration and last-resort error handling
//!
//! Browsers only let callers read a response (including an error body)
//! when it carries `Access-Control-Allow-Origin`, so the CORS layer wraps
//! everything, panics included. Preflight `OPTIONS` requests are answered
//! by the layer itself and never reach authentication or the upstream.

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::time::Duration;
use tower_http::cors::{self, CorsLayer};

use super::logging::{REQUEST_ID_HEADER, TRACE_ID_HEADER};

/// How long browsers may cache a preflight answer
pub const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Permissive CORS: any origin, any request header, common methods
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(cors::Any)
        .max_age(PREFLIGHT_MAX_AGE)
        .expose_headers([
            HeaderName::from_static(TRACE_ID_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Convert a handler panic into a plain 500
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Internal server error",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_panic_returns_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle_panic(Box::new(String::from("boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle_panic(Box::new(42u8));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
