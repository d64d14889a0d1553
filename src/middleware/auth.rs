//! Authentication middleware
//!
//! Callers present the shared access code either as `x-goog-api-key` (what
//! Gemini SDKs send natively) or as `Authorization: Bearer <code>` (what
//! OpenAI-style clients send). The code only gates access; it is never
//! forwarded upstream.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::ProxyError;
use crate::services::GOOG_API_KEY;

// ============================================================================
// Code Extraction
// ============================================================================

/// Extract the caller's access code from request headers
///
/// A non-empty `x-goog-api-key` wins; otherwise the token of a Bearer
/// `Authorization` header is used. Returns None if neither is present.
pub fn extract_auth_code(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(GOOG_API_KEY)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split_once(' '))
                .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
                .map(|(_, token)| token.trim())
                .filter(|token| !token.is_empty())
        })
}

/// Check server configuration, then the caller's code
///
/// Configuration problems are reported before authentication so that a
/// misconfigured deployment returns 500 to everyone rather than 401.
pub fn authorize(headers: &HeaderMap, settings: &Settings) -> Result<(), ProxyError> {
    if settings.api_keys.is_empty() {
        return Err(ProxyError::Configuration(
            "GOOGLE_GEMINI_API_KEYS is not set or empty.".to_string(),
        ));
    }
    let Some(expected) = settings.auth_code.as_deref() else {
        return Err(ProxyError::Configuration("AUTH_CODE is not set.".to_string()));
    };

    match extract_auth_code(headers) {
        Some(code) if code == expected => Ok(()),
        Some(_) => Err(ProxyError::Unauthorized("Invalid authorization code.".to_string())),
        None => Err(ProxyError::Unauthorized(
            "Missing authorization code. Send 'x-goog-api-key' or 'Authorization: Bearer <code>'."
                .to_string(),
        )),
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Authentication state required by the middleware
#[derive(Clone)]
pub struct AuthState {
    pub settings: Arc<Settings>,
}

impl AuthState {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

/// Middleware rejecting requests that fail [`authorize`] before any
/// upstream work starts
pub async fn require_auth_code(
    State(auth_state): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ProxyError> {
    authorize(request.headers(), &auth_state.settings)?;
    Ok(next.run(request).await)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn settings() -> Settings {
        Settings {
            api_keys: vec!["AIzaKeyOne".to_string()],
            auth_code: Some("let-me-in".to_string()),
            ..Settings::default()
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_extract_prefers_goog_api_key() {
        let map = headers(&[
            ("x-goog-api-key", "from-goog"),
            ("authorization", "Bearer from-bearer"),
        ]);
        assert_eq!(extract_auth_code(&map), Some("from-goog"));
    }

    #[test]
    fn test_extract_falls_back_to_bearer() {
        let map = headers(&[("authorization", "Bearer from-bearer")]);
        assert_eq!(extract_auth_code(&map), Some("from-bearer"));

        let lower = headers(&[("authorization", "bearer lower")]);
        assert_eq!(extract_auth_code(&lower), Some("lower"));
    }

    #[test]
    fn test_empty_goog_api_key_falls_back() {
        let map = headers(&[("x-goog-api-key", ""), ("authorization", "Bearer fallback")]);
        assert_eq!(extract_auth_code(&map), Some("fallback"));
    }

    #[test]
    fn test_extract_ignores_other_schemes() {
        assert_eq!(extract_auth_code(&headers(&[("authorization", "Basic Zm9vOmJhcg==")])), None);
        assert_eq!(extract_auth_code(&headers(&[("authorization", "Bearer")])), None);
        assert_eq!(extract_auth_code(&HeaderMap::new()), None);
    }

    #[test]
    fn test_authorize_accepts_matching_code() {
        assert!(authorize(&headers(&[("x-goog-api-key", "let-me-in")]), &settings()).is_ok());
        assert!(authorize(&headers(&[("authorization", "Bearer let-me-in")]), &settings()).is_ok());
    }

    #[test]
    fn test_authorize_rejects_missing_and_wrong_code() {
        let missing = authorize(&HeaderMap::new(), &settings()).unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

        let wrong = authorize(&headers(&[("x-goog-api-key", "let-me-in-please")]), &settings())
            .unwrap_err();
        assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

        // Matching is exact, not case-insensitive
        let case = authorize(&headers(&[("x-goog-api-key", "LET-ME-IN")]), &settings()).unwrap_err();
        assert!(matches!(case, ProxyError::Unauthorized(_)));
    }

    #[test]
    fn test_authorize_reports_missing_keys_first() {
        let settings = Settings {
            api_keys: Vec::new(),
            ..settings()
        };
        let err = authorize(&headers(&[("x-goog-api-key", "let-me-in")]), &settings).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("GOOGLE_GEMINI_API_KEYS"));
    }

    #[test]
    fn test_authorize_reports_missing_auth_code() {
        let settings = Settings {
            auth_code: None,
            ..settings()
        };
        // Even an unauthenticated request sees the configuration error
        let err = authorize(&HeaderMap::new(), &settings).unwrap_err();
        assert!(matches!(err, ProxyError::Configuration(_)));
        assert!(err.to_string().contains("AUTH_CODE"));
    }
}
