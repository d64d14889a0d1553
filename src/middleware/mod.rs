//! Middleware module
//!
//! Contains HTTP middleware for authentication, request logging and CORS.

pub mod auth;
pub mod cors;
pub mod logging;

// Re-export commonly used items
pub use auth::{authorize, extract_auth_code, require_auth_code, AuthState};
pub use cors::{create_cors_layer, handle_panic, PREFLIGHT_MAX_AGE};
pub use logging::{log_request, TraceId, REQUEST_ID_HEADER, TRACE_ID_HEADER};
