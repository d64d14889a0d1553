//! Gemini key-pool proxy library
//!
//! Authenticates callers with one shared code and forwards their requests
//! to the Gemini API, failing over across a pool of upstream keys.

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ProxyError;
pub use server::{create_router, App, AppState};
