//! Application state container
//!
//! Everything here is immutable after startup and shared by all requests.
//! Per-request state (the credential pool, retry progress, the buffered
//! body) lives in the handler and is never stored here.

use crate::config::Settings;
use crate::services::{Credential, Dispatcher, GeminiDispatcher};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Upstream keys every request's pool is built from
    pub credentials: Arc<[Credential]>,

    /// Sends individual upstream attempts
    pub dispatcher: Arc<dyn Dispatcher>,
}

impl AppState {
    /// Create the state with an HTTP dispatcher for the configured upstream
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let dispatcher = GeminiDispatcher::new(&settings.upstream)?;
        Self::with_dispatcher(settings, Arc::new(dispatcher))
    }

    /// Create the state around an existing dispatcher
    pub fn with_dispatcher(
        settings: Settings,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> anyhow::Result<Self> {
        let credentials: Arc<[Credential]> = settings.credentials()?.into();

        if credentials.is_empty() {
            tracing::warn!("GOOGLE_GEMINI_API_KEYS is not set or empty; proxied requests will fail");
        }
        if settings.auth_code.is_none() {
            tracing::warn!("AUTH_CODE is not set; proxied requests will fail");
        }
        if settings.is_production() && !settings.upstream.base_url.starts_with("https://") {
            tracing::warn!(
                upstream = %settings.upstream.base_url,
                "Upstream is not using TLS in production; API keys travel in clear text"
            );
        }

        tracing::info!(
            key_count = credentials.len(),
            max_attempts = settings.upstream.max_attempts,
            "Application state initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            credentials,
            dispatcher,
        })
    }
}
