//! Application settings and configuration
//!
//! Settings are read once at process start from environment variables
//! (optionally seeded from a `.env` file) and shared read-only afterwards.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::services::Credential;

/// Default upstream origin. Path and query are appended per request.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Fallback `x-goog-api-client` value sent when the caller supplies none
pub const DEFAULT_API_CLIENT: &str = "google-genai-sdk/1.28.0";

/// Default cap on upstream attempts per inbound request
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Upstream call configuration
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamConfig {
    /// Scheme and host the inbound path/query is replayed against
    pub base_url: String,
    /// Value for `x-goog-api-client` when the caller does not send one
    pub api_client: String,
    /// Maximum upstream attempts for a single inbound request
    pub max_attempts: usize,
    /// Deadline per attempt, up to the arrival of response headers
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_client: DEFAULT_API_CLIENT.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_seconds: 120,
            connect_timeout_seconds: 10,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Main application settings
#[derive(Clone, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub host: String,
    pub port: u16,

    /// Upstream API keys, in configuration order
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,

    /// Secret callers must present
    #[serde(skip_serializing)]
    pub auth_code: Option<String>,

    pub upstream: UpstreamConfig,

    /// Largest inbound body that will be buffered for replay
    pub max_request_body_bytes: usize,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        let settings = Self {
            app_name: env_or_default("APP_NAME", "gemini-key-proxy"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: env_or_default("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: env_or_default("LOG_LEVEL", "info"),

            host: env_or_default("HOST", "0.0.0.0"),
            port: env_or_default("PORT", "8000")
                .parse()
                .context("Invalid PORT value")?,

            api_keys: env::var("GOOGLE_GEMINI_API_KEYS")
                .map(|raw| parse_api_keys(&raw))
                .unwrap_or_default(),
            auth_code: env::var("AUTH_CODE").ok().filter(|code| !code.is_empty()),

            upstream: UpstreamConfig {
                base_url: env_or_default("UPSTREAM_BASE_URL", DEFAULT_UPSTREAM_BASE_URL),
                api_client: env_or_default("GOOG_API_CLIENT", DEFAULT_API_CLIENT),
                max_attempts: env_or_default("MAX_RETRIES", "3")
                    .parse()
                    .context("Invalid MAX_RETRIES value")?,
                timeout_seconds: env_or_default("UPSTREAM_TIMEOUT_SECONDS", "120")
                    .parse()
                    .context("Invalid UPSTREAM_TIMEOUT_SECONDS value")?,
                connect_timeout_seconds: env_or_default("UPSTREAM_CONNECT_TIMEOUT_SECONDS", "10")
                    .parse()
                    .context("Invalid UPSTREAM_CONNECT_TIMEOUT_SECONDS value")?,
            },

            max_request_body_bytes: env_or_default("MAX_REQUEST_BODY_BYTES", "20971520")
                .parse()
                .context("Invalid MAX_REQUEST_BODY_BYTES value")?,
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    ///
    /// Missing keys or auth code are not checked here; requests fail with a
    /// configuration error instead.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }
        if self.upstream.max_attempts == 0 {
            anyhow::bail!("MAX_RETRIES must be > 0");
        }
        if self.upstream.timeout_seconds == 0 || self.upstream.connect_timeout_seconds == 0 {
            anyhow::bail!("Upstream timeouts must be > 0");
        }
        if self.max_request_body_bytes == 0 {
            anyhow::bail!("MAX_REQUEST_BODY_BYTES must be > 0");
        }

        let url = reqwest::Url::parse(&self.upstream.base_url)
            .with_context(|| format!("Invalid UPSTREAM_BASE_URL: {}", self.upstream.base_url))?;
        if url.host_str().is_none() {
            anyhow::bail!("UPSTREAM_BASE_URL must include a host");
        }

        // Surface unusable keys at startup rather than on first use
        self.credentials()?;

        Ok(())
    }

    /// Build the immutable credential list shared by every request's pool
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        self.api_keys
            .iter()
            .enumerate()
            .map(|(idx, key)| {
                Credential::new(key)
                    .with_context(|| format!("API key #{} is not a valid header value", idx + 1))
            })
            .collect()
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Secrets are reduced to a count and a presence flag
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("auth_code", &self.auth_code.as_ref().map(|_| "<redacted>"))
            .field("upstream", &self.upstream)
            .field("max_request_body_bytes", &self.max_request_body_bytes)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "gemini-key-proxy".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_keys: Vec::new(),
            auth_code: None,
            upstream: UpstreamConfig::default(),
            max_request_body_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Split a comma-separated key list, trimming whitespace and dropping blanks
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
