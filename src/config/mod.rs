//! Configuration management module
//!
//! This module handles loading and validating application configuration
//! from environment variables and .env files.

pub mod settings;

pub use settings::{
    parse_api_keys, Environment, Settings, UpstreamConfig, DEFAULT_API_CLIENT,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_UPSTREAM_BASE_URL,
};
