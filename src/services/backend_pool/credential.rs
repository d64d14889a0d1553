//! Upstream credential type
//!
//! A credential is an opaque API key. It is stored as a pre-validated,
//! sensitive header value so it can be attached to outbound requests
//! without re-checking and is never printed in full.

use axum::http::header::{HeaderValue, InvalidHeaderValue};
use std::fmt;

/// Number of trailing characters shown when a key is logged
const VISIBLE_SUFFIX_CHARS: usize = 5;

/// An upstream API key
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: HeaderValue,
}

impl Credential {
    /// Wrap a raw key, rejecting values that cannot travel in a header
    pub fn new(api_key: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(api_key)?;
        value.set_sensitive(true);
        Ok(Self { value })
    }

    /// Header value for `x-goog-api-key`
    pub fn header_value(&self) -> &HeaderValue {
        &self.value
    }

    /// Key suffix safe for diagnostics, e.g. `...x9QzA`
    pub fn masked(&self) -> String {
        let key = self.value.to_str().unwrap_or_default();
        let total = key.chars().count();
        if total <= VISIBLE_SUFFIX_CHARS {
            return "...".to_string();
        }
        let suffix: String = key.chars().skip(total - VISIBLE_SUFFIX_CHARS).collect();
        format!("...{}", suffix)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}
