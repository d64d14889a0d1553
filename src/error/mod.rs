//! Error taxonomy and its mapping onto HTTP responses

mod types;

pub use types::ProxyError;
