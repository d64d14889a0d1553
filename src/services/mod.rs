//! Services module
//!
//! Credential pooling, the upstream dispatcher and the failover loop.

pub mod backend_pool;
pub mod gemini;
pub mod orchestrator;
pub mod upstream;

pub use backend_pool::{Credential, CredentialPool};
pub use gemini::GeminiDispatcher;
pub use orchestrator::{RetryOrchestrator, RetryState};
pub use upstream::{
    build_upstream_headers, is_retryable_status, AttemptError, AttemptOutcome, Dispatcher,
    RequestContext, UpstreamResponse, GOOG_API_CLIENT, GOOG_API_KEY,
};
