//! Credential failover loop
//!
//! Drives attempts for one inbound request: draw a key, dispatch, and either
//! hand the upstream response back or move on to another key. Attempts are
//! strictly sequential and each uses a distinct key.

use super::backend_pool::CredentialPool;
use super::upstream::{AttemptError, AttemptOutcome, Dispatcher, RequestContext, UpstreamResponse};
use crate::error::ProxyError;

/// Progress through the attempt budget for one request
#[derive(Debug, Default)]
pub struct RetryState {
    pub attempts: usize,
    pub last_error: Option<AttemptError>,
}

/// Retry loop over a per-request credential pool
pub struct RetryOrchestrator<'a> {
    dispatcher: &'a dyn Dispatcher,
    max_attempts: usize,
}

impl<'a> RetryOrchestrator<'a> {
    pub fn new(dispatcher: &'a dyn Dispatcher, max_attempts: usize) -> Self {
        Self {
            dispatcher,
            max_attempts,
        }
    }

    /// Run attempts until one yields a response for the caller or the budget
    /// (attempt cap or pool size, whichever is smaller) is spent
    pub async fn execute(
        &self,
        request: &RequestContext,
        pool: &mut CredentialPool<'_>,
    ) -> Result<UpstreamResponse, ProxyError> {
        let mut state = RetryState::default();

        loop {
            let Some(credential) = pool.draw() else {
                return Err(exhausted(state));
            };

            match self.dispatcher.dispatch(request, credential).await {
                AttemptOutcome::Success(response) => {
                    tracing::debug!(
                        attempt = state.attempts + 1,
                        credential = %credential,
                        status = response.status.as_u16(),
                        "Upstream attempt succeeded"
                    );
                    return Ok(response);
                }
                AttemptOutcome::TerminalFailure(response) => {
                    tracing::info!(
                        attempt = state.attempts + 1,
                        credential = %credential,
                        status = response.status.as_u16(),
                        "Upstream returned non-retryable status, passing through"
                    );
                    return Ok(response);
                }
                AttemptOutcome::RetryableFailure(err) => {
                    state.attempts += 1;
                    tracing::warn!(
                        attempt = state.attempts,
                        credential = %credential,
                        remaining_keys = pool.remaining(),
                        error = %err,
                        "Upstream attempt failed"
                    );
                    state.last_error = Some(err);

                    if state.attempts >= self.max_attempts || pool.is_exhausted() {
                        return Err(exhausted(state));
                    }
                }
            }
        }
    }
}

fn exhausted(state: RetryState) -> ProxyError {
    ProxyError::Exhausted {
        attempts: state.attempts,
        last_error: state.last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend_pool::Credential;
    use async_trait::async_trait;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    /// Replies with a scripted status per call and records the key used
    struct ScriptedDispatcher {
        statuses: Mutex<VecDeque<StatusCode>>,
        seen: Mutex<Vec<HeaderValue>>,
    }

    impl ScriptedDispatcher {
        fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(
                    statuses
                        .iter()
                        .map(|s| StatusCode::from_u16(*s).unwrap())
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn distinct_keys(&self) -> usize {
            self.seen.lock().unwrap().iter().cloned().collect::<HashSet<_>>().len()
        }
    }

    #[async_trait]
    impl Dispatcher for ScriptedDispatcher {
        async fn dispatch(&self, _request: &RequestContext, credential: &Credential) -> AttemptOutcome {
            self.seen.lock().unwrap().push(credential.header_value().clone());
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("more attempts than scripted");

            if crate::services::upstream::is_retryable_status(status) {
                AttemptOutcome::RetryableFailure(AttemptError::Status { status })
            } else {
                let body = format!("status {}", status.as_u16());
                let response = UpstreamResponse::new(status, HeaderMap::new(), body);
                if status.is_success() {
                    AttemptOutcome::Success(response)
                } else {
                    AttemptOutcome::TerminalFailure(response)
                }
            }
        }
    }

    fn keys(n: usize) -> Vec<Credential> {
        (0..n)
            .map(|i| Credential::new(&format!("AIzaTestKey{:05}", i)).unwrap())
            .collect()
    }

    fn request() -> RequestContext {
        RequestContext {
            method: Method::POST,
            path: "/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"{\"contents\":[]}"),
        }
    }

    async fn run(
        statuses: &[u16],
        pool_size: usize,
        max_attempts: usize,
    ) -> (Result<UpstreamResponse, ProxyError>, ScriptedDispatcher) {
        let dispatcher = ScriptedDispatcher::new(statuses);
        let credentials = keys(pool_size);
        let mut pool = CredentialPool::new(&credentials);
        let result = RetryOrchestrator::new(&dispatcher, max_attempts)
            .execute(&request(), &mut pool)
            .await;
        (result, dispatcher)
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let (result, dispatcher) = run(&[200], 3, 3).await;

        assert_eq!(result.unwrap().status, StatusCode::OK);
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_success_after_two_rate_limits() {
        let (result, dispatcher) = run(&[429, 429, 200], 3, 3).await;

        assert_eq!(result.unwrap().status, StatusCode::OK);
        assert_eq!(dispatcher.calls(), 3);
        assert_eq!(dispatcher.distinct_keys(), 3);
    }

    #[tokio::test]
    async fn test_all_server_errors_exhaust_budget() {
        let (result, dispatcher) = run(&[500, 500, 500], 3, 3).await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("All 3 API key attempts failed"));
        assert_eq!(dispatcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_single_key_unauthorized_stops_after_one_call() {
        let (result, dispatcher) = run(&[401], 1, 3).await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("401"));
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_client_error_is_passed_through_without_retry() {
        let (result, dispatcher) = run(&[400], 3, 3).await;

        assert_eq!(result.unwrap().status, StatusCode::BAD_REQUEST);
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_terminal_failure_after_retry() {
        let (result, dispatcher) = run(&[503, 404], 3, 3).await;

        assert_eq!(result.unwrap().status, StatusCode::NOT_FOUND);
        assert_eq!(dispatcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_attempt_cap_is_smaller_than_pool() {
        let (result, dispatcher) = run(&[429, 429, 429], 10, 3).await;

        assert!(matches!(result, Err(ProxyError::Exhausted { attempts: 3, .. })));
        assert_eq!(dispatcher.calls(), 3);
        assert_eq!(dispatcher.distinct_keys(), 3);
    }

    #[tokio::test]
    async fn test_pool_is_smaller_than_attempt_cap() {
        let (result, dispatcher) = run(&[500, 502], 2, 3).await;

        assert!(matches!(result, Err(ProxyError::Exhausted { attempts: 2, .. })));
        assert_eq!(dispatcher.calls(), 2);
        assert_eq!(dispatcher.distinct_keys(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_failure() {
        let (result, _) = run(&[500, 429], 2, 3).await;

        match result {
            Err(ProxyError::Exhausted { last_error: Some(err), .. }) => {
                assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|r| r.status)),
        }
    }

    #[tokio::test]
    async fn test_empty_pool_makes_no_calls() {
        let (result, dispatcher) = run(&[], 0, 3).await;

        assert!(matches!(
            result,
            Err(ProxyError::Exhausted { attempts: 0, last_error: None })
        ));
        assert_eq!(dispatcher.calls(), 0);
    }
}
