//! Retrying status client.
//!
//! [`StatusClient::fetch`] keeps asking a status page until it answers with a
//! JSON body. Every failure class has its own fixed delay; there is no
//! backoff and no jitter. Unless [`RetryPolicy::max_retries`] is set the loop
//! never gives up.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{DeviceError, Service};
use crate::transport::{FetchError, StatusTransport};

/// Raised only when a retry bound is configured and reached
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: FetchError,
    },
}

/// Delay table and optional retry bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub empty_body: Duration,
    pub http_status: Duration,
    pub timeout: Duration,
    pub connect: Duration,
    pub unexpected_status: Duration,
    pub other: Duration,
    /// Retries allowed after the first attempt; `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            empty_body: Duration::from_secs(5),
            http_status: Duration::from_secs(10),
            timeout: Duration::from_secs(10),
            connect: Duration::from_secs(30),
            unexpected_status: Duration::from_secs(30),
            other: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retrying after `error`
    pub fn delay_for(&self, error: &FetchError) -> Duration {
        match error {
            FetchError::EmptyBody => self.empty_body,
            FetchError::HttpStatus(_) => self.http_status,
            FetchError::Timeout(_) => self.timeout,
            FetchError::Connect(_) => self.connect,
            FetchError::UnexpectedStatus(_) => self.unexpected_status,
            FetchError::Other(_) => self.other,
        }
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Status page client that retries transient failures
pub struct StatusClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: StatusTransport> StatusClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the endpoint, retrying until it returns a JSON body
    pub async fn fetch(&self, endpoint: &Endpoint) -> Result<Value, StatusError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let error = match self.transport.get_json(endpoint).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!(url = %endpoint, attempt, "Statuspage reachable again");
                    }
                    return Ok(body);
                }
                Err(error) => error,
            };

            if let Some(max_retries) = self.policy.max_retries {
                if attempt > max_retries {
                    return Err(StatusError::RetriesExhausted {
                        url: endpoint.to_string(),
                        attempts: attempt,
                        last: error,
                    });
                }
            }

            let delay = self.policy.delay_for(&error);
            warn!(
                url = %endpoint,
                attempt,
                "{error}. Retry connect to statuspage in {}s...",
                delay.as_secs()
            );
            sleep(delay).await;
        }
    }

    /// Fetch and decode into a typed payload
    pub async fn fetch_as<D: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        service: Service,
    ) -> Result<D, DeviceError> {
        let body = self.fetch(endpoint).await?;
        debug!(url = %endpoint, %service, "Fetched status page");
        serde_json::from_value(body).map_err(|source| DeviceError::Decode { service, source })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::endpoint::Credentials;

    /// Transport that replays a fixed script of outcomes
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<Value, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Value, FetchError>>) -> Self {
            Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl StatusTransport for ScriptedTransport {
        async fn get_json(&self, _endpoint: &Endpoint) -> Result<Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Other("script exhausted".into())))
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::parse("http://127.0.0.1:8000/status/", Credentials::new("u", "p")).unwrap()
    }

    #[test]
    fn test_default_delay_table() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(&FetchError::EmptyBody), Duration::from_secs(5));
        assert_eq!(policy.delay_for(&FetchError::HttpStatus(500)), Duration::from_secs(10));
        assert_eq!(policy.delay_for(&FetchError::Timeout("t".into())), Duration::from_secs(10));
        assert_eq!(policy.delay_for(&FetchError::Connect("c".into())), Duration::from_secs(30));
        assert_eq!(policy.delay_for(&FetchError::UnexpectedStatus(204)), Duration::from_secs(30));
        assert_eq!(policy.delay_for(&FetchError::Other("o".into())), Duration::from_secs(30));
        assert_eq!(policy.max_retries, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_connection_errors() {
        let transport = ScriptedTransport::new(vec![
            Err(FetchError::Connect("refused".into())),
            Err(FetchError::Connect("refused".into())),
            Err(FetchError::Connect("refused".into())),
            Ok(json!({"origin_status": {}})),
        ]);
        let client = StatusClient::new(transport, RetryPolicy::default());

        let start = Instant::now();
        let body = client.fetch(&endpoint()).await.unwrap();

        assert_eq!(body, json!({"origin_status": {}}));
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_failure_class_waits_its_own_delay() {
        let transport = ScriptedTransport::new(vec![
            Err(FetchError::EmptyBody),
            Err(FetchError::HttpStatus(503)),
            Err(FetchError::Timeout("slow".into())),
            Ok(json!([])),
        ]);
        let client = StatusClient::new(transport, RetryPolicy::default());

        let start = Instant::now();
        client.fetch(&endpoint()).await.unwrap();

        // 5 + 10 + 10
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(25), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(26), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_gives_up() {
        let transport = ScriptedTransport::new(vec![
            Err(FetchError::HttpStatus(500)),
            Err(FetchError::HttpStatus(500)),
            Err(FetchError::HttpStatus(502)),
            Ok(json!([])),
        ]);
        let policy = RetryPolicy::default().with_max_retries(Some(2));
        let client = StatusClient::new(transport, policy);

        let err = client.fetch(&endpoint()).await.unwrap_err();
        let StatusError::RetriesExhausted { attempts, last, .. } = err;
        assert_eq!(attempts, 3);
        assert_eq!(last, FetchError::HttpStatus(502));
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_as_reports_shape_mismatch() {
        let transport = ScriptedTransport::new(vec![Ok(json!({"unexpected": true}))]);
        let client = StatusClient::new(transport, RetryPolicy::default());

        let result: Result<crate::status::InjectionStatusPage, _> =
            client.fetch_as(&endpoint(), Service::Mitm).await;
        assert!(matches!(result, Err(DeviceError::Decode { service: Service::Mitm, .. })));
    }
}
