//! HTTP transport for status pages.
//!
//! The transport performs exactly one authenticated GET and classifies any
//! failure into a [`FetchError`]. Retrying is the job of
//! [`crate::client::StatusClient`].

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::endpoint::Endpoint;

/// A single failed fetch, classified by cause
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 200 with no usable body
    #[error("Response is null")]
    EmptyBody,

    /// 4xx or 5xx
    #[error("Http error: status {0}")]
    HttpStatus(u16),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Error connecting: {0}")]
    Connect(String),

    /// Any non-error status other than 200
    #[error("Statuscode is {0}, not 200")]
    UnexpectedStatus(u16),

    #[error("Request failed: {0}")]
    Other(String),
}

impl FetchError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout(error.to_string())
        } else if error.is_connect() {
            FetchError::Connect(error.to_string())
        } else {
            FetchError::Other(error.to_string())
        }
    }

    fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_client_error() || status.is_server_error() {
            Some(FetchError::HttpStatus(status.as_u16()))
        } else if status != StatusCode::OK {
            Some(FetchError::UnexpectedStatus(status.as_u16()))
        } else {
            None
        }
    }
}

/// Transport trait for fetching a status page as JSON
#[async_trait::async_trait]
pub trait StatusTransport: Send + Sync {
    /// Perform one GET against the endpoint and return the parsed body
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value, FetchError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("madwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl StatusTransport for HttpTransport {
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value, FetchError> {
        let credentials = endpoint.credentials();

        let response = self
            .client
            .get(endpoint.url().clone())
            .basic_auth(&credentials.user, Some(&credentials.pass))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if let Some(error) = FetchError::from_status(response.status()) {
            return Err(error);
        }

        let body = response.bytes().await.map_err(FetchError::from_reqwest)?;
        parse_body(&body)
    }
}

/// Parse a 200 body; blank bodies and a literal `null` count as empty
fn parse_body(body: &[u8]) -> Result<Value, FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::EmptyBody);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => Err(FetchError::EmptyBody),
        Ok(value) => Ok(value),
        Err(e) => Err(FetchError::Other(format!("invalid JSON body: {e}"))),
    }
}
