//! # Probe Transport
//!
//! The network seam used by the prober. `HttpTransport` issues real requests
//! with reqwest; tests substitute scripted transports.
//!
//! A transport reports whether a request *completed*. Whether a completed
//! request means "healthy" is the prober's decision, so a transport that
//! cannot see status codes (an opaque relay, for instance) returns
//! `status: None` rather than guessing.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use crate::config::ProbeConfig;
use crate::error::{MonitorResult, TransportError};

/// Largest health body the HTTP transport will hand back
pub const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub url: String,
    pub timeout: Duration,
    /// Whether the caller will look at the response body
    pub read_body: bool,
}

/// What a completed request revealed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    /// `None` when the status code could not be observed
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl ProbeResponse {
    /// A completed request whose status and body are unreadable
    pub fn opaque() -> Self {
        Self::default()
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Get the transport name for debugging/logging.
    fn transport_name(&self) -> &'static str;

    /// Issue a single GET. Must not retry.
    async fn fetch(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> MonitorResult<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ProbeConfig) -> MonitorResult<Self> {
        Self::new(&config.user_agent)
    }

    fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl ProbeTransport for HttpTransport {
    fn transport_name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| Self::classify(e, request.timeout))?;

        let status = response.status().as_u16();

        let body = if request.read_body {
            read_bounded(response, &request.url).await
        } else {
            None
        };

        Ok(ProbeResponse {
            status: Some(status),
            body,
        })
    }
}

/// Read at most `MAX_BODY_BYTES` of a health body
///
/// Oversized, unreadable, or non-UTF-8 bodies yield `None`; the status code
/// has already been observed either way.
async fn read_bounded(mut response: Response, url: &str) -> Option<String> {
    if let Some(length) = response.content_length() {
        if length > MAX_BODY_BYTES as u64 {
            debug!(url = %url, bytes = length, "Skipping oversized health body");
            return None;
        }
    }

    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if body.len() + chunk.len() > MAX_BODY_BYTES {
                    debug!(url = %url, limit = MAX_BODY_BYTES, "Abandoning oversized health body");
                    return None;
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(url = %url, error = %e, "Failed to read health body");
                return None;
            }
        }
    }

    String::from_utf8(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_response_builders() {
        assert_eq!(ProbeResponse::opaque().status, None);
        let response = ProbeResponse::with_status(200).with_body("{\"version\":\"1.0\"}");
        assert_eq!(response.status, Some(200));
        assert!(response.body.is_some());
    }

    #[test]
    fn test_http_transport_builds_from_config() {
        let transport = HttpTransport::from_config(&ProbeConfig::default()).unwrap();
        assert_eq!(transport.transport_name(), "http");
    }
}
