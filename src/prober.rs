//! # Health Prober
//!
//! Runs one bounded-time health check against one service and turns the
//! outcome into a [`ServiceStatus`]. Nothing escapes as an error: a failing
//! service must never stop the remaining services from being probed.
//!
//! ## Verdicts
//!
//! | Outcome                                   | `status_aware` | `opaque`  |
//! |-------------------------------------------|----------------|-----------|
//! | timeout / DNS / connection refused        | unknown        | unknown   |
//! | completed, 2xx                            | healthy        | healthy   |
//! | completed, other status                   | unhealthy      | healthy   |
//! | completed, status not observable          | healthy        | healthy   |
//!
//! `opaque` reproduces a browser probe made without CORS access, where
//! "reachable" is the only signal available.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ProbeConfig;
use crate::constants::timing;
use crate::log_probe;
use crate::registry::ServiceDescriptor;
use crate::status::ServiceStatus;
use crate::transport::{ProbeRequest, ProbeResponse, ProbeTransport};

/// How a completed probe request is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Status codes decide healthy vs unhealthy
    #[default]
    StatusAware,
    /// Any completed request counts as healthy
    Opaque,
}

#[derive(Clone)]
pub struct HealthProber {
    transport: Arc<dyn ProbeTransport>,
    timeout: Duration,
    mode: ProbeMode,
}

impl fmt::Debug for HealthProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthProber")
            .field("transport", &self.transport.transport_name())
            .field("timeout", &self.timeout)
            .field("mode", &self.mode)
            .finish()
    }
}

impl HealthProber {
    pub fn new(transport: Arc<dyn ProbeTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_millis(timing::DEFAULT_PROBE_TIMEOUT_MS),
            mode: ProbeMode::default(),
        }
    }

    pub fn from_config(transport: Arc<dyn ProbeTransport>, config: &ProbeConfig) -> Self {
        Self::new(transport)
            .with_timeout(config.timeout())
            .with_mode(config.mode)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    pub fn transport(&self) -> &Arc<dyn ProbeTransport> {
        &self.transport
    }

    /// Probe one service
    ///
    /// Bounded by the prober timeout even when the transport ignores its own.
    pub async fn probe(&self, descriptor: &ServiceDescriptor) -> ServiceStatus {
        let request = ProbeRequest {
            url: descriptor.probe_url(),
            timeout: self.timeout,
            read_body: self.mode == ProbeMode::StatusAware,
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.transport.fetch(&request)).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let checked_at = Utc::now();

        match outcome {
            Ok(Ok(response)) => self.interpret(descriptor, response, elapsed_ms, checked_at),
            Ok(Err(error)) => {
                log_probe!(debug, "FAILED",
                    service: descriptor.name(),
                    url: request.url,
                    error: error.to_string(),
                );
                ServiceStatus::unknown(descriptor, checked_at, error.to_string())
            }
            Err(_) => {
                let detail = format!("timed out after {}ms", self.timeout.as_millis());
                log_probe!(debug, "TIMEOUT",
                    service: descriptor.name(),
                    url: request.url,
                    timeout_ms: self.timeout.as_millis(),
                );
                ServiceStatus::unknown(descriptor, checked_at, detail)
            }
        }
    }

    fn interpret(
        &self,
        descriptor: &ServiceDescriptor,
        response: ProbeResponse,
        elapsed_ms: u64,
        checked_at: chrono::DateTime<Utc>,
    ) -> ServiceStatus {
        if self.mode == ProbeMode::Opaque {
            return ServiceStatus::healthy(descriptor, elapsed_ms, checked_at);
        }

        match response.status {
            Some(code) if !(200..300).contains(&code) => {
                log_probe!(debug, "UNHEALTHY",
                    service: descriptor.name(),
                    status: code,
                    elapsed_ms: elapsed_ms,
                );
                ServiceStatus::unhealthy(descriptor, elapsed_ms, checked_at, format!("HTTP {code}"))
            }
            _ => {
                let version = response.body.as_deref().and_then(extract_version);
                ServiceStatus::healthy(descriptor, elapsed_ms, checked_at).with_version(version)
            }
        }
    }
}

/// Pull a top-level `"version"` string out of a JSON health body
pub fn extract_version(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("version")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
