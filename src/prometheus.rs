//! # Prometheus Target Summary
//!
//! Optional extra signal for the dashboard: how many scrape targets the
//! configured Prometheus instance currently sees as `up`. Collected alongside
//! each poll cycle; failure to collect never affects service verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::constants::health_paths;
use crate::registry::{join_url, ServiceDescriptor};
use crate::transport::{ProbeRequest, ProbeTransport};

/// Aggregate of the `up` metric across all scrape targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpSummary {
    pub targets_up: usize,
    pub targets_total: usize,
}

impl UpSummary {
    pub fn targets_down(&self) -> usize {
        self.targets_total.saturating_sub(self.targets_up)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    /// `[unix_timestamp, "value"]`
    value: (serde_json::Value, String),
}

/// Parse an instant-vector response for the `up` query
///
/// Returns `None` for anything other than a successful vector result.
pub fn parse_up_response(body: &str) -> Option<UpSummary> {
    let response: QueryResponse = serde_json::from_str(body).ok()?;
    if response.status != "success" {
        return None;
    }
    let data = response.data?;
    if data.result_type != "vector" {
        return None;
    }

    let targets_total = data.result.len();
    let targets_up = data
        .result
        .iter()
        .filter(|sample| sample.value.1 == "1")
        .count();

    Some(UpSummary {
        targets_up,
        targets_total,
    })
}

/// Runs the `up` query against a Prometheus service
#[derive(Clone)]
pub struct UpQuery {
    transport: Arc<dyn ProbeTransport>,
    url: String,
    timeout: Duration,
}

impl fmt::Debug for UpQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpQuery")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UpQuery {
    pub fn new(
        transport: Arc<dyn ProbeTransport>,
        prometheus: &ServiceDescriptor,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            url: join_url(prometheus.base_url(), health_paths::PROMETHEUS_UP_QUERY),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Option<UpSummary> {
        let request = ProbeRequest {
            url: self.url.clone(),
            timeout: self.timeout,
            read_body: true,
        };

        let response = match tokio::time::timeout(self.timeout, self.transport.fetch(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!(url = %self.url, error = %e, "Prometheus up query failed");
                return None;
            }
            Err(_) => {
                debug!(url = %self.url, "Prometheus up query timed out");
                return None;
            }
        };

        if let Some(code) = response.status.filter(|c| !(200..300).contains(c)) {
            debug!(url = %self.url, status = code, "Prometheus up query rejected");
            return None;
        }

        response.body.as_deref().and_then(parse_up_response)
    }
}
