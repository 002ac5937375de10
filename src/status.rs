//! # Service Status and Snapshots
//!
//! Per-service verdicts and the aggregate point-in-time view handed to
//! readers. `Unknown` means "could not verify" and is deliberately distinct
//! from `Unhealthy` ("confirmed failing").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::prometheus::UpSummary;
use crate::registry::{ServiceDescriptor, ServiceRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Healthy => "healthy",
            ServiceState::Unhealthy => "unhealthy",
            ServiceState::Unknown => "unknown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceState::Healthy)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest verdict for one registered service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    /// Base URL of the service, for display
    pub url: String,
    pub state: ServiceState,
    /// Only set when the probe completed a round trip
    pub response_time_ms: Option<u64>,
    /// Set on every probe attempt, including failed ones
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Reported by the service's health body, when readable
    pub version: Option<String>,
    /// Why the verdict is not `Healthy`
    pub detail: Option<String>,
}

impl ServiceStatus {
    /// Status before the first probe
    pub fn initial(descriptor: &ServiceDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            url: descriptor.base_url().to_string(),
            state: ServiceState::Unknown,
            response_time_ms: None,
            last_checked_at: None,
            version: None,
            detail: None,
        }
    }

    pub fn healthy(
        descriptor: &ServiceDescriptor,
        response_time_ms: u64,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state: ServiceState::Healthy,
            response_time_ms: Some(response_time_ms),
            last_checked_at: Some(checked_at),
            ..Self::initial(descriptor)
        }
    }

    pub fn unhealthy(
        descriptor: &ServiceDescriptor,
        response_time_ms: u64,
        checked_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            state: ServiceState::Unhealthy,
            response_time_ms: Some(response_time_ms),
            last_checked_at: Some(checked_at),
            detail: Some(detail.into()),
            ..Self::initial(descriptor)
        }
    }

    pub fn unknown(
        descriptor: &ServiceDescriptor,
        checked_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            last_checked_at: Some(checked_at),
            detail: Some(detail.into()),
            ..Self::initial(descriptor)
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }
}

/// Point-in-time view of every registered service plus derived counts
///
/// Counts are computed on construction and cannot drift from `services`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    cycle: u64,
    services: Vec<ServiceStatus>,
    healthy_count: usize,
    total_count: usize,
    published_at: Option<DateTime<Utc>>,
    metrics: Option<UpSummary>,
}

impl Snapshot {
    pub fn new(
        cycle: u64,
        services: Vec<ServiceStatus>,
        published_at: Option<DateTime<Utc>>,
        metrics: Option<UpSummary>,
    ) -> Self {
        let healthy_count = services.iter().filter(|s| s.state.is_healthy()).count();
        let total_count = services.len();
        Self {
            cycle,
            services,
            healthy_count,
            total_count,
            published_at,
            metrics,
        }
    }

    /// Every registered service in `Unknown`, before any cycle has run
    pub fn initial(registry: &ServiceRegistry) -> Self {
        Self::new(
            0,
            registry.iter().map(ServiceStatus::initial).collect(),
            None,
            None,
        )
    }

    /// Sequence number of the cycle that produced this snapshot (0 = none yet)
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Statuses in registry order
    pub fn services(&self) -> &[ServiceStatus] {
        &self.services
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy_count
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn metrics(&self) -> Option<&UpSummary> {
        self.metrics.as_ref()
    }

    pub fn count(&self, state: ServiceState) -> usize {
        self.services.iter().filter(|s| s.state == state).count()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceStatus> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn all_healthy(&self) -> bool {
        self.healthy_count == self.total_count
    }

    /// "healthy/total", as shown on the dashboard card
    pub fn summary(&self) -> String {
        format!("{}/{}", self.healthy_count, self.total_count)
    }
}
