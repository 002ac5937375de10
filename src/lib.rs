#![allow(clippy::doc_markdown)] // Allow technical terms like Grafana, Prometheus in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Chaos Monitor
//!
//! Service health polling and status aggregation for the Chaos CMS dashboard.
//!
//! ## Overview
//!
//! A fixed set of named backend services (API gateway, chaos backend, CMS
//! service, Prometheus, Grafana, plus any configured extras) is probed
//! concurrently on a schedule. Each probe has a bounded timeout and always
//! resolves to a verdict: `healthy`, `unhealthy`, or `unknown` ("could not
//! verify"). The latest verdicts and their aggregate counts are published as
//! an immutable [`Snapshot`] that readers subscribe to.
//!
//! ## Module Organization
//!
//! - [`registry`] - Ordered, immutable set of services and health path conventions
//! - [`prober`] - One bounded-time health check per service
//! - [`poller`] - Fan-out/fan-in poll cycles, snapshot publication, scheduling
//! - [`status`] - Per-service status and aggregate snapshot types
//! - [`transport`] - Network seam for probes (reqwest-backed by default)
//! - [`prometheus`] - Optional Prometheus `up` target summary
//! - [`config`] - Layered configuration and environment validation
//! - [`bootstrap`] - Wiring from configuration to a running monitor
//! - [`logging`] - Tracing initialisation and structured log macros
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chaos_monitor::{MonitorConfig, MonitorSystem};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = MonitorSystem::bootstrap(MonitorConfig::load()?)?;
//!
//! // One on-demand cycle
//! if let Some(snapshot) = system.aggregator().run_cycle().await.snapshot() {
//!     for status in snapshot.services() {
//!         println!("{:<16} {}", status.name, status.state);
//!     }
//!     println!("{} services healthy", snapshot.summary());
//! }
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod poller;
pub mod prober;
pub mod prometheus;
pub mod registry;
pub mod status;
pub mod transport;

pub use bootstrap::{DashboardLink, MonitorSystem};
pub use config::{MonitorConfig, ServiceEndpoint, ValidationReport};
pub use error::{MonitorError, MonitorResult, TransportError};
pub use poller::{CycleOutcome, HealthAggregator, PollerHandle};
pub use prober::{HealthProber, ProbeMode};
pub use prometheus::UpSummary;
pub use registry::{ServiceDescriptor, ServiceKind, ServiceRegistry};
pub use status::{ServiceState, ServiceStatus, Snapshot};
pub use transport::{HttpTransport, ProbeRequest, ProbeResponse, ProbeTransport};
