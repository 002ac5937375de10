//! # Monitor Bootstrap
//!
//! Wires configuration into a running monitor:
//! config → registry → transport → prober → aggregator.
//!
//! ```rust,no_run
//! use chaos_monitor::bootstrap::MonitorSystem;
//! use chaos_monitor::config::MonitorConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = MonitorSystem::bootstrap(MonitorConfig::load()?)?;
//! let handle = system.start_polling();
//!
//! let mut updates = system.aggregator().subscribe();
//! updates.changed().await?;
//! println!("{} healthy", updates.borrow().summary());
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::info;

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::poller::{HealthAggregator, PollerHandle};
use crate::prober::HealthProber;
use crate::prometheus::UpQuery;
use crate::registry::{ServiceKind, ServiceRegistry};
use crate::transport::{HttpTransport, ProbeTransport};

/// External dashboard reachable from the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLink {
    pub name: String,
    pub url: String,
}

/// Fully wired monitor
#[derive(Debug)]
pub struct MonitorSystem {
    config: MonitorConfig,
    registry: Arc<ServiceRegistry>,
    aggregator: Arc<HealthAggregator>,
}

impl MonitorSystem {
    /// Build the monitor with the reqwest transport
    pub fn bootstrap(config: MonitorConfig) -> MonitorResult<Self> {
        config.ensure_runnable()?;
        let transport = HttpTransport::from_config(&config.probe)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build the monitor over any transport
    ///
    /// Fails when the probe timeout or poll interval is zero.
    pub fn with_transport(
        config: MonitorConfig,
        transport: Arc<dyn ProbeTransport>,
    ) -> MonitorResult<Self> {
        config.ensure_runnable()?;
        let registry = Arc::new(ServiceRegistry::from_config(&config));
        let prober = HealthProber::from_config(Arc::clone(&transport), &config.probe);

        let mut aggregator = HealthAggregator::new(Arc::clone(&registry), prober);
        if config.poller.collect_metrics {
            if let Some(prometheus) = registry.find_kind(ServiceKind::Prometheus) {
                aggregator = aggregator.with_up_query(UpQuery::new(
                    transport,
                    prometheus,
                    config.probe.timeout(),
                ));
            }
        }

        info!(
            services = registry.len(),
            transport = aggregator.prober().transport().transport_name(),
            interval_ms = config.poller.interval_ms,
            "Monitor system bootstrapped"
        );

        Ok(Self {
            config,
            registry,
            aggregator: Arc::new(aggregator),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn aggregator(&self) -> &Arc<HealthAggregator> {
        &self.aggregator
    }

    /// Start the recurring schedule at the configured interval
    pub fn start_polling(&self) -> PollerHandle {
        self.aggregator.start(self.config.poller.interval())
    }

    /// Grafana and Prometheus front ends, in registry order
    pub fn dashboard_links(&self) -> Vec<DashboardLink> {
        self.registry
            .iter()
            .filter(|d| matches!(d.kind(), ServiceKind::Grafana | ServiceKind::Prometheus))
            .map(|d| DashboardLink {
                name: d.name().to_string(),
                url: d.base_url().to_string(),
            })
            .collect()
    }
}
