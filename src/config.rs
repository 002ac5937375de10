//! # Monitor Configuration
//!
//! Layered configuration for the health monitor. Precedence, lowest to highest:
//!
//! 1. Built-in defaults (local development ports)
//! 2. Optional TOML file (`./chaos-monitor.toml` or `./config/chaos-monitor.toml`,
//!    or an explicit path)
//! 3. `CHAOS_MONITOR_*` environment variables, `__` separating nested keys
//! 4. The dashboard deployment variables (`NEXT_PUBLIC_*_URL`)
//!
//! Missing values are never an error; they resolve to defaults.
//!
//! ```rust,no_run
//! use chaos_monitor::config::MonitorConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::load()?;
//! println!("Probe timeout: {}ms", config.probe.timeout_ms);
//! for endpoint in config.services.endpoints() {
//!     println!("{} -> {}", endpoint.name, endpoint.base_url);
//! }
//! # Ok(())
//! # }
//! ```

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{config_files, defaults, env_vars, timing, USER_AGENT_PREFIX};
use crate::error::{MonitorError, MonitorResult};
use crate::prober::ProbeMode;
use crate::registry::ServiceKind;

/// Root configuration for the monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Health probe behaviour
    pub probe: ProbeConfig,
    /// Poll scheduling
    pub poller: PollerConfig,
    /// Monitored services
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Client-side timeout for a single probe
    pub timeout_ms: u64,
    /// How a completed request is interpreted
    pub mode: ProbeMode,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: timing::DEFAULT_PROBE_TIMEOUT_MS,
            mode: ProbeMode::default(),
            user_agent: format!("{}/{}", USER_AGENT_PREFIX, env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Interval between automatic poll cycles
    pub interval_ms: u64,
    /// Query Prometheus for a target summary alongside each cycle
    pub collect_metrics: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: timing::DEFAULT_POLL_INTERVAL_MS,
            collect_metrics: true,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// A single monitored service as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub kind: ServiceKind,
    /// Overrides the health path implied by `kind`
    #[serde(default)]
    pub health_path: Option<String>,
    /// Full health check URL; takes precedence over `base_url` + path
    #[serde(default)]
    pub health_url: Option<String>,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            kind,
            health_path: None,
            health_url: None,
        }
    }
}

/// The dashboard's known services, in display order, plus any extras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub api_gateway: ServiceEndpoint,
    pub chaos_backend: ServiceEndpoint,
    pub cms_service: ServiceEndpoint,
    pub prometheus: ServiceEndpoint,
    pub grafana: ServiceEndpoint,
    pub extra: Vec<ServiceEndpoint>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            api_gateway: ServiceEndpoint::new(
                defaults::API_GATEWAY_NAME,
                defaults::API_GATEWAY_URL,
                ServiceKind::Generic,
            ),
            chaos_backend: ServiceEndpoint::new(
                defaults::CHAOS_BACKEND_NAME,
                defaults::CHAOS_BACKEND_URL,
                ServiceKind::Generic,
            ),
            cms_service: ServiceEndpoint::new(
                defaults::CMS_SERVICE_NAME,
                defaults::CMS_SERVICE_URL,
                ServiceKind::Generic,
            ),
            prometheus: ServiceEndpoint::new(
                defaults::PROMETHEUS_NAME,
                defaults::PROMETHEUS_URL,
                ServiceKind::Prometheus,
            ),
            grafana: ServiceEndpoint::new(
                defaults::GRAFANA_NAME,
                defaults::GRAFANA_URL,
                ServiceKind::Grafana,
            ),
            extra: Vec::new(),
        }
    }
}

impl ServicesConfig {
    /// All endpoints in registry order
    pub fn endpoints(&self) -> Vec<&ServiceEndpoint> {
        self.labelled().into_iter().map(|(_, e)| e).collect()
    }

    /// Endpoints paired with the config key they were read from
    fn labelled(&self) -> Vec<(String, &ServiceEndpoint)> {
        let mut endpoints = vec![
            ("services.api_gateway".to_string(), &self.api_gateway),
            ("services.chaos_backend".to_string(), &self.chaos_backend),
            ("services.cms_service".to_string(), &self.cms_service),
            ("services.prometheus".to_string(), &self.prometheus),
            ("services.grafana".to_string(), &self.grafana),
        ];
        endpoints.extend(
            self.extra
                .iter()
                .enumerate()
                .map(|(i, e)| (format!("services.extra[{i}]"), e)),
        );
        endpoints
    }
}

impl MonitorConfig {
    /// Load configuration from the default file locations and process environment
    pub fn load() -> MonitorResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file (or discover one) and the process environment
    pub fn load_from(path: Option<&Path>) -> MonitorResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Load configuration with an explicit environment map instead of the process environment
    ///
    /// Passing `None` for `env` reads the real process environment.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<&HashMap<String, String>>,
    ) -> MonitorResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                debug!("Loading monitor config from: {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                if let Some(found) = Self::find_config_file() {
                    debug!("Loading monitor config from: {}", found.display());
                    builder =
                        builder.add_source(File::from(found.as_path()).format(FileFormat::Toml));
                }
            }
        }

        let mut environment = Environment::with_prefix(env_vars::MONITOR_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        if let Some(env) = env {
            environment = environment.source(Some(
                env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ));
        }
        builder = builder.add_source(environment);

        for (variable, key) in env_vars::DASHBOARD_OVERRIDES
            .into_iter()
            .chain(env_vars::HEALTH_URL_OVERRIDES)
        {
            builder = builder.set_override_option(key, lookup(env, variable))?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        debug!(
            services = config.services.endpoints().len(),
            timeout_ms = config.probe.timeout_ms,
            interval_ms = config.poller.interval_ms,
            "Loaded monitor configuration"
        );
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        config_files::CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// Reject values the scheduler and prober cannot run with
    pub fn ensure_runnable(&self) -> MonitorResult<()> {
        if self.probe.timeout_ms == 0 {
            return Err(MonitorError::configuration(ZERO_TIMEOUT));
        }
        if self.poller.interval_ms == 0 {
            return Err(MonitorError::configuration(ZERO_INTERVAL));
        }
        Ok(())
    }

    /// Check the configuration against the process environment
    pub fn validate(&self) -> ValidationReport {
        self.validate_with_env(None)
    }

    /// Check the configuration, reporting unset dashboard variables from `env`
    /// (or the process environment when `None`)
    pub fn validate_with_env(&self, env: Option<&HashMap<String, String>>) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut seen = HashSet::new();
        for (label, endpoint) in self.services.labelled() {
            if !is_http_url(&endpoint.base_url) {
                report.errors.push(
                    MonitorError::invalid_url(format!("{label}.base_url"), &endpoint.base_url)
                        .to_string(),
                );
            }
            if let Some(health_url) = &endpoint.health_url {
                if !is_http_url(health_url) {
                    report.errors.push(
                        MonitorError::invalid_url(format!("{label}.health_url"), health_url)
                            .to_string(),
                    );
                }
            }
            if !seen.insert(endpoint.name.as_str()) {
                report
                    .errors
                    .push(MonitorError::DuplicateService(endpoint.name.clone()).to_string());
            }
        }

        if self.probe.timeout_ms == 0 {
            report
                .errors
                .push(ZERO_TIMEOUT.to_string());
        }
        if self.poller.interval_ms == 0 {
            report
                .errors
                .push(ZERO_INTERVAL.to_string());
        } else if self.poller.interval_ms <= self.probe.timeout_ms {
            report.warnings.push(format!(
                "poller.interval_ms ({}) is not longer than probe.timeout_ms ({}); ticks that land on an in-flight cycle are skipped",
                self.poller.interval_ms, self.probe.timeout_ms
            ));
        }

        for (variable, _) in env_vars::DASHBOARD_OVERRIDES {
            if lookup(env, variable).is_none() {
                report
                    .warnings
                    .push(format!("{variable} is not set (using default)"));
            }
        }

        report
    }
}

const ZERO_TIMEOUT: &str = "probe.timeout_ms must be greater than zero";
const ZERO_INTERVAL: &str = "poller.interval_ms must be greater than zero";

fn lookup(env: Option<&HashMap<String, String>>, variable: &str) -> Option<String> {
    match env {
        Some(env) => env.get(variable).cloned(),
        None => std::env::var(variable).ok(),
    }
    .filter(|value| !value.trim().is_empty())
}

/// True for absolute `http://` or `https://` URLs with a host
pub fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Outcome of [`MonitorConfig::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
