//! # System Constants
//!
//! Design values and defaults that bound the behaviour of the health poller.
//! Configuration can override most of these; the values here are what the
//! monitor falls back to when nothing is configured.

/// Probe and polling timing
pub mod timing {
    /// Client-side timeout applied to every health probe
    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

    /// Interval between automatic poll cycles
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
}

/// Health path conventions used by the per-kind override table
pub mod health_paths {
    pub const DEFAULT: &str = "/health";
    pub const PROMETHEUS: &str = "/-/healthy";
    pub const GRAFANA: &str = "/api/health";

    /// Instant query used for the Prometheus target summary
    pub const PROMETHEUS_UP_QUERY: &str = "/api/v1/query?query=up";
}

/// Default service endpoints (local development ports)
pub mod defaults {
    pub const API_GATEWAY_NAME: &str = "API Gateway";
    pub const API_GATEWAY_URL: &str = "http://localhost:8080";

    pub const CHAOS_BACKEND_NAME: &str = "Chaos Backend";
    pub const CHAOS_BACKEND_URL: &str = "http://localhost:8081";

    pub const CMS_SERVICE_NAME: &str = "CMS Service";
    pub const CMS_SERVICE_URL: &str = "http://localhost:8083";

    pub const PROMETHEUS_NAME: &str = "Prometheus";
    pub const PROMETHEUS_URL: &str = "http://localhost:9091";

    pub const GRAFANA_NAME: &str = "Grafana";
    pub const GRAFANA_URL: &str = "http://localhost:3001";
}

/// Deployment variables shared with the web dashboard
pub mod env_vars {
    pub const API_GATEWAY_URL: &str = "NEXT_PUBLIC_API_GATEWAY_URL";
    pub const CHAOS_BACKEND_URL: &str = "NEXT_PUBLIC_CHAOS_BACKEND_URL";
    pub const CMS_SERVICE_URL: &str = "NEXT_PUBLIC_API_URL";
    pub const PROMETHEUS_URL: &str = "NEXT_PUBLIC_PROMETHEUS_URL";
    pub const GRAFANA_URL: &str = "NEXT_PUBLIC_GRAFANA_URL";

    pub const API_GATEWAY_HEALTH_URL: &str = "NEXT_PUBLIC_API_GATEWAY_HEALTH_URL";
    pub const CHAOS_BACKEND_HEALTH_URL: &str = "NEXT_PUBLIC_CHAOS_BACKEND_HEALTH_URL";
    pub const CMS_SERVICE_HEALTH_URL: &str = "NEXT_PUBLIC_CMS_SERVICE_HEALTH_URL";
    pub const PROMETHEUS_HEALTH_URL: &str = "NEXT_PUBLIC_PROMETHEUS_HEALTH_URL";
    pub const GRAFANA_HEALTH_URL: &str = "NEXT_PUBLIC_GRAFANA_HEALTH_URL";

    /// Prefix for monitor-specific overrides, e.g. `CHAOS_MONITOR_PROBE__TIMEOUT_MS`
    pub const MONITOR_PREFIX: &str = "CHAOS_MONITOR";

    /// All dashboard variables paired with the config key they override
    pub const DASHBOARD_OVERRIDES: [(&str, &str); 5] = [
        (API_GATEWAY_URL, "services.api_gateway.base_url"),
        (CHAOS_BACKEND_URL, "services.chaos_backend.base_url"),
        (CMS_SERVICE_URL, "services.cms_service.base_url"),
        (PROMETHEUS_URL, "services.prometheus.base_url"),
        (GRAFANA_URL, "services.grafana.base_url"),
    ];

    /// Full health URL variables; optional, so unset ones are not reported
    pub const HEALTH_URL_OVERRIDES: [(&str, &str); 5] = [
        (API_GATEWAY_HEALTH_URL, "services.api_gateway.health_url"),
        (CHAOS_BACKEND_HEALTH_URL, "services.chaos_backend.health_url"),
        (CMS_SERVICE_HEALTH_URL, "services.cms_service.health_url"),
        (PROMETHEUS_HEALTH_URL, "services.prometheus.health_url"),
        (GRAFANA_HEALTH_URL, "services.grafana.health_url"),
    ];
}

/// Configuration file discovery
pub mod config_files {
    pub const CANDIDATES: [&str; 2] = ["./chaos-monitor.toml", "./config/chaos-monitor.toml"];
}

pub const USER_AGENT_PREFIX: &str = "chaos-monitor";
