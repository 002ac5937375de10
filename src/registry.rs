//! # Service Registry
//!
//! Ordered, immutable set of services to probe. Built once at startup from
//! configuration; there is no dynamic registration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::config::{is_http_url, MonitorConfig, ServiceEndpoint};
use crate::constants::health_paths;
use crate::error::{MonitorError, MonitorResult};

/// Service family, which decides the health path convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    #[default]
    Generic,
    Prometheus,
    Grafana,
}

impl ServiceKind {
    /// Health path used when the endpoint does not override it
    pub fn default_health_path(&self) -> &'static str {
        match self {
            ServiceKind::Generic => health_paths::DEFAULT,
            ServiceKind::Prometheus => health_paths::PROMETHEUS,
            ServiceKind::Grafana => health_paths::GRAFANA,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Generic => "generic",
            ServiceKind::Prometheus => "prometheus",
            ServiceKind::Grafana => "grafana",
        }
    }
}

/// One probe target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    name: String,
    base_url: String,
    health_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    health_url: Option<String>,
    kind: ServiceKind,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            health_path: kind.default_health_path().to_string(),
            health_url: None,
            kind,
        }
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.health_path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Probe this exact URL instead of joining `base_url` and the health path
    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    pub fn health_url(&self) -> Option<&str> {
        self.health_url.as_deref()
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// The health URL override if set, else `base_url + health_path`
    /// without doubling the slash between them
    pub fn probe_url(&self) -> String {
        match &self.health_url {
            Some(url) => url.clone(),
            None => join_url(&self.base_url, &self.health_path),
        }
    }
}

impl From<&ServiceEndpoint> for ServiceDescriptor {
    fn from(endpoint: &ServiceEndpoint) -> Self {
        let mut descriptor =
            ServiceDescriptor::new(&endpoint.name, &endpoint.base_url, endpoint.kind);
        if let Some(path) = &endpoint.health_path {
            descriptor = descriptor.with_health_path(path.clone());
        }
        if let Some(url) = &endpoint.health_url {
            descriptor = descriptor.with_health_url(url.clone());
        }
        descriptor
    }
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRegistry {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Build a registry from explicit descriptors
    ///
    /// Rejects duplicate names, and base or health URLs that are not absolute
    /// http(s) URLs.
    pub fn new(descriptors: Vec<ServiceDescriptor>) -> MonitorResult<Self> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name()) {
                return Err(MonitorError::DuplicateService(descriptor.name().to_string()));
            }
            if !is_http_url(descriptor.base_url()) {
                return Err(MonitorError::invalid_url(
                    descriptor.name(),
                    descriptor.base_url(),
                ));
            }
            if let Some(url) = descriptor.health_url() {
                if !is_http_url(url) {
                    return Err(MonitorError::invalid_url(descriptor.name(), url));
                }
            }
        }
        Ok(Self { descriptors })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the registry from configuration. Never fails: a repeated name
    /// keeps its first occurrence.
    pub fn from_config(config: &MonitorConfig) -> Self {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();

        for endpoint in config.services.endpoints() {
            if !seen.insert(endpoint.name.clone()) {
                warn!(
                    service = %endpoint.name,
                    base_url = %endpoint.base_url,
                    "Ignoring duplicate service name in configuration"
                );
                continue;
            }
            descriptors.push(ServiceDescriptor::from(endpoint));
        }

        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// First service of the given kind
    pub fn find_kind(&self, kind: ServiceKind) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().find(|d| d.kind() == kind)
    }
}

impl<'a> IntoIterator for &'a ServiceRegistry {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
