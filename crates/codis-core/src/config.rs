//! Exporter configuration file parser.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::NAMESPACE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no codis endpoints configured")]
    NoEndpoints,
    #[error("namespace must not be empty")]
    EmptyNamespace,
    #[error("metrics path must start with '/' and not be the root: {0}")]
    InvalidMetricsPath(String),
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Codis dashboard URIs, polled in order on every pass.
    pub endpoints: Vec<String>,
    pub namespace: String,
    pub listen_address: SocketAddr,
    pub metrics_path: String,
    /// Per-request timeout, e.g. "10s" or "500ms".
    pub request_timeout: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            namespace: NAMESPACE.to_string(),
            listen_address: SocketAddr::from(([0, 0, 0, 0], 9199)),
            metrics_path: "/metrics".to_string(),
            request_timeout: "10s".to_string(),
        }
    }
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExporterConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check the invariants the collector and server rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::NoEndpoints);
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if !self.metrics_path.starts_with('/') || self.metrics_path == "/" {
            return Err(ConfigError::InvalidMetricsPath(self.metrics_path.clone()));
        }
        self.request_timeout()?;
        Ok(())
    }

    /// The per-request timeout. Zero is rejected, it would fail every fetch.
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.request_timeout)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidDuration(self.request_timeout.clone()))
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
