//! Logging setup shared by EventFlow binaries and tests.

use serde::Deserialize;
use tracing::warn;

pub mod logging;

pub use logging::{init_logging, LogExt};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log level filter (e.g., "info,eventflow_core=debug"); `RUST_LOG` takes precedence
    pub log_filter: String,
    /// JSON lines instead of pretty output
    pub enable_json_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "eventflow".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
        }
    }
}

impl MonitoringConfig {
    /// Defaults overridden by `EVENTFLOW_SERVICE_NAME`, `EVENTFLOW_LOG_FILTER` and
    /// `EVENTFLOW_LOG_JSON`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(name) = lookup("EVENTFLOW_SERVICE_NAME").filter(|v| !v.trim().is_empty()) {
            config.service_name = name;
        }
        if let Some(filter) = lookup("EVENTFLOW_LOG_FILTER").filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }
        if let Some(json) = lookup("EVENTFLOW_LOG_JSON") {
            match json.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.enable_json_logging = true,
                "0" | "false" | "no" => config.enable_json_logging = false,
                other => warn!("Invalid EVENTFLOW_LOG_JSON value: {}", other),
            }
        }
        config
    }
}
