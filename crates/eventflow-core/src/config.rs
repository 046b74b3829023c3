//! Engine configuration
//!
//! Defaults can be overridden from environment variables, see [`EngineConfig::load`].

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Timeouts used by the flow executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dispatch timeout for tasks that do not declare one
    #[serde(default = "default_dispatch_timeout_ms")]
    pub default_dispatch_timeout_ms: u64,

    /// Instance time-to-live for flows that do not declare one
    #[serde(default = "default_flow_ttl_ms")]
    pub default_flow_ttl_ms: u64,

    /// Timeout for each monitor call
    #[serde(default = "default_monitor_timeout_ms")]
    pub monitor_timeout_ms: u64,
}

fn default_dispatch_timeout_ms() -> u64 {
    30_000
}

fn default_flow_ttl_ms() -> u64 {
    60_000
}

fn default_monitor_timeout_ms() -> u64 {
    5_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_dispatch_timeout_ms: default_dispatch_timeout_ms(),
            default_flow_ttl_ms: default_flow_ttl_ms(),
            monitor_timeout_ms: default_monitor_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_millis("EVENTFLOW_DISPATCH_TIMEOUT_MS") {
            config.default_dispatch_timeout_ms = ms;
        }
        if let Some(ms) = read_millis("EVENTFLOW_FLOW_TTL_MS") {
            config.default_flow_ttl_ms = ms;
        }
        if let Some(ms) = read_millis("EVENTFLOW_MONITOR_TIMEOUT_MS") {
            config.monitor_timeout_ms = ms;
        }

        info!(
            dispatch_timeout_ms = config.default_dispatch_timeout_ms,
            flow_ttl_ms = config.default_flow_ttl_ms,
            monitor_timeout_ms = config.monitor_timeout_ms,
            "Engine configuration loaded"
        );
        config
    }

    /// Default dispatch timeout
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.default_dispatch_timeout_ms)
    }

    /// Default instance time-to-live
    pub fn flow_ttl(&self) -> Duration {
        Duration::from_millis(self.default_flow_ttl_ms)
    }

    /// Monitor call timeout
    pub fn monitor_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_timeout_ms)
    }
}

fn read_millis(var: &str) -> Option<u64> {
    let raw = env::var(var).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(ms),
        _ => {
            warn!("Invalid {} value: {}", var, raw);
            None
        }
    }
}
