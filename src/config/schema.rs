//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the zipper.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::TransportConfig;

/// Root configuration for the zipper.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ZipperConfig {
    /// Front end bind address (e.g., "0.0.0.0:8080").
    pub listen: String,

    /// Ordinary backend addresses. A bare `host:port` gets `http://`.
    pub backends: Vec<String>,

    /// Simultaneous in-flight requests per backend (0 = unlimited).
    pub concurrency_limit: usize,

    /// Idle pooled connections kept per backend.
    pub max_idle_conns_per_host: usize,

    /// TCP keep-alive interval in seconds.
    pub keep_alive_interval_secs: u64,

    /// Lifetime of a cache entry in seconds.
    pub expire_delay_secs: u64,

    /// Background cache sweep interval in seconds (0 = lazy expiry only).
    pub cache_sweep_interval_secs: u64,

    /// Number of exponential latency buckets.
    pub buckets: usize,

    /// Pickled find listings use the graphite 0.9 field names.
    pub graphite09_compat: bool,

    pub timeouts: TimeoutConfig,

    pub carbonsearch: CarbonSearchConfig,

    pub observability: ObservabilityConfig,
}

impl Default for ZipperConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            backends: Vec::new(),
            concurrency_limit: 0,
            max_idle_conns_per_host: 100,
            keep_alive_interval_secs: 30,
            expire_delay_secs: 600,
            cache_sweep_interval_secs: 0,
            buckets: 10,
            graphite09_compat: false,
            timeouts: TimeoutConfig::default(),
            carbonsearch: CarbonSearchConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ZipperConfig {
    /// Transport settings shared by every backend client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            max_idle_conns_per_host: self.max_idle_conns_per_host,
            keep_alive: Duration::from_secs(self.keep_alive_interval_secs),
            connect_timeout: Duration::from_millis(self.timeouts.connect_ms),
            concurrency_limit: self.concurrency_limit,
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_interval_secs > 0).then(|| Duration::from_secs(self.cache_sweep_interval_secs))
    }
}

/// Tiered timeout configuration, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard deadline for a whole logical call.
    pub global_ms: u64,

    /// Grace window after the first successful backend reply.
    pub after_started_ms: u64,

    /// Connection establishment per backend attempt.
    pub connect_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            global_ms: 10_000,
            after_started_ms: 2_000,
            connect_ms: 200,
        }
    }
}

/// Prefix-routed search backend. Both fields set or both empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CarbonSearchConfig {
    pub prefix: String,
    pub backend: String,
}

impl CarbonSearchConfig {
    pub fn is_enabled(&self) -> bool {
        !self.prefix.is_empty() && !self.backend.is_empty()
    }

    /// Exactly one of the two fields is set.
    pub fn is_partial(&self) -> bool {
        self.prefix.is_empty() != self.backend.is_empty()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
