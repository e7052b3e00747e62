//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a dispatch
//! client. All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a service client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// Logical service and method being called.
    pub service: ServiceConfig,

    /// Where instances of the service come from.
    pub discovery: DiscoveryConfig,

    /// Per-endpoint circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Retry budget for one logical call.
    pub retries: RetryConfig,

    /// Endpoint selection policy.
    pub balancer: BalancerConfig,

    /// Bundled HTTP transport settings.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identifies the logical operation a client dispatches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Logical service name (used in spans and metric labels).
    pub name: String,

    /// Operation name recorded on every endpoint span.
    pub operation: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            operation: "call".to_string(),
        }
    }
}

/// Discovery source configuration.
///
/// `instances` seeds a fixed list; `watch_file` takes precedence and follows
/// a file with one instance address per line.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Static instance addresses (e.g. "http://10.0.0.5:8080").
    pub instances: Vec<String>,

    /// Optional instance file to watch for membership changes.
    pub watch_file: Option<PathBuf>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// The breaker trips once consecutive failures exceed this count.
    pub failure_threshold: u32,

    /// Length of the rolling counting window while closed, in seconds.
    pub interval_secs: u64,

    /// Time spent open before trial calls are admitted, in seconds.
    pub cooldown_secs: u64,

    /// Maximum trial calls admitted while half-open.
    pub max_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            interval_secs: 10,
            cooldown_secs: 10,
            max_requests: 5,
        }
    }
}

impl BreakerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per logical call.
    pub max_attempts: u32,

    /// Deadline for the whole logical call in milliseconds.
    pub overall_timeout_ms: u64,

    /// Optional deadline for a single attempt in milliseconds.
    /// When unset, attempts are only bounded by the overall deadline.
    pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            overall_timeout_ms: 5_000,
            attempt_timeout_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

/// Load balancing policy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalancerStrategy {
    #[default]
    Random,
    RoundRobin,
}

/// Balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Selection policy.
    pub strategy: BalancerStrategy,

    /// Fixed seed for the random policy; seeded from entropy when unset.
    pub seed: Option<u64>,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Path appended to the instance base URL for every call.
    pub path: String,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            connect_timeout_ms: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
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
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
