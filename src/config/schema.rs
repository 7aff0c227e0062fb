//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::gate::policy::{DEFAULT_BACKGROUND_HEADER, DEFAULT_SKIP_HEADER};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP surface settings.
    pub server: ServerConfig,

    /// Skip policy for the request gate.
    pub gate: GateConfig,

    /// Access control for mutating routes.
    pub control: ControlConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8787").
    pub bind_address: String,

    /// Data service that `/api/*` forwards to (e.g., "http://127.0.0.1:3000").
    pub upstream: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8787".to_string(),
            upstream: None,
            request_timeout_secs: 30,
        }
    }
}

/// Which operations the gate leaves uncounted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Header marking an operation as exempt.
    pub skip_header: String,

    /// Header marking an operation as a background refresh.
    pub background_header: String,

    /// Low-priority endpoints (health, liveness polling).
    pub quiet_paths: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            skip_header: DEFAULT_SKIP_HEADER.to_string(),
            background_header: DEFAULT_BACKGROUND_HEADER.to_string(),
            quiet_paths: ["/health", "/healthz", "/livez", "/readyz", "/ping"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Access control configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControlConfig {
    /// Bearer token required on mutating routes. Open when unset.
    pub api_key: Option<String>,
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
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
