//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and transport limits.
    pub server: ServerConfig,

    /// Application behaviour (debug mode, slow request threshold).
    pub app: AppSettings,

    /// Dispatcher settings.
    pub routing: RoutingConfig,

    /// Production error templates.
    pub error_pages: ErrorPagesConfig,

    /// Cache driver selection.
    pub cache: CacheConfig,

    /// Request throttling.
    pub throttle: ThrottleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Application-defined tables, reachable through `ConfigStore`.
    #[serde(flatten)]
    pub extra: toml::Table,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// Name reported in logs and the `X-Powered-By` header.
    pub name: String,

    /// Debug mode: detailed error pages and `Server-Timing`.
    pub debug: bool,

    /// Requests slower than this are logged as a warning.
    pub slow_request_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "Nova".to_string(),
            debug: false,
            slow_request_ms: 50,
        }
    }
}

/// A leading path segment removed before matching.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PrefixRule {
    pub prefix: String,

    /// Log a warning whenever the prefix is seen.
    #[serde(default)]
    pub warn: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Enable the `/{module}/{controller}/{action}` fallback route.
    pub default_route: bool,

    /// Front-controller prefixes stripped from request paths.
    pub strip_prefixes: Vec<PrefixRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_route: false,
            strip_prefixes: vec![
                PrefixRule {
                    prefix: "/public".to_string(),
                    warn: true,
                },
                PrefixRule {
                    prefix: "/index.php".to_string(),
                    warn: false,
                },
            ],
        }
    }
}

/// Optional HTML files used for 404/500 pages outside debug mode.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ErrorPagesConfig {
    pub not_found: Option<PathBuf>,
    pub server_error: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheDriver {
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub driver: CacheDriver,

    /// Directory for the file driver.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            driver: CacheDriver::Memory,
            dir: PathBuf::from("runtime/cache"),
        }
    }
}

/// Fixed-window throttling per client address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ThrottleConfig {
    pub enabled: bool,

    /// Requests allowed per window.
    pub max_requests: u64,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_requests: 120,
            window_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
