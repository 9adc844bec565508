//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, windows > 0)
//! - Validate addresses and path prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{AppConfig, CacheDriver};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("`{}` is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be > 0"));
    }

    for (i, rule) in config.routing.strip_prefixes.iter().enumerate() {
        let prefix = rule.prefix.trim_end_matches('/');
        if !prefix.starts_with('/') || prefix.len() < 2 {
            errors.push(ValidationError::new(
                &format!("routing.strip_prefixes[{}]", i),
                format!("`{}` must be a non-root path starting with '/'", rule.prefix),
            ));
        }
    }

    if config.throttle.enabled {
        if config.throttle.window_secs == 0 {
            errors.push(ValidationError::new("throttle.window_secs", "must be > 0"));
        }
        if config.throttle.max_requests == 0 {
            errors.push(ValidationError::new("throttle.max_requests", "must be > 0"));
        }
    }

    if config.cache.driver == CacheDriver::File && config.cache.dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("cache.dir", "required for the file driver"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PrefixRule;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.server.bind_address = "nowhere".into();
        config.server.request_timeout_secs = 0;
        config.routing.strip_prefixes.push(PrefixRule {
            prefix: "public".into(),
            warn: false,
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            ["server.bind_address", "server.request_timeout_secs", "routing.strip_prefixes[2]"]
        );
    }

    #[test]
    fn test_throttle_only_checked_when_enabled() {
        let mut config = AppConfig::default();
        config.throttle.window_secs = 0;
        assert!(validate_config(&config).is_ok());

        config.throttle.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
