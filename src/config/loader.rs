//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.app.slow_request_ms, 50);
        assert_eq!(config.routing.strip_prefixes.len(), 2);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            [app]
            debug = true

            [routing]
            default_route = true
            strip_prefixes = [{ prefix = "/web" }]

            [mail]
            from = "noreply@example.com"
            "#,
        )
        .unwrap();

        assert!(config.app.debug);
        assert_eq!(config.app.name, "Nova");
        assert!(config.routing.default_route);
        assert_eq!(config.routing.strip_prefixes[0].prefix, "/web");
        assert!(!config.routing.strip_prefixes[0].warn);
        assert!(config.extra.contains_key("mail"));
    }

    #[test]
    fn test_validation_errors_surface() {
        let err = parse_config("[throttle]\nenabled = true\nwindow_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("window_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_address = \"127.0.0.1:9000\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");

        assert!(matches!(
            load_config(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_bundled_sample_config() {
        let config = parse_config(include_str!("../../config/nova.toml")).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.routing.strip_prefixes.len(), 2);
        assert!(config.extra.contains_key("site"));
    }
}
