//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and address formats
//! - Check marker headers are usable header names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, Uri};
use thiserror::Error;

use crate::config::schema::AppConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if let Some(upstream) = &config.server.upstream {
        match upstream.parse::<Uri>() {
            Ok(uri) if uri.scheme_str() == Some("http") && uri.authority().is_some() => {}
            _ => errors.push(ValidationError::new(
                "server.upstream",
                format!("'{}' is not an http:// URL", upstream),
            )),
        }
    }

    let skip = HeaderName::from_bytes(config.gate.skip_header.as_bytes());
    let background = HeaderName::from_bytes(config.gate.background_header.as_bytes());
    if skip.is_err() {
        errors.push(ValidationError::new("gate.skip_header", "invalid header name"));
    }
    if background.is_err() {
        errors.push(ValidationError::new("gate.background_header", "invalid header name"));
    }
    if let (Ok(skip), Ok(background)) = (skip, background) {
        if skip == background {
            errors.push(ValidationError::new(
                "gate.background_header",
                "must differ from gate.skip_header",
            ));
        }
    }
    for path in &config.gate.quiet_paths {
        if path.trim().is_empty() || path.trim_end_matches('/').is_empty() {
            errors.push(ValidationError::new(
                "gate.quiet_paths",
                format!("'{}' would match every request", path),
            ));
        }
    }

    if matches!(config.control.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
        errors.push(ValidationError::new("control.api_key", "must not be empty when set"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
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

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = AppConfig::default();
        config.server.bind_address = "nowhere".into();
        config.server.request_timeout_secs = 0;
        config.server.upstream = Some("ftp://data".into());
        config.gate.skip_header = "bad header".into();
        config.gate.quiet_paths.push("/".into());
        config.control.api_key = Some("  ".into());
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "server.request_timeout_secs",
                "server.upstream",
                "gate.skip_header",
                "gate.quiet_paths",
                "control.api_key",
                "observability.log_level",
            ]
        );
    }

    #[test]
    fn marker_headers_must_differ() {
        let mut config = AppConfig::default();
        config.gate.background_header = "X-Skip-Busy".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "gate.background_header");
    }
}
