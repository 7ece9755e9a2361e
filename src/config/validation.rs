//! Configuration validation.
//!
//! Serde handles syntax; this pass checks values and cross-references and
//! returns every problem it finds, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.downstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.downstream_secs", "must be > 0"));
    }
    if config.health.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("health.probe_timeout_ms", "must be > 0"));
    }

    let mut seen = HashSet::new();
    for (i, downstream) in config.downstreams.iter().enumerate() {
        let field = format!("downstreams[{}]", i);

        if downstream.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if !seen.insert(downstream.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate downstream '{}'", downstream.name),
            ));
        }

        match Url::parse(&downstream.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => errors.push(ValidationError::new(
                format!("{field}.base_url"),
                format!("'{}' is not an http(s) URL", downstream.base_url),
            )),
        }

        if !downstream.health_path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{field}.health_path"),
                "must start with '/'",
            ));
        }
    }

    for prefix in &config.observability.excluded_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "observability.excluded_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
