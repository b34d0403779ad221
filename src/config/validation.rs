//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("workers.count must be at least 1")]
    NoWorkers,
    #[error("workers.channel_capacity must be at least 1")]
    ZeroChannelCapacity,
    #[error("connection.read_timeout_secs must be at least 1")]
    ZeroReadTimeout,
    #[error("servers[{0}].name is required")]
    MissingServerName(usize),
    #[error("server name '{0}' is used more than once")]
    DuplicateServerName(String),
    #[error("server name '{0}' must not be all digits (it would be read as a connection id)")]
    NumericServerName(String),
    #[error("server '{0}' has no host")]
    MissingHost(String),
    #[error("server '{0}' has port 0")]
    InvalidPort(String),
    #[error("{field} for '{server}' must be a single non-empty word, got '{value}'")]
    InvalidWord {
        server: String,
        field: &'static str,
        value: String,
    },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.workers.count == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.workers.channel_capacity == 0 {
        errors.push(ValidationError::ZeroChannelCapacity);
    }
    if config.connection.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroReadTimeout);
    }

    let mut seen = HashSet::new();
    for (index, server) in config.servers.iter().enumerate() {
        if server.name.is_empty() {
            errors.push(ValidationError::MissingServerName(index));
        } else if !seen.insert(server.name.as_str()) {
            errors.push(ValidationError::DuplicateServerName(server.name.clone()));
        }
        if !server.name.is_empty() && server.name.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(ValidationError::NumericServerName(server.name.clone()));
        }
        if server.host.is_empty() {
            errors.push(ValidationError::MissingHost(server.name.clone()));
        }
        if server.port == 0 {
            errors.push(ValidationError::InvalidPort(server.name.clone()));
        }

        // Registration lines are space-delimited
        let identity = config.identity_for(server);
        for (field, value) in [("nick", &identity.nick), ("username", &identity.username)] {
            if value.is_empty() || value.contains(char::is_whitespace) {
                errors.push(ValidationError::InvalidWord {
                    server: server.name.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
