//! Parser options validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check capability dependencies (GRE and checksums need tunnel options)
//! - Validate symbolic fwmark names and values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ParserOptions → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::ParserOptions;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A single semantic problem in the options file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("capability `{capability}` requires `tunnel_encap`")]
    MissingTunnelEncap { capability: &'static str },

    #[error("fwmark name must not be empty")]
    EmptyFwmarkName,

    #[error("fwmark name `{0}` is numeric and would shadow a literal mark")]
    NumericFwmarkName(String),

    #[error("fwmark `{0}` must be non-zero")]
    ZeroFwmark(String),

    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),
}

/// Validate parser options, collecting every error.
pub fn validate_options(options: &ParserOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let caps = &options.capabilities;

    if !caps.tunnel_encap {
        if caps.tunnel_gre {
            errors.push(ValidationError::MissingTunnelEncap { capability: "tunnel_gre" });
        }
        if caps.tunnel_checksum {
            errors.push(ValidationError::MissingTunnelEncap { capability: "tunnel_checksum" });
        }
    }

    for (name, mark) in &options.fwmarks {
        if name.is_empty() {
            errors.push(ValidationError::EmptyFwmarkName);
        } else if name.chars().all(|c| c.is_ascii_digit()) {
            errors.push(ValidationError::NumericFwmarkName(name.clone()));
        }
        if *mark == 0 {
            errors.push(ValidationError::ZeroFwmark(name.clone()));
        }
    }

    let level = options.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(options.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
