//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::dispatch::DispatchError;
use crate::config::schema::ParserOptions;
use crate::config::validation::{validate_options, ValidationError};
use crate::parser::{ParseOutcome, Parser};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("keyword table: {0}")]
    Dispatch(#[from] DispatchError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and validate parser options from a TOML file.
pub fn load_options(path: &Path) -> Result<ParserOptions, ConfigError> {
    let content = read(path)?;
    let options: ParserOptions = toml::from_str(&content)?;

    validate_options(&options).map_err(ConfigError::Validation)?;

    Ok(options)
}

/// Parse topology text with the given options.
pub fn parse_str(text: &str, options: &ParserOptions) -> Result<ParseOutcome, ConfigError> {
    let parser = Parser::new(options.clone())?;
    Ok(parser.parse_str(text))
}

/// Read and parse a topology file.
pub fn parse_file(path: &Path, options: &ParserOptions) -> Result<ParseOutcome, ConfigError> {
    let content = read(path)?;
    let outcome = parse_str(&content, options)?;

    info!(
        path = %path.display(),
        virtual_servers = outcome.topology.virtual_servers.len(),
        groups = outcome.topology.groups.len(),
        diagnostics = outcome.diagnostics.len(),
        "Topology loaded"
    );

    Ok(outcome)
}
