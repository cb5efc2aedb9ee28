//! Error types for pack configuration.

use core::error::Error;
use std::path::PathBuf;

use derive_more::Display;
use error_stack::Report;

/// Result type for single-file pack operations.
pub type PackResult<T> = Result<T, Report<PackError>>;

/// Errors raised while reading, transforming or writing one pack file.
#[derive(Debug, Display)]
pub enum PackError {
    #[display("Failed to read {path:?}")]
    Read { path: PathBuf },

    #[display("Failed to write {path:?}")]
    Write { path: PathBuf },

    #[display("Failed to parse {path:?}")]
    Parse { path: PathBuf },

    #[display("Failed to serialize {path:?}")]
    Serialize { path: PathBuf },

    /// A pack parameter looked like a list or mapping literal but did not parse.
    #[display("Can't parse value: {value}")]
    ValueParse { value: String },

    #[display("Value of {key} is not an integer: {value}")]
    InvalidCount { key: String, value: String },

    #[display("Environment variable is not in KEY=VALUE form: {variable}")]
    InvalidEnvVariable { variable: String },

    /// A mapping was required at `path` but another kind of value was found.
    #[display("Unexpected document shape at {path}")]
    UnexpectedShape { path: String },

    #[display("Failed to resolve the current cluster namespace")]
    Namespace,
}

impl Error for PackError {}

/// The rewrite step that was running when a configuration update failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UpdateStep {
    #[display("values.yaml")]
    Values,
    #[display("Dockerfile")]
    Dockerfile,
    #[display("draft.toml")]
    Draft,
}

/// Caller-visible failure of [`crate::PackConfigurator::update_configuration`].
///
/// The originating [`PackError`] stays in the report chain.
#[derive(Debug, Display)]
pub enum ConfigurationError {
    #[display("Configuration has not been updated ({step} step failed)")]
    NotUpdated { step: UpdateStep },
}

impl ConfigurationError {
    pub fn step(&self) -> UpdateStep {
        match self {
            ConfigurationError::NotUpdated { step } => *step,
        }
    }
}

impl Error for ConfigurationError {}
