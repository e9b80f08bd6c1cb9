//! CLI error types with miette diagnostics.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use p2pd_config::ConfigError;
use p2pd_core::{StatusCode, StatusError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const OPERATION: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration")]
    #[diagnostic(
        code(p2pd::config),
        help("Check {path}, or print the resolved values with: p2pd config show")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(p2pd::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Scenarios ────────────────────────────────────────────────────
    #[error("Could not read scenario {}: {reason}", .path.display())]
    #[diagnostic(
        code(p2pd::scenario),
        help("Scenarios are YAML or JSON documents with a top-level `steps` list.")
    )]
    Scenario { path: PathBuf, reason: String },

    #[error("Step {step} ({kind}): {reason}")]
    #[diagnostic(code(p2pd::step))]
    Step {
        step: usize,
        kind: &'static str,
        reason: String,
    },

    #[error("{failed} step(s) did not match their expected status")]
    #[diagnostic(
        code(p2pd::expectation),
        help("Re-run without --strict to see every outcome.")
    )]
    Expectation { failed: usize },

    // ── Operations ───────────────────────────────────────────────────
    #[error("Operation failed with {code}")]
    #[diagnostic(code(p2pd::operation))]
    Operation {
        code: StatusCode,
        #[source]
        source: StatusError,
    },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<StatusError> for CliError {
    fn from(err: StatusError) -> Self {
        Self::Operation {
            code: err.code(),
            source: err,
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::ConfigExists { .. } => exit_code::CONFIG,
            Self::Scenario { .. } | Self::Step { .. } => exit_code::USAGE,
            Self::Operation { .. } | Self::Expectation { .. } => exit_code::OPERATION,
            Self::Io(_) => exit_code::GENERAL,
        }
    }

    pub fn config(path: &std::path::Path, source: ConfigError) -> Self {
        Self::Config {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_their_code() {
        let err = CliError::from(StatusError::args("bad ssid"));
        assert!(matches!(
            err,
            CliError::Operation {
                code: StatusCode::FailureArgsInvalid,
                ..
            }
        ));
        assert_eq!(err.exit_code(), exit_code::OPERATION);
    }

    #[test]
    fn config_errors_exit_with_config_code() {
        let err = CliError::config(
            std::path::Path::new("/tmp/p2pd.toml"),
            ConfigError::Validation {
                field: "p2p.join_limit".into(),
                reason: "expected 1..=10, got 0".into(),
            },
        );
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }
}
