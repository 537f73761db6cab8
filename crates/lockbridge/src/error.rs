//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use lockbridge_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const IO: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(lockbridge::config_invalid),
        help("Fix the value in the config file or the matching LOCKBRIDGE_* variable.")
    )]
    InvalidConfig { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(lockbridge::config),
        help("Inspect the file with: lockbridge config show")
    )]
    Config(ConfigError),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(lockbridge::config_exists),
        help("Re-run with --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lockbridge::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(lockbridge::io))]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(lockbridge::json))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::InvalidConfig { field, reason },
            other => Self::Config(other),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. } | Self::Config(_) | Self::ConfigExists { .. } => {
                exit_code::CONFIG
            }
            Self::Validation { .. } => exit_code::USAGE,
            Self::Io(_) => exit_code::IO,
            Self::Json(_) => exit_code::GENERAL,
        }
    }
}
