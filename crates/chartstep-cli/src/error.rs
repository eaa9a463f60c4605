//! CLI error types with exit code handling
//!
//! This module provides a unified error type for the step that maps every
//! failure class to an exit code.

use chartstep_core::CoreError;
use chartstep_deploy::DeployError;
use chartstep_engine::EngineError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid configuration (unknown operation, missing values file, ...)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(chartstep::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Values files failed to render
    #[error("Template error: {message}")]
    #[diagnostic(code(chartstep::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart descriptor missing or incomplete
    #[error("Chart error: {message}")]
    #[diagnostic(code(chartstep::cli::chart))]
    Chart { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartstep::cli::io))]
    Io { message: String },

    /// A helm operation or chain stage failed
    #[error("{message}")]
    #[diagnostic(code(chartstep::cli::operation))]
    Operation { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(chartstep::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Chart { .. } => exit_codes::CHART_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Operation { .. } => exit_codes::OPERATION_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::NoValuesFile { .. } => CliError::config_with_help(
                message,
                "add a values.yaml to the chart or list files under helmValues",
            ),
            CoreError::NotADirectory { .. } => CliError::config(message),
            CoreError::ReadFile { .. } | CoreError::WriteFile { .. } | CoreError::Walk { .. } => {
                CliError::Io { message }
            }
            CoreError::InvalidDescriptor { .. } | CoreError::YamlParse(_) => {
                CliError::Chart { message }
            }
            CoreError::Json(_) => CliError::Other { message },
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Parse(te) | EngineError::Execution(te) => CliError::Template {
                message: te.message,
                help: te.suggestion,
            },
            EngineError::Core(core) => core.into(),
        }
    }
}

impl From<DeployError> for CliError {
    fn from(err: DeployError) -> Self {
        let message = err.to_string();
        match err {
            DeployError::UnknownOperation { name, help } => CliError::config_with_help(
                format!("unknown helmCommand '{}'", name),
                help,
            ),
            DeployError::UnknownDependencyMode { .. } => CliError::config(message),
            DeployError::Coordinates { .. } => CliError::Chart { message },
            _ => CliError::Operation { message },
        }
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::config(format!("invalid step configuration: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other {
            message: err.to_string(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
