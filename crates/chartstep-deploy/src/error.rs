//! Error types for chartstep-deploy

use chartstep_core::CoreError;
use thiserror::Error;

use crate::operation::Operation;

/// Result type for dispatch
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors raised while selecting or running deployment operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeployError {
    /// An operation name that is not one of the known operations
    #[error("unknown operation '{name}': {help}")]
    UnknownOperation { name: String, help: String },

    /// A dependency mode that is not build, update or list
    #[error("unknown dependency mode '{name}', expected one of: build, update, list")]
    UnknownDependencyMode { name: String },

    /// The explicitly requested operation failed
    #[error("failed to execute helm {operation}: {source}")]
    Operation {
        operation: Operation,
        #[source]
        source: ExecutorError,
    },

    /// A stage of the default chain failed; later stages were not run
    #[error("default chain stopped at stage {} ({stage}): {source}", .index + 1)]
    Stage {
        stage: Operation,
        index: usize,
        #[source]
        source: ExecutorError,
    },

    /// Artifact coordinates were needed by `operation` but could not be resolved
    #[error("getting artifact information for helm {operation} failed: {source}")]
    Coordinates {
        operation: Operation,
        #[source]
        source: CoreError,
    },
}

impl DeployError {
    /// The operation that failed or could not be prepared
    pub fn operation(&self) -> Option<Operation> {
        match self {
            DeployError::Operation { operation, .. } => Some(*operation),
            DeployError::Stage { stage, .. } => Some(*stage),
            DeployError::Coordinates { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// Failure reported by an `Executor`
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// The tool could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and reported failure
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },

    /// An invocation lacked something the operation requires
    #[error("missing {0} for this operation")]
    Missing(&'static str),

    #[error("{0}")]
    Other(String),
}
