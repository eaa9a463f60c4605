//! chartstep Deploy - deployment operation dispatch
//!
//! This crate provides:
//! - **Operations**: the fixed set of deployment actions and their selectors
//! - **Plans**: one explicit operation, or the default lint/dependency/publish chain
//! - **Executor**: the async seam to the deployment tool
//! - **Dispatcher**: runs a plan, filling release name and publish version lazily
//! - **RecordingExecutor**: in-memory executor for tests

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod mock;
pub mod operation;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{DeployError, ExecutorError, Result};
pub use executor::{DEFAULT_WAIT_SECONDS, ExecResult, Executor, Invocation};
pub use mock::{RecordedCall, RecordingExecutor};
pub use operation::{DependencyMode, Operation, OperationRequest, Plan, default_chain};
