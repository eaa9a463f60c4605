//! The seam between dispatch and the deployment tool

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::ExecutorError;
use crate::operation::DependencyMode;

/// Result type for executor calls
pub type ExecResult = std::result::Result<(), ExecutorError>;

/// Default time to wait for a deployment, in seconds
pub const DEFAULT_WAIT_SECONDS: u64 = 300;

/// Everything an executor needs for one operation
///
/// The dispatcher fills `release_name` only for operations that address a
/// release and `publish_version` only for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub chart_path: PathBuf,

    /// Release to install, upgrade, test or uninstall
    pub release_name: Option<String>,

    pub namespace: String,

    /// Rendered values files, later ones overriding earlier ones
    pub values_files: Vec<PathBuf>,

    pub kube_context: Option<String>,

    /// How long install, upgrade and uninstall wait for resources
    pub wait_seconds: u64,

    pub dependency: Option<DependencyMode>,

    /// Chart version to package
    pub publish_version: Option<String>,

    /// Application version to stamp into the packaged chart
    pub app_version: Option<String>,

    pub target_repository_url: Option<String>,
    pub target_repository_name: Option<String>,

    /// Only run tests matching this name
    pub filter_test: Option<String>,

    /// Print test pod logs
    pub dump_logs: bool,

    /// Update dependencies while packaging
    pub package_dependency_update: bool,
}

impl Invocation {
    pub fn new(chart_path: impl Into<PathBuf>) -> Self {
        Self {
            chart_path: chart_path.into(),
            release_name: None,
            namespace: "default".to_string(),
            values_files: Vec::new(),
            kube_context: None,
            wait_seconds: DEFAULT_WAIT_SECONDS,
            dependency: None,
            publish_version: None,
            app_version: None,
            target_repository_url: None,
            target_repository_name: None,
            filter_test: None,
            dump_logs: false,
            package_dependency_update: false,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_values_files(mut self, files: Vec<PathBuf>) -> Self {
        self.values_files = files;
        self
    }

    /// The release name, or `ExecutorError::Missing`
    pub fn require_release_name(&self) -> Result<&str, ExecutorError> {
        self.release_name
            .as_deref()
            .ok_or(ExecutorError::Missing("release name"))
    }

    /// The publish version, or `ExecutorError::Missing`
    pub fn require_publish_version(&self) -> Result<&str, ExecutorError> {
        self.publish_version
            .as_deref()
            .ok_or(ExecutorError::Missing("publish version"))
    }
}

/// Performs deployment operations against the outside world
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Check the chart for problems
    async fn lint(&self, invocation: &Invocation) -> ExecResult;

    /// Install a new release
    async fn install(&self, invocation: &Invocation) -> ExecResult;

    /// Upgrade a release, installing it when absent
    async fn upgrade(&self, invocation: &Invocation) -> ExecResult;

    /// Run the release's tests
    async fn test(&self, invocation: &Invocation) -> ExecResult;

    /// Remove a release
    async fn uninstall(&self, invocation: &Invocation) -> ExecResult;

    /// Resolve chart dependencies with `invocation.dependency`
    async fn dependency(&self, invocation: &Invocation) -> ExecResult;

    /// Package the chart at `invocation.publish_version` and upload it
    async fn publish(&self, invocation: &Invocation) -> ExecResult;
}
