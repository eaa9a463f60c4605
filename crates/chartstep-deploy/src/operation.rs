//! Deployment operations and how a request selects them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DeployError, Result};

/// One deployment action the executor can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Install,
    Upgrade,
    Lint,
    Test,
    Uninstall,
    #[serde(alias = "dependency-resolve")]
    Dependency,
    Publish,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Install,
        Operation::Upgrade,
        Operation::Lint,
        Operation::Test,
        Operation::Uninstall,
        Operation::Dependency,
        Operation::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Install => "install",
            Operation::Upgrade => "upgrade",
            Operation::Lint => "lint",
            Operation::Test => "test",
            Operation::Uninstall => "uninstall",
            Operation::Dependency => "dependency",
            Operation::Publish => "publish",
        }
    }

    /// Whether the operation addresses a named release
    pub fn needs_release_name(&self) -> bool {
        matches!(
            self,
            Operation::Install | Operation::Upgrade | Operation::Test | Operation::Uninstall
        )
    }

    /// Parse an operation selector; an empty selector means "no explicit operation"
    pub fn parse_selector(selector: &str) -> Result<Option<Operation>> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Ok(None);
        }
        selector.parse().map(Some)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "dependency-resolve" {
            return Ok(Operation::Dependency);
        }
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == lower)
            .ok_or_else(|| DeployError::UnknownOperation {
                name: s.to_string(),
                help: unknown_operation_help(&lower),
            })
    }
}

fn unknown_operation_help(name: &str) -> String {
    let closest = Operation::ALL
        .iter()
        .map(|op| (strsim::levenshtein(name, op.as_str()), op))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance);

    match closest {
        Some((_, op)) => format!("did you mean '{}'?", op),
        None => format!(
            "expected one of: {}",
            Operation::ALL.map(|op| op.as_str()).join(", ")
        ),
    }
}

/// How chart dependencies are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyMode {
    Build,
    Update,
    List,
}

impl DependencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyMode::Build => "build",
            DependencyMode::Update => "update",
            DependencyMode::List => "list",
        }
    }
}

impl fmt::Display for DependencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyMode {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build" => Ok(DependencyMode::Build),
            "update" => Ok(DependencyMode::Update),
            "list" => Ok(DependencyMode::List),
            _ => Err(DeployError::UnknownDependencyMode {
                name: s.to_string(),
            }),
        }
    }
}

/// Validated selection of what the step should do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationRequest {
    /// Explicit operation; `None` runs the default chain
    pub operation: Option<Operation>,

    /// Dependency resolution mode; its presence enables the dependency stage of the default chain
    pub dependency: Option<DependencyMode>,

    /// Publish the chart at the end of the default chain
    pub publish: bool,

    /// Version to publish instead of the artifact version
    pub publish_version: Option<String>,

    /// Release name instead of the artifact name
    pub release_name: Option<String>,
}

impl OperationRequest {
    /// Request for the default chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Request for exactly one operation
    pub fn single(operation: Operation) -> Self {
        Self {
            operation: Some(operation),
            ..Default::default()
        }
    }

    pub fn with_dependency(mut self, mode: DependencyMode) -> Self {
        self.dependency = Some(mode);
        self
    }

    pub fn with_publish(mut self) -> Self {
        self.publish = true;
        self
    }

    pub fn with_publish_version(mut self, version: impl Into<String>) -> Self {
        self.publish_version = Some(version.into());
        self
    }

    pub fn with_release_name(mut self, name: impl Into<String>) -> Self {
        self.release_name = Some(name.into());
        self
    }
}

/// What a request resolves to: one explicit operation, or the default chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Single(Operation),
    Chain(Vec<Operation>),
}

impl Plan {
    pub fn for_request(request: &OperationRequest) -> Self {
        match request.operation {
            Some(op) => Plan::Single(op),
            None => Plan::Chain(default_chain(request)),
        }
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[Operation] {
        match self {
            Plan::Single(op) => std::slice::from_ref(op),
            Plan::Chain(ops) => ops,
        }
    }

    pub fn is_chain(&self) -> bool {
        matches!(self, Plan::Chain(_))
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Single(op) => write!(f, "{}", op),
            Plan::Chain(ops) => {
                let names: Vec<&str> = ops.iter().map(Operation::as_str).collect();
                write!(f, "default chain: {}", names.join(" -> "))
            }
        }
    }
}

/// Stages run when no explicit operation is requested
///
/// Lint always runs first; dependency resolution follows when a dependency
/// mode is configured, publishing comes last when enabled.
pub fn default_chain(request: &OperationRequest) -> Vec<Operation> {
    let mut chain = vec![Operation::Lint];
    if request.dependency.is_some() {
        chain.push(Operation::Dependency);
    }
    if request.publish {
        chain.push(Operation::Publish);
    }
    chain
}
