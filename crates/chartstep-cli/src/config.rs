//! Step configuration
//!
//! Settings come from an optional YAML file and are overlaid by command-line
//! flags and `CHARTSTEP_*` environment variables:
//!
//! ```yaml
//! chartPath: charts/orders
//! helmCommand: upgrade
//! namespace: shop
//! helmValues:
//!   - charts/orders/values-prod.yaml
//! ```

use chartstep_core::DEFAULT_CPE_DIR;
use chartstep_deploy::{
    DEFAULT_WAIT_SECONDS, DependencyMode, Invocation, Operation, OperationRequest,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// Default root of the pipeline environment
pub const DEFAULT_ENV_ROOT: &str = ".pipeline";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepConfig {
    pub chart_path: Option<PathBuf>,
    pub helm_command: Option<String>,
    pub dependency: Option<String>,
    pub publish: bool,
    pub publish_version: Option<String>,
    pub deployment_name: Option<String>,
    pub namespace: String,
    pub kube_context: Option<String>,
    pub helm_values: Vec<PathBuf>,
    pub helm_deploy_wait_seconds: u64,
    pub app_version: Option<String>,
    pub target_repository_url: Option<String>,
    pub target_repository_name: Option<String>,
    pub filter_test: Option<String>,
    pub dump_logs: bool,
    pub package_dependency_update: bool,
    pub image: Option<String>,
    pub env_root_path: PathBuf,
    pub strict_render: bool,
    pub helm_binary: String,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            chart_path: None,
            helm_command: None,
            dependency: None,
            publish: false,
            publish_version: None,
            deployment_name: None,
            namespace: "default".to_string(),
            kube_context: None,
            helm_values: Vec::new(),
            helm_deploy_wait_seconds: DEFAULT_WAIT_SECONDS,
            app_version: None,
            target_repository_url: None,
            target_repository_name: None,
            filter_test: None,
            dump_logs: false,
            package_dependency_update: false,
            image: None,
            env_root_path: PathBuf::from(DEFAULT_ENV_ROOT),
            strict_render: false,
            helm_binary: "helm".to_string(),
        }
    }
}

/// Flags overriding the configuration file
#[derive(Debug, Clone, Default, Args)]
pub struct StepArgs {
    /// Step configuration file (YAML)
    #[arg(short, long, env = "CHARTSTEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chart directory
    #[arg(long, env = "CHARTSTEP_CHART_PATH")]
    pub chart_path: Option<PathBuf>,

    /// Operation to run (install, upgrade, lint, test, uninstall, dependency, publish); empty runs the default chain
    #[arg(long, env = "CHARTSTEP_HELM_COMMAND")]
    pub helm_command: Option<String>,

    /// Dependency mode (build, update, list); enables the dependency stage
    #[arg(long, env = "CHARTSTEP_DEPENDENCY")]
    pub dependency: Option<String>,

    /// Publish the chart after the default chain
    #[arg(long, env = "CHARTSTEP_PUBLISH")]
    pub publish: bool,

    /// Version to publish instead of the chart version
    #[arg(long, env = "CHARTSTEP_PUBLISH_VERSION")]
    pub publish_version: Option<String>,

    /// Release name instead of the chart name
    #[arg(long, env = "CHARTSTEP_DEPLOYMENT_NAME")]
    pub deployment_name: Option<String>,

    /// Target namespace
    #[arg(short, long, env = "CHARTSTEP_NAMESPACE")]
    pub namespace: Option<String>,

    #[arg(long, env = "CHARTSTEP_KUBE_CONTEXT")]
    pub kube_context: Option<String>,

    /// Values file(s) to render after the chart's values.yaml
    #[arg(short = 'f', long = "helm-values")]
    pub helm_values: Vec<PathBuf>,

    /// Seconds to wait for install, upgrade and uninstall
    #[arg(long, env = "CHARTSTEP_HELM_DEPLOY_WAIT_SECONDS")]
    pub helm_deploy_wait_seconds: Option<u64>,

    #[arg(long, env = "CHARTSTEP_APP_VERSION")]
    pub app_version: Option<String>,

    #[arg(long, env = "CHARTSTEP_TARGET_REPOSITORY_URL")]
    pub target_repository_url: Option<String>,

    #[arg(long, env = "CHARTSTEP_TARGET_REPOSITORY_NAME")]
    pub target_repository_name: Option<String>,

    /// Only run tests with this name
    #[arg(long, env = "CHARTSTEP_FILTER_TEST")]
    pub filter_test: Option<String>,

    /// Print test pod logs
    #[arg(long, env = "CHARTSTEP_DUMP_LOGS")]
    pub dump_logs: bool,

    /// Update dependencies while packaging
    #[arg(long, env = "CHARTSTEP_PACKAGE_DEPENDENCY_UPDATE")]
    pub package_dependency_update: bool,

    /// Image the step runs in (recorded in telemetry)
    #[arg(long, env = "CHARTSTEP_IMAGE")]
    pub image: Option<String>,

    /// Root of the pipeline environment
    #[arg(long, env = "CHARTSTEP_ENV_ROOT_PATH")]
    pub env_root_path: Option<PathBuf>,

    /// Fail before dispatch when any values file fails to render
    #[arg(long, env = "CHARTSTEP_STRICT_RENDER")]
    pub strict_render: bool,

    #[arg(long, env = "CHARTSTEP_HELM_BINARY")]
    pub helm_binary: Option<String>,
}

impl StepConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load the configuration file named by `args` and apply the overrides
    pub fn resolve(args: &StepArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    CliError::config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        config.overlay(args);
        Ok(config)
    }

    /// Apply flags that were given; unset flags keep the file's value
    pub fn overlay(&mut self, args: &StepArgs) {
        fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        set(&mut self.chart_path, &args.chart_path);
        set(&mut self.helm_command, &args.helm_command);
        set(&mut self.dependency, &args.dependency);
        set(&mut self.publish_version, &args.publish_version);
        set(&mut self.deployment_name, &args.deployment_name);
        set(&mut self.kube_context, &args.kube_context);
        set(&mut self.app_version, &args.app_version);
        set(&mut self.target_repository_url, &args.target_repository_url);
        set(&mut self.target_repository_name, &args.target_repository_name);
        set(&mut self.filter_test, &args.filter_test);
        set(&mut self.image, &args.image);

        if let Some(namespace) = &args.namespace {
            self.namespace = namespace.clone();
        }
        if !args.helm_values.is_empty() {
            self.helm_values = args.helm_values.clone();
        }
        if let Some(seconds) = args.helm_deploy_wait_seconds {
            self.helm_deploy_wait_seconds = seconds;
        }
        if let Some(root) = &args.env_root_path {
            self.env_root_path = root.clone();
        }
        if let Some(binary) = &args.helm_binary {
            self.helm_binary = binary.clone();
        }

        self.publish |= args.publish;
        self.dump_logs |= args.dump_logs;
        self.package_dependency_update |= args.package_dependency_update;
        self.strict_render |= args.strict_render;
    }

    pub fn chart_path(&self) -> Result<&Path> {
        self.chart_path.as_deref().ok_or_else(|| {
            CliError::config_with_help(
                "chartPath is not set",
                "set chartPath in the configuration file or pass --chart-path",
            )
        })
    }

    /// Directory holding the Common Pipeline Environment
    pub fn cpe_root(&self) -> PathBuf {
        self.env_root_path.join(DEFAULT_CPE_DIR)
    }

    /// The operation selection described by this configuration
    pub fn operation_request(&self) -> Result<OperationRequest> {
        let operation = match &self.helm_command {
            Some(command) => Operation::parse_selector(command)?,
            None => None,
        };
        let dependency = self
            .dependency
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(str::parse::<DependencyMode>)
            .transpose()?;

        Ok(OperationRequest {
            operation,
            dependency,
            publish: self.publish,
            publish_version: self.publish_version.clone().filter(|v| !v.is_empty()),
            release_name: self.deployment_name.clone().filter(|n| !n.is_empty()),
        })
    }

    /// Settings shared by every operation
    pub fn base_invocation(&self, values_files: Vec<PathBuf>) -> Result<Invocation> {
        let mut invocation = Invocation::new(self.chart_path()?)
            .with_namespace(self.namespace.clone())
            .with_values_files(values_files);
        invocation.kube_context = self.kube_context.clone();
        invocation.wait_seconds = self.helm_deploy_wait_seconds;
        invocation.app_version = self.app_version.clone();
        invocation.target_repository_url = self.target_repository_url.clone();
        invocation.target_repository_name = self.target_repository_name.clone();
        invocation.filter_test = self.filter_test.clone();
        invocation.dump_logs = self.dump_logs;
        invocation.package_dependency_update = self.package_dependency_update;
        Ok(invocation)
    }

    /// Names of the settings that differ from their defaults
    pub fn configured_keys(&self) -> Result<Vec<String>> {
        let current = serde_json::to_value(self)?;
        let defaults = serde_json::to_value(Self::default())?;

        let keys = match (current, defaults) {
            (serde_json::Value::Object(current), serde_json::Value::Object(defaults)) => current
                .into_iter()
                .filter(|(key, value)| defaults.get(key) != Some(value))
                .map(|(key, _)| key)
                .collect(),
            _ => Vec::new(),
        };
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StepConfig::from_yaml("").unwrap();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.helm_deploy_wait_seconds, 300);
        assert_eq!(
            config.cpe_root(),
            PathBuf::from(".pipeline/commonPipelineEnvironment")
        );
        assert!(config.chart_path().is_err());
    }

    #[test]
    fn test_from_yaml_camel_case() {
        let config = StepConfig::from_yaml(
            r#"
chartPath: charts/orders
helmCommand: upgrade
dependency: update
publish: true
publishVersion: 2.0.0
helmValues:
  - charts/orders/values-prod.yaml
helmDeployWaitSeconds: 600
"#,
        )
        .unwrap();

        assert_eq!(config.chart_path().unwrap(), Path::new("charts/orders"));
        assert_eq!(config.helm_values.len(), 1);
        assert_eq!(config.helm_deploy_wait_seconds, 600);

        let request = config.operation_request().unwrap();
        assert_eq!(request.operation, Some(Operation::Upgrade));
        assert_eq!(request.dependency, Some(DependencyMode::Update));
        assert!(request.publish);
        assert_eq!(request.publish_version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_overlay_flags_win() {
        let mut config =
            StepConfig::from_yaml("chartPath: charts/a\nnamespace: staging\npublish: true\n")
                .unwrap();
        let args = StepArgs {
            chart_path: Some(PathBuf::from("charts/b")),
            helm_values: vec![PathBuf::from("extra.yaml")],
            ..Default::default()
        };

        config.overlay(&args);

        assert_eq!(config.chart_path, Some(PathBuf::from("charts/b")));
        assert_eq!(config.namespace, "staging");
        assert!(config.publish);
        assert_eq!(config.helm_values, vec![PathBuf::from("extra.yaml")]);
    }

    #[test]
    fn test_empty_helm_command_is_default_chain() {
        let config = StepConfig::from_yaml("helmCommand: ''\n").unwrap();
        assert_eq!(config.operation_request().unwrap().operation, None);
    }

    #[test]
    fn test_unknown_helm_command() {
        let config = StepConfig::from_yaml("helmCommand: instal\n").unwrap();
        let err = config.operation_request().unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_configured_keys() {
        let config = StepConfig::from_yaml("chartPath: chart\nnamespace: shop\n").unwrap();
        let mut keys = config.configured_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["chartPath", "namespace"]);
    }

    #[test]
    fn test_base_invocation() {
        let config =
            StepConfig::from_yaml("chartPath: chart\nkubeContext: prod\ndumpLogs: true\n").unwrap();
        let invocation = config
            .base_invocation(vec![PathBuf::from("chart/values.yaml")])
            .unwrap();

        assert_eq!(invocation.chart_path, PathBuf::from("chart"));
        assert_eq!(invocation.kube_context.as_deref(), Some("prod"));
        assert!(invocation.dump_logs);
        assert_eq!(invocation.release_name, None);
    }
}
