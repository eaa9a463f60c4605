//! Executor running the helm binary

use async_trait::async_trait;
use chartstep_core::ChartDescriptor;
use chartstep_deploy::{ExecResult, Executor, ExecutorError, Invocation, Operation};
use console::style;
use std::path::Path;
use tokio::process::Command;

/// Runs operations as `helm` subprocesses
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
    dry_run: bool,
}

impl HelmCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            dry_run: false,
        }
    }

    /// Print commands instead of running them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn run(&self, operation: Operation, invocation: &Invocation) -> ExecResult {
        for args in commands_for(operation, invocation)? {
            self.spawn(&args).await?;
        }
        Ok(())
    }

    async fn spawn(&self, args: &[String]) -> ExecResult {
        let command = format!("{} {}", self.binary, args.join(" "));

        if self.dry_run {
            println!("{} {}", style("→").blue(), command);
            return Ok(());
        }

        tracing::debug!("executing {}", command);
        let status = Command::new(&self.binary)
            .args(args)
            .status()
            .await
            .map_err(|source| ExecutorError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecutorError::Failed {
                command,
                status: status.to_string(),
            })
        }
    }
}

/// The helm argument lists for one operation, in execution order
pub fn commands_for(
    operation: Operation,
    invocation: &Invocation,
) -> Result<Vec<Vec<String>>, ExecutorError> {
    let chart = invocation.chart_path.display().to_string();

    let commands = match operation {
        Operation::Lint => {
            let mut args = vec!["lint".to_string(), chart];
            push_values(&mut args, invocation);
            vec![args]
        }
        Operation::Install => {
            let name = invocation.require_release_name()?;
            let mut args = vec!["install".to_string(), name.to_string(), chart];
            push_release_flags(&mut args, invocation);
            push_values(&mut args, invocation);
            push_wait(&mut args, invocation);
            vec![args]
        }
        Operation::Upgrade => {
            let name = invocation.require_release_name()?;
            let mut args = vec![
                "upgrade".to_string(),
                name.to_string(),
                chart,
                "--install".to_string(),
            ];
            push_release_flags(&mut args, invocation);
            push_values(&mut args, invocation);
            push_wait(&mut args, invocation);
            args.push("--atomic".to_string());
            vec![args]
        }
        Operation::Test => {
            let name = invocation.require_release_name()?;
            let mut args = vec!["test".to_string(), name.to_string()];
            push_release_flags(&mut args, invocation);
            if let Some(filter) = &invocation.filter_test {
                args.push("--filter".to_string());
                args.push(format!("name={}", filter));
            }
            if invocation.dump_logs {
                args.push("--logs".to_string());
            }
            vec![args]
        }
        Operation::Uninstall => {
            let name = invocation.require_release_name()?;
            let mut args = vec!["uninstall".to_string(), name.to_string()];
            push_release_flags(&mut args, invocation);
            push_wait(&mut args, invocation);
            vec![args]
        }
        Operation::Dependency => {
            let mode = invocation
                .dependency
                .ok_or(ExecutorError::Missing("dependency mode"))?;
            vec![vec!["dependency".to_string(), mode.to_string(), chart]]
        }
        Operation::Publish => publish_commands(invocation)?,
    };

    Ok(commands)
}

fn publish_commands(invocation: &Invocation) -> Result<Vec<Vec<String>>, ExecutorError> {
    let version = invocation.require_publish_version()?;
    let chart_path = &invocation.chart_path;
    let destination = chart_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut package = vec![
        "package".to_string(),
        chart_path.display().to_string(),
        "--version".to_string(),
        version.to_string(),
        "--destination".to_string(),
        destination.display().to_string(),
    ];
    if let Some(app_version) = &invocation.app_version {
        package.push("--app-version".to_string());
        package.push(app_version.clone());
    }
    if invocation.package_dependency_update {
        package.push("--dependency-update".to_string());
    }

    let mut commands = vec![package];

    if let Some(url) = &invocation.target_repository_url {
        let descriptor = ChartDescriptor::load(chart_path)
            .map_err(|e| ExecutorError::Other(e.to_string()))?;
        let chart_name = descriptor
            .name
            .ok_or(ExecutorError::Missing("chart name"))?;
        let archive = destination.join(format!("{}-{}.tgz", chart_name, version));

        let target = match &invocation.target_repository_name {
            Some(repository) => format!("{}/{}", url.trim_end_matches('/'), repository),
            None => url.clone(),
        };
        commands.push(vec![
            "push".to_string(),
            archive.display().to_string(),
            target,
        ]);
    } else {
        tracing::warn!("no target repository URL configured, chart is packaged but not pushed");
    }

    Ok(commands)
}

fn push_values(args: &mut Vec<String>, invocation: &Invocation) {
    for file in &invocation.values_files {
        args.push("--values".to_string());
        args.push(file.display().to_string());
    }
}

fn push_release_flags(args: &mut Vec<String>, invocation: &Invocation) {
    args.push("--namespace".to_string());
    args.push(invocation.namespace.clone());
    if let Some(context) = &invocation.kube_context {
        args.push("--kube-context".to_string());
        args.push(context.clone());
    }
}

fn push_wait(args: &mut Vec<String>, invocation: &Invocation) {
    args.push("--wait".to_string());
    args.push("--timeout".to_string());
    args.push(format!("{}s", invocation.wait_seconds));
}

#[async_trait]
impl Executor for HelmCli {
    async fn lint(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Lint, invocation).await
    }

    async fn install(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Install, invocation).await
    }

    async fn upgrade(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Upgrade, invocation).await
    }

    async fn test(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Test, invocation).await
    }

    async fn uninstall(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Uninstall, invocation).await
    }

    async fn dependency(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Dependency, invocation).await
    }

    async fn publish(&self, invocation: &Invocation) -> ExecResult {
        self.run(Operation::Publish, invocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartstep_deploy::DependencyMode;
    use std::path::PathBuf;

    fn invocation() -> Invocation {
        let mut invocation = Invocation::new("charts/orders")
            .with_namespace("shop")
            .with_values_files(vec![
                PathBuf::from("charts/orders/values.yaml"),
                PathBuf::from("prod.yaml"),
            ]);
        invocation.release_name = Some("orders".to_string());
        invocation
    }

    fn joined(operation: Operation, invocation: &Invocation) -> Vec<String> {
        commands_for(operation, invocation)
            .unwrap()
            .into_iter()
            .map(|args| args.join(" "))
            .collect()
    }

    #[test]
    fn test_lint_command() {
        assert_eq!(
            joined(Operation::Lint, &invocation()),
            vec!["lint charts/orders --values charts/orders/values.yaml --values prod.yaml"]
        );
    }

    #[test]
    fn test_upgrade_command() {
        let mut invocation = invocation();
        invocation.kube_context = Some("prod".to_string());
        invocation.wait_seconds = 120;

        insta::assert_snapshot!(
            joined(Operation::Upgrade, &invocation).join("\n"),
            @"upgrade orders charts/orders --install --namespace shop --kube-context prod --values charts/orders/values.yaml --values prod.yaml --wait --timeout 120s --atomic"
        );
    }

    #[test]
    fn test_test_command_filters() {
        let mut invocation = invocation();
        invocation.filter_test = Some("smoke".to_string());
        invocation.dump_logs = true;

        assert_eq!(
            joined(Operation::Test, &invocation),
            vec!["test orders --namespace shop --filter name=smoke --logs"]
        );
    }

    #[test]
    fn test_release_name_required() {
        let mut invocation = invocation();
        invocation.release_name = None;

        let err = commands_for(Operation::Uninstall, &invocation).unwrap_err();
        assert!(matches!(err, ExecutorError::Missing("release name")));
    }

    #[test]
    fn test_dependency_command() {
        let mut invocation = invocation();
        invocation.dependency = Some(DependencyMode::Build);

        assert_eq!(
            joined(Operation::Dependency, &invocation),
            vec!["dependency build charts/orders"]
        );
    }

    #[test]
    fn test_publish_without_repository_only_packages() {
        let mut invocation = invocation();
        invocation.publish_version = Some("1.4.2".to_string());
        invocation.app_version = Some("2024.1".to_string());

        assert_eq!(
            joined(Operation::Publish, &invocation),
            vec!["package charts/orders --version 1.4.2 --destination charts --app-version 2024.1"]
        );
    }

    #[test]
    fn test_publish_pushes_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let chart = dir.path().join("orders");
        std::fs::create_dir(&chart).unwrap();
        std::fs::write(chart.join("Chart.yaml"), "name: orders\nversion: 1.0.0\n").unwrap();

        let mut invocation = Invocation::new(&chart);
        invocation.publish_version = Some("1.4.2".to_string());
        invocation.target_repository_url = Some("oci://registry.example.com/".to_string());
        invocation.target_repository_name = Some("charts".to_string());

        let commands = commands_for(Operation::Publish, &invocation).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[1],
            vec![
                "push".to_string(),
                dir.path().join("orders-1.4.2.tgz").display().to_string(),
                "oci://registry.example.com/charts".to_string(),
            ]
        );
    }
}
