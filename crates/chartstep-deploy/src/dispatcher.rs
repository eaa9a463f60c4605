//! Runs a request's plan through an executor
//!
//! A request either names one operation, which runs alone, or leaves the
//! choice to the default chain (lint, then dependency resolution, then
//! publishing). The first failure ends the run; stages that already
//! succeeded are not reverted.

use chartstep_core::{ArtifactCoordinates, CoordinateOracle};
use once_cell::sync::OnceCell;

use crate::error::{DeployError, ExecutorError, Result};
use crate::executor::{Executor, Invocation};
use crate::operation::{Operation, OperationRequest, Plan};

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub plan: Plan,

    /// Operations executed, in order
    pub executed: Vec<Operation>,

    /// Release name used, if any operation needed one
    pub release_name: Option<String>,

    /// Version published, if publishing ran
    pub publish_version: Option<String>,
}

/// Dispatches operations to an executor
///
/// Artifact coordinates are only requested from the oracle when a stage
/// needs a default it cannot take from the request, and at most once.
pub struct Dispatcher<'a> {
    executor: &'a dyn Executor,
    oracle: &'a dyn CoordinateOracle,
    base: Invocation,
    coordinates: OnceCell<ArtifactCoordinates>,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher; `base` carries settings shared by every operation
    pub fn new(
        executor: &'a dyn Executor,
        oracle: &'a dyn CoordinateOracle,
        base: Invocation,
    ) -> Self {
        Self {
            executor,
            oracle,
            base,
            coordinates: OnceCell::new(),
        }
    }

    /// Run the plan for `request`
    pub async fn run(&self, request: &OperationRequest) -> Result<DispatchOutcome> {
        let plan = Plan::for_request(request);
        tracing::info!("dispatching {}", plan);

        let mut outcome = DispatchOutcome {
            plan: plan.clone(),
            executed: Vec::new(),
            release_name: None,
            publish_version: None,
        };

        match &plan {
            Plan::Single(operation) => {
                let invocation = self.invocation_for(*operation, request)?;
                self.execute(*operation, &invocation)
                    .await
                    .map_err(|source| DeployError::Operation {
                        operation: *operation,
                        source,
                    })?;
                outcome.record(*operation, &invocation);
            }
            Plan::Chain(stages) => {
                for (index, stage) in stages.iter().enumerate() {
                    let invocation = self.invocation_for(*stage, request)?;
                    self.execute(*stage, &invocation)
                        .await
                        .map_err(|source| DeployError::Stage {
                            stage: *stage,
                            index,
                            source,
                        })?;
                    outcome.record(*stage, &invocation);
                }
            }
        }

        Ok(outcome)
    }

    /// Artifact coordinates, resolved on first use
    pub fn coordinates(&self) -> chartstep_core::Result<&ArtifactCoordinates> {
        self.coordinates.get_or_try_init(|| {
            let coordinates = self.oracle.coordinates()?;
            tracing::debug!("artifact coordinates: {}", coordinates);
            Ok(coordinates)
        })
    }

    fn coordinates_for(&self, operation: Operation) -> Result<&ArtifactCoordinates> {
        self.coordinates()
            .map_err(|source| DeployError::Coordinates { operation, source })
    }

    fn invocation_for(
        &self,
        operation: Operation,
        request: &OperationRequest,
    ) -> Result<Invocation> {
        let mut invocation = self.base.clone();

        if operation.needs_release_name() {
            let name = match &request.release_name {
                Some(name) => name.clone(),
                None => self.coordinates_for(operation)?.name.clone(),
            };
            invocation.release_name = Some(name);
        }

        if operation == Operation::Dependency && request.dependency.is_some() {
            invocation.dependency = request.dependency;
        }

        if operation == Operation::Publish {
            let version = match &request.publish_version {
                Some(version) => version.clone(),
                None => self.coordinates_for(operation)?.version.clone(),
            };
            invocation.publish_version = Some(version);
        }

        Ok(invocation)
    }

    async fn execute(
        &self,
        operation: Operation,
        invocation: &Invocation,
    ) -> std::result::Result<(), ExecutorError> {
        tracing::info!(operation = %operation, "running helm {}", operation);

        let result = match operation {
            Operation::Install => self.executor.install(invocation).await,
            Operation::Upgrade => self.executor.upgrade(invocation).await,
            Operation::Lint => self.executor.lint(invocation).await,
            Operation::Test => self.executor.test(invocation).await,
            Operation::Uninstall => self.executor.uninstall(invocation).await,
            Operation::Dependency => self.executor.dependency(invocation).await,
            Operation::Publish => self.executor.publish(invocation).await,
        };

        if let Err(e) = &result {
            tracing::error!(operation = %operation, "helm {} failed: {}", operation, e);
        }
        result
    }
}

impl DispatchOutcome {
    fn record(&mut self, operation: Operation, invocation: &Invocation) {
        self.executed.push(operation);
        if invocation.release_name.is_some() {
            self.release_name = invocation.release_name.clone();
        }
        if operation == Operation::Publish {
            self.publish_version = invocation.publish_version.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingExecutor;
    use crate::operation::DependencyMode;
    use chartstep_core::{CoreError, StaticOracle};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOracle {
        calls: AtomicUsize,
    }

    impl CountingOracle {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CoordinateOracle for CountingOracle {
        fn coordinates(&self) -> chartstep_core::Result<ArtifactCoordinates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(coords())
        }
    }

    struct FailingOracle;

    impl CoordinateOracle for FailingOracle {
        fn coordinates(&self) -> chartstep_core::Result<ArtifactCoordinates> {
            Err(CoreError::InvalidDescriptor {
                path: PathBuf::from("chart/Chart.yaml"),
                message: "missing `version`".to_string(),
            })
        }
    }

    fn coords() -> ArtifactCoordinates {
        ArtifactCoordinates {
            name: "orders".to_string(),
            group: String::new(),
            version: "1.4.2".to_string(),
            packaging: "tgz".to_string(),
        }
    }

    fn base() -> Invocation {
        Invocation::new("chart")
            .with_namespace("shop")
            .with_values_files(vec![PathBuf::from("chart/values.yaml")])
    }

    #[tokio::test]
    async fn test_default_chain_order() {
        let executor = RecordingExecutor::new();
        let oracle = StaticOracle(coords());
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let request = OperationRequest::new()
            .with_dependency(DependencyMode::Update)
            .with_publish();
        let outcome = dispatcher.run(&request).await.unwrap();

        let expected = vec![Operation::Lint, Operation::Dependency, Operation::Publish];
        assert_eq!(executor.operations(), expected);
        assert_eq!(outcome.executed, expected);
        assert!(outcome.plan.is_chain());

        let dependency = executor.last_invocation(Operation::Dependency).unwrap();
        assert_eq!(dependency.dependency, Some(DependencyMode::Update));
    }

    #[tokio::test]
    async fn test_lint_failure_stops_chain() {
        let executor = RecordingExecutor::new().failing_on(Operation::Lint);
        let oracle = StaticOracle(coords());
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let request = OperationRequest::new()
            .with_dependency(DependencyMode::Build)
            .with_publish();
        let err = dispatcher.run(&request).await.unwrap_err();

        assert_eq!(executor.operations(), vec![Operation::Lint]);
        assert!(matches!(
            err,
            DeployError::Stage {
                stage: Operation::Lint,
                index: 0,
                ..
            }
        ));
        assert!(err.to_string().starts_with("default chain stopped at stage 1 (lint)"));
    }

    #[tokio::test]
    async fn test_dependency_failure_keeps_lint_and_skips_publish() {
        let executor = RecordingExecutor::new().failing_on(Operation::Dependency);
        let oracle = StaticOracle(coords());
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let request = OperationRequest::new()
            .with_dependency(DependencyMode::Build)
            .with_publish();
        let err = dispatcher.run(&request).await.unwrap_err();

        assert_eq!(
            executor.operations(),
            vec![Operation::Lint, Operation::Dependency]
        );
        assert_eq!(err.operation(), Some(Operation::Dependency));
    }

    #[tokio::test]
    async fn test_explicit_operation_runs_alone() {
        let executor = RecordingExecutor::new();
        let oracle = StaticOracle(coords());
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let request = OperationRequest::single(Operation::Upgrade)
            .with_dependency(DependencyMode::Build)
            .with_publish();
        let outcome = dispatcher.run(&request).await.unwrap();

        assert_eq!(executor.operations(), vec![Operation::Upgrade]);
        assert_eq!(outcome.release_name.as_deref(), Some("orders"));

        let upgrade = executor.last_invocation(Operation::Upgrade).unwrap();
        assert_eq!(upgrade.namespace, "shop");
        assert_eq!(upgrade.values_files, vec![PathBuf::from("chart/values.yaml")]);
        assert_eq!(upgrade.publish_version, None);
    }

    #[tokio::test]
    async fn test_explicit_operation_error_wrapped() {
        let executor = RecordingExecutor::new().failing_on(Operation::Install);
        let oracle = StaticOracle(coords());
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let err = dispatcher
            .run(&OperationRequest::single(Operation::Install))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::Operation {
                operation: Operation::Install,
                ..
            }
        ));
        assert!(err.to_string().starts_with("failed to execute helm install"));
    }

    #[tokio::test]
    async fn test_publish_version_from_oracle() {
        let executor = RecordingExecutor::new();
        let oracle = StaticOracle(coords());
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let outcome = dispatcher
            .run(&OperationRequest::new().with_publish())
            .await
            .unwrap();

        let publish = executor.last_invocation(Operation::Publish).unwrap();
        assert_eq!(publish.publish_version.as_deref(), Some("1.4.2"));
        assert_eq!(outcome.publish_version.as_deref(), Some("1.4.2"));
    }

    #[tokio::test]
    async fn test_custom_publish_version_overrides_oracle() {
        let executor = RecordingExecutor::new();
        let oracle = CountingOracle::new();
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let request =
            OperationRequest::single(Operation::Publish).with_publish_version("2.0.0-rc.1");
        dispatcher.run(&request).await.unwrap();

        let publish = executor.last_invocation(Operation::Publish).unwrap();
        assert_eq!(publish.publish_version.as_deref(), Some("2.0.0-rc.1"));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_oracle_not_queried_for_lint() {
        let executor = RecordingExecutor::new();
        let oracle = CountingOracle::new();
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        dispatcher.run(&OperationRequest::new()).await.unwrap();

        assert_eq!(executor.operations(), vec![Operation::Lint]);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_oracle_queried_once() {
        let executor = RecordingExecutor::new();
        let oracle = CountingOracle::new();
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        dispatcher
            .run(&OperationRequest::single(Operation::Install))
            .await
            .unwrap();
        dispatcher
            .run(&OperationRequest::single(Operation::Publish))
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_release_name_override() {
        let executor = RecordingExecutor::new();
        let oracle = CountingOracle::new();
        let dispatcher = Dispatcher::new(&executor, &oracle, base());

        let request =
            OperationRequest::single(Operation::Uninstall).with_release_name("orders-canary");
        let outcome = dispatcher.run(&request).await.unwrap();

        assert_eq!(outcome.release_name.as_deref(), Some("orders-canary"));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_before_stage_runs() {
        let executor = RecordingExecutor::new();
        let dispatcher = Dispatcher::new(&executor, &FailingOracle, base());

        let request = OperationRequest::new().with_publish();
        let err = dispatcher.run(&request).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::Coordinates {
                operation: Operation::Publish,
                ..
            }
        ));
        assert_eq!(err.operation(), Some(Operation::Publish));
        assert!(err
            .to_string()
            .starts_with("getting artifact information for helm publish failed"));
        assert_eq!(executor.operations(), vec![Operation::Lint]);
    }
}
