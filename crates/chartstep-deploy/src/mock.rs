//! Recording executor for testing
//!
//! This executor performs nothing and remembers every call, useful for
//! asserting dispatch order without a cluster or the helm binary.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::error::ExecutorError;
use crate::executor::{ExecResult, Executor, Invocation};
use crate::operation::Operation;

/// One recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub invocation: Invocation,
}

/// In-memory executor that records calls and fails on demand
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    failing: Arc<RwLock<HashSet<Operation>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail
    pub fn failing_on(self, operation: Operation) -> Self {
        self.failing.write().unwrap().insert(operation);
        self
    }

    /// All calls in the order they were made
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().unwrap().clone()
    }

    /// Operations called, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|call| call.operation)
            .collect()
    }

    /// The invocation of the last call of `operation`
    pub fn last_invocation(&self, operation: Operation) -> Option<Invocation> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|call| call.operation == operation)
            .map(|call| call.invocation.clone())
    }

    pub fn reset(&self) {
        self.calls.write().unwrap().clear();
    }

    fn record(&self, operation: Operation, invocation: &Invocation) -> ExecResult {
        self.calls.write().unwrap().push(RecordedCall {
            operation,
            invocation: invocation.clone(),
        });

        if self.failing.read().unwrap().contains(&operation) {
            return Err(ExecutorError::Failed {
                command: format!("helm {}", operation),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn lint(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Lint, invocation)
    }

    async fn install(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Install, invocation)
    }

    async fn upgrade(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Upgrade, invocation)
    }

    async fn test(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Test, invocation)
    }

    async fn uninstall(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Uninstall, invocation)
    }

    async fn dependency(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Dependency, invocation)
    }

    async fn publish(&self, invocation: &Invocation) -> ExecResult {
        self.record(Operation::Publish, invocation)
    }
}
