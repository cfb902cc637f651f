//! Reusable test executors.

use agentloom::node::{NodeError, NodeExecutionResult, NodeExecutor, NodeInputs};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Echoes its merged inputs back as its output value.
pub struct EchoNode;

#[async_trait]
impl NodeExecutor for EchoNode {
    fn kind(&self) -> &'static str {
        "echo"
    }

    async fn execute(&self, _config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
        NodeExecutionResult::success(inputs.merged())
    }
}

/// Doubles a numeric input; non-numbers count as 1.
pub struct DoublerNode;

#[async_trait]
impl NodeExecutor for DoublerNode {
    fn kind(&self) -> &'static str {
        "double"
    }

    async fn execute(&self, _config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
        let n = inputs.merged().as_i64().unwrap_or(1);
        NodeExecutionResult::success(json!(n * 2))
    }
}

/// Always fails with an execution error.
pub struct FailingNode;

#[async_trait]
impl NodeExecutor for FailingNode {
    fn kind(&self) -> &'static str {
        "fail"
    }

    async fn execute(&self, _config: &Value, _inputs: NodeInputs) -> NodeExecutionResult {
        NodeExecutionResult::failure(NodeError::execution("deliberate test failure"))
    }
}

/// Sleeps for the configured `millis` (default 50), then succeeds with the
/// number of invocations so far, letting tests observe concurrency and
/// cancellation timing.
#[derive(Default)]
pub struct SlowNode {
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl NodeExecutor for SlowNode {
    fn kind(&self) -> &'static str {
        "slow"
    }

    async fn execute(&self, config: &Value, _inputs: NodeInputs) -> NodeExecutionResult {
        let millis = config["millis"].as_u64().unwrap_or(50);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        let count = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        NodeExecutionResult::success(json!(count))
    }
}

/// Declares a fixed slot set, for validation tests.
pub struct StrictSlotsNode;

#[async_trait]
impl NodeExecutor for StrictSlotsNode {
    fn kind(&self) -> &'static str {
        "strict"
    }

    fn input_slots(&self) -> Option<&'static [&'static str]> {
        Some(&["left", "right"])
    }

    async fn execute(&self, _config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
        NodeExecutionResult::success(inputs.merged())
    }
}
