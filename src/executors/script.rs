use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::deps::WorkflowDeps;
use crate::node::{NodeError, NodeExecutionResult, NodeExecutor, NodeInputs};
use crate::sandbox::{ScriptLimits, ScriptSandbox};
use async_trait::async_trait;

#[derive(Deserialize)]
struct ScriptConfig {
    // `code` is the legacy field name.
    #[serde(alias = "code")]
    source: String,
}

/// Runs the node's configured script in the sandbox.
///
/// The script sees its merged inputs as `input`; its final expression
/// becomes the node's output value. Store actions the script queued are
/// applied through the capability bundle only after the evaluation as a
/// whole succeeded, so a script that errors mutates nothing. Application
/// itself is not transactional: if one queued action is rejected, actions
/// applied before it stay applied and the node reports the failure.
pub struct ScriptExecutor {
    deps: Arc<dyn WorkflowDeps>,
    sandbox: ScriptSandbox,
}

impl ScriptExecutor {
    #[must_use]
    pub fn new(deps: Arc<dyn WorkflowDeps>) -> Self {
        Self {
            deps,
            sandbox: ScriptSandbox::default(),
        }
    }

    #[must_use]
    pub fn with_limits(deps: Arc<dyn WorkflowDeps>, limits: ScriptLimits) -> Self {
        Self {
            deps,
            sandbox: ScriptSandbox::new(limits),
        }
    }
}

#[async_trait]
impl NodeExecutor for ScriptExecutor {
    fn kind(&self) -> &'static str {
        "script"
    }

    async fn execute(&self, config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
        let config: ScriptConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(e) => {
                return NodeExecutionResult::failure(NodeError::sandbox(format!(
                    "invalid script config: {e}"
                )));
            }
        };

        let outcome = match self.sandbox.eval(&config.source, inputs.merged()).await {
            Ok(outcome) => outcome,
            Err(e) => return NodeExecutionResult::failure(NodeError::sandbox(e.to_string())),
        };

        for action in outcome.actions {
            debug!(?action, "applying script store action");
            if let Err(e) = self.deps.apply_store_action(action).await {
                return NodeExecutionResult::failure(NodeError::external(e.to_string()))
                    .with_logs(outcome.logs);
            }
        }

        NodeExecutionResult::success(outcome.value).with_logs(outcome.logs)
    }
}
