use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::deps::{StoreAction, WorkflowDeps};
use crate::node::{NodeError, NodeExecutionResult, NodeExecutor, NodeInputs};
use async_trait::async_trait;

#[derive(Deserialize)]
struct StoreConfig {
    action: Value,
}

/// Applies one configured [`StoreAction`] per invocation.
///
/// The action is declared statically in the node config; any string field
/// equal to `"$input"` is substituted with the node's merged input before
/// the action is parsed, so upstream values can flow into a mutation.
pub struct StoreExecutor {
    deps: Arc<dyn WorkflowDeps>,
}

impl StoreExecutor {
    #[must_use]
    pub fn new(deps: Arc<dyn WorkflowDeps>) -> Self {
        Self { deps }
    }
}

/// Replace every string leaf equal to `$input` with `input`.
fn substitute(template: &Value, input: &Value) -> Value {
    match template {
        Value::String(s) if s == "$input" => input.clone(),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, input)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, input)).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl NodeExecutor for StoreExecutor {
    fn kind(&self) -> &'static str {
        "store"
    }

    fn input_slots(&self) -> Option<&'static [&'static str]> {
        Some(&["input"])
    }

    async fn execute(&self, config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
        let config: StoreConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(e) => {
                return NodeExecutionResult::failure(NodeError::execution(format!(
                    "invalid store config: {e}"
                )));
            }
        };

        let input = inputs.merged();
        let input_text = match &input {
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        };
        // String placeholders get the input's text so role/content fields
        // stay strings even when the upstream value is structured.
        let resolved = substitute(&config.action, &input_text);

        let action: StoreAction = match serde_json::from_value(resolved) {
            Ok(action) => action,
            Err(e) => {
                return NodeExecutionResult::failure(NodeError::execution(format!(
                    "invalid store action: {e}"
                )));
            }
        };
        debug!(?action, "applying store action");

        match self.deps.apply_store_action(action.clone()).await {
            Ok(()) => match serde_json::to_value(&action) {
                Ok(echo) => NodeExecutionResult::success(echo),
                Err(e) => NodeExecutionResult::failure(NodeError::execution(e.to_string())),
            },
            Err(e) => NodeExecutionResult::failure(NodeError::external(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::InMemoryDeps;
    use serde_json::json;

    #[tokio::test]
    async fn placeholder_is_replaced_with_input() {
        let deps = Arc::new(InMemoryDeps::new());
        let executor = StoreExecutor::new(deps.clone());
        let mut inputs = NodeInputs::default();
        inputs.bind("input", json!("summarized text"));
        let result = executor
            .execute(
                &json!({"action": {
                    "action": "append_chat_message",
                    "role": "assistant",
                    "content": "$input"
                }}),
                inputs,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(
            deps.recorded_actions(),
            vec![StoreAction::AppendChatMessage {
                chat_id: None,
                role: "assistant".into(),
                content: "summarized text".into(),
            }]
        );
    }

    #[tokio::test]
    async fn malformed_action_is_execution_failure() {
        let executor = StoreExecutor::new(Arc::new(InMemoryDeps::new()));
        let result = executor
            .execute(
                &json!({"action": {"action": "no_such_action"}}),
                NodeInputs::default(),
            )
            .await;
        assert!(matches!(result.error(), Some(NodeError::Execution { .. })));
    }

    #[tokio::test]
    async fn applied_action_is_echoed_as_value() {
        let executor = StoreExecutor::new(Arc::new(InMemoryDeps::new()));
        let result = executor
            .execute(
                &json!({"action": {"action": "set_active_model", "model_id": "m1"}}),
                NodeInputs::default(),
            )
            .await;
        assert_eq!(result.value().unwrap()["model_id"], json!("m1"));
    }
}
