use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::deps::{InferenceRequest, PromptConfig, WorkflowDeps};
use crate::message::Message;
use crate::node::{NodeError, NodeExecutionResult, NodeExecutor, NodeInputs};
use async_trait::async_trait;

#[derive(Deserialize)]
struct InferenceConfig {
    model_id: String,
    #[serde(default)]
    inference_template_id: Option<String>,
    #[serde(default)]
    format_template_id: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    stream: bool,
}

/// Calls the host's inference provider with the node's bound inputs.
///
/// Accepts either a `messages` slot (a serialized message list) or a
/// `prompt`/`input` slot whose value becomes a single user message. Missing
/// entity lookups, provider errors, and an empty provider response are all
/// external-dependency failures scoped to this node.
pub struct InferenceExecutor {
    deps: Arc<dyn WorkflowDeps>,
}

impl InferenceExecutor {
    #[must_use]
    pub fn new(deps: Arc<dyn WorkflowDeps>) -> Self {
        Self { deps }
    }

    fn messages_from(inputs: &NodeInputs) -> Result<Vec<Message>, NodeError> {
        if let Some(raw) = inputs.get("messages") {
            return serde_json::from_value(raw.clone()).map_err(|e| {
                NodeError::execution(format!("`messages` slot is not a message list: {e}"))
            });
        }
        let prompt = inputs.get("prompt").or_else(|| inputs.get("input"));
        let Some(prompt) = prompt else {
            return Err(NodeError::execution(
                "inference node needs a `messages`, `prompt`, or `input` slot",
            ));
        };
        let text = match prompt {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Ok(vec![Message::user(&text)])
    }
}

#[async_trait]
impl NodeExecutor for InferenceExecutor {
    fn kind(&self) -> &'static str {
        "inference"
    }

    fn input_slots(&self) -> Option<&'static [&'static str]> {
        Some(&["prompt", "messages", "input"])
    }

    async fn execute(&self, config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
        let config: InferenceConfig = match serde_json::from_value(config.clone()) {
            Ok(config) => config,
            Err(e) => {
                return NodeExecutionResult::failure(NodeError::execution(format!(
                    "invalid inference config: {e}"
                )));
            }
        };

        let Some(model) = self.deps.model_by_id(&config.model_id) else {
            return NodeExecutionResult::failure(NodeError::external(format!(
                "unknown model `{}`",
                config.model_id
            )));
        };
        if let Some(id) = &config.inference_template_id {
            if self.deps.inference_template_by_id(id).is_none() {
                return NodeExecutionResult::failure(NodeError::external(format!(
                    "unknown inference template `{id}`"
                )));
            }
        }
        let format_template = match &config.format_template_id {
            Some(id) => match self.deps.format_template_by_id(id) {
                Some(template) => Some(template),
                None => {
                    return NodeExecutionResult::failure(NodeError::external(format!(
                        "unknown format template `{id}`"
                    )));
                }
            },
            None => None,
        };

        let mut messages = match Self::messages_from(&inputs) {
            Ok(messages) => messages,
            Err(e) => return NodeExecutionResult::failure(e),
        };
        let mut system_prompt = config.system_prompt;

        // A format template folds the whole conversation into one formatted
        // prompt through the host's formatter.
        if let Some(template) = format_template {
            let prompt_config = PromptConfig {
                format_template: Some(template),
                system_prompt: system_prompt.take(),
                messages,
            };
            match self.deps.format_prompt(&prompt_config) {
                Ok(formatted) => messages = vec![Message::user(&formatted)],
                Err(e) => {
                    return NodeExecutionResult::failure(NodeError::external(e.to_string()));
                }
            }
        }

        let request = InferenceRequest {
            messages,
            model_specs: vec![model],
            system_prompt,
            parameters: config.parameters,
            stream: config.stream,
        };
        debug!(model_id = %config.model_id, "dispatching inference request");

        match self.deps.run_inference(request).await {
            Ok(Some(text)) => NodeExecutionResult::success(Value::String(text)),
            Ok(None) => NodeExecutionResult::failure(NodeError::external(
                "inference provider produced no output",
            )),
            Err(e) => NodeExecutionResult::failure(NodeError::external(e.to_string())),
        }
    }
}
