//! The injected capability bundle consumed by built-in executors.
//!
//! The engine owns no persistence and no inference protocol. Everything a
//! node needs from the host application — prompt formatting, template and
//! model lookup, inference invocation, store mutation — flows through the
//! [`WorkflowDeps`] trait, owned and provided by the application and
//! consumed read-only by the engine.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::message::Message;

/// Error surfaced by a capability implementation.
///
/// These never escape a run: the engine folds them into the failing node's
/// [`NodeError::ExternalDependency`](crate::node::NodeError::ExternalDependency).
#[derive(Debug, Error, Diagnostic)]
pub enum DepsError {
    #[error("inference call failed: {0}")]
    #[diagnostic(code(agentloom::deps::inference))]
    Inference(String),

    #[error("prompt formatting failed: {0}")]
    #[diagnostic(code(agentloom::deps::format))]
    Format(String),

    #[error("store action rejected: {0}")]
    #[diagnostic(code(agentloom::deps::store))]
    Store(String),
}

macro_rules! entity {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub id: String,
            #[serde(default)]
            pub name: String,
            /// Opaque entity payload, interpreted by the host application.
            #[serde(default)]
            pub data: Value,
        }

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
                Self {
                    id: id.into(),
                    name: name.into(),
                    data: Value::Null,
                }
            }
        }
    };
}

entity!(
    /// A model registered with the host application.
    ModelSpec
);
entity!(
    /// A chat template (participant roster, greeting, scenario).
    ChatTemplate
);
entity!(
    /// An inference template (sampler/stop-token preset).
    InferenceTemplate
);
entity!(
    /// A format template (prompt layout for a model family).
    FormatTemplate
);
entity!(
    /// A provider manifest describing an inference backend.
    Manifest
);

/// Inputs to [`WorkflowDeps::format_prompt`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_template: Option<FormatTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// One model-inference invocation, built by the inference executor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub messages: Vec<Message>,
    pub model_specs: Vec<ModelSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub stream: bool,
}

/// The narrow, enumerated mutation surface exposed to scripts and store
/// nodes. Mutation of host state is possible only through these actions;
/// there is no general state handle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoreAction {
    AppendChatMessage {
        #[serde(skip_serializing_if = "Option::is_none")]
        chat_id: Option<String>,
        role: String,
        content: String,
    },
    SetChatVariable {
        name: String,
        value: Value,
    },
    UpdateCharacterField {
        character_id: String,
        field: String,
        value: Value,
    },
    UpsertLorebookEntry {
        lorebook_id: String,
        key: String,
        content: String,
    },
    SetActiveModel {
        model_id: String,
    },
}

/// Capability bundle provided by the host application.
///
/// Lookups return `None` for unknown ids; the calling executor surfaces
/// that as an external-dependency failure scoped to the node. Inference may
/// legitimately return `Ok(None)` (provider produced nothing), which is
/// also a node-scoped failure.
#[async_trait]
pub trait WorkflowDeps: Send + Sync {
    fn format_prompt(&self, config: &PromptConfig) -> Result<String, DepsError>;

    fn chat_template_by_id(&self, id: &str) -> Option<ChatTemplate>;
    fn model_by_id(&self, id: &str) -> Option<ModelSpec>;
    fn inference_template_by_id(&self, id: &str) -> Option<InferenceTemplate>;
    fn format_template_by_id(&self, id: &str) -> Option<FormatTemplate>;
    fn manifest_by_id(&self, id: &str) -> Option<Manifest>;

    /// Invoke the inference provider. Concurrency throttling is the
    /// provider's concern, not the engine's.
    async fn run_inference(&self, request: InferenceRequest) -> Result<Option<String>, DepsError>;

    /// Apply one store mutation on behalf of a node.
    async fn apply_store_action(&self, action: StoreAction) -> Result<(), DepsError>;
}

/// In-memory [`WorkflowDeps`] for tests, demos, and doctests.
///
/// Lookups resolve against registered entities; inference returns canned
/// responses in registration order (then repeats the last one); applied
/// store actions are recorded and can be inspected with
/// [`recorded_actions`](Self::recorded_actions).
#[derive(Default)]
pub struct InMemoryDeps {
    models: Vec<ModelSpec>,
    chat_templates: Vec<ChatTemplate>,
    inference_templates: Vec<InferenceTemplate>,
    format_templates: Vec<FormatTemplate>,
    manifests: Vec<Manifest>,
    responses: Mutex<Vec<String>>,
    cursor: Mutex<usize>,
    actions: Arc<Mutex<Vec<StoreAction>>>,
}

impl InMemoryDeps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.models.push(model);
        self
    }

    #[must_use]
    pub fn with_format_template(mut self, template: FormatTemplate) -> Self {
        self.format_templates.push(template);
        self
    }

    #[must_use]
    pub fn with_inference_template(mut self, template: InferenceTemplate) -> Self {
        self.inference_templates.push(template);
        self
    }

    /// Queue a canned inference response.
    #[must_use]
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .expect("responses poisoned")
            .push(response.into());
        self
    }

    /// Snapshot of every store action applied so far.
    #[must_use]
    pub fn recorded_actions(&self) -> Vec<StoreAction> {
        self.actions.lock().expect("actions poisoned").clone()
    }
}

#[async_trait]
impl WorkflowDeps for InMemoryDeps {
    fn format_prompt(&self, config: &PromptConfig) -> Result<String, DepsError> {
        let mut out = String::new();
        if let Some(system) = &config.system_prompt {
            out.push_str(system);
            out.push('\n');
        }
        for message in &config.messages {
            out.push_str(&format!("{}: {}\n", message.role, message.content));
        }
        Ok(out)
    }

    fn chat_template_by_id(&self, id: &str) -> Option<ChatTemplate> {
        self.chat_templates.iter().find(|t| t.id == id).cloned()
    }

    fn model_by_id(&self, id: &str) -> Option<ModelSpec> {
        self.models.iter().find(|m| m.id == id).cloned()
    }

    fn inference_template_by_id(&self, id: &str) -> Option<InferenceTemplate> {
        self.inference_templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    fn format_template_by_id(&self, id: &str) -> Option<FormatTemplate> {
        self.format_templates.iter().find(|t| t.id == id).cloned()
    }

    fn manifest_by_id(&self, id: &str) -> Option<Manifest> {
        self.manifests.iter().find(|m| m.id == id).cloned()
    }

    async fn run_inference(&self, _request: InferenceRequest) -> Result<Option<String>, DepsError> {
        let responses = self.responses.lock().expect("responses poisoned");
        if responses.is_empty() {
            return Ok(None);
        }
        let mut cursor = self.cursor.lock().expect("cursor poisoned");
        let index = (*cursor).min(responses.len() - 1);
        *cursor += 1;
        Ok(Some(responses[index].clone()))
    }

    async fn apply_store_action(&self, action: StoreAction) -> Result<(), DepsError> {
        self.actions.lock().expect("actions poisoned").push(action);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_deps_replays_responses_then_repeats_last() {
        let deps = InMemoryDeps::new().with_response("one").with_response("two");
        let req = InferenceRequest::default();
        assert_eq!(
            deps.run_inference(req.clone()).await.unwrap().as_deref(),
            Some("one")
        );
        assert_eq!(
            deps.run_inference(req.clone()).await.unwrap().as_deref(),
            Some("two")
        );
        assert_eq!(
            deps.run_inference(req).await.unwrap().as_deref(),
            Some("two")
        );
    }

    #[tokio::test]
    async fn actions_are_recorded_in_order() {
        let deps = InMemoryDeps::new();
        deps.apply_store_action(StoreAction::SetActiveModel {
            model_id: "m1".into(),
        })
        .await
        .unwrap();
        assert_eq!(deps.recorded_actions().len(), 1);
    }

    #[test]
    fn store_action_serde_shape() {
        let action = StoreAction::SetChatVariable {
            name: "mood".into(),
            value: serde_json::json!("curious"),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "set_chat_variable");
        assert_eq!(json["name"], "mood");
    }
}
