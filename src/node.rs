//! Node execution framework: the executor seam, slot-bound inputs, and the
//! per-node result type.
//!
//! A node communicates its outcome exclusively through
//! [`NodeExecutionResult`]; executors never raise across the engine
//! boundary. The engine treats a failed result as local to the node and its
//! transitive dependents.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::NodeId;

/// Behavior bound to a node-type tag.
///
/// Executors are registered once at process start in the
/// [`ExecutorRegistry`](crate::registry::ExecutorRegistry) and dispatched by
/// tag. They receive the node's static configuration and the inputs bound by
/// the graph's edges, and must fold every failure mode into the returned
/// result.
///
/// # Examples
///
/// ```
/// use agentloom::node::{NodeExecutor, NodeInputs, NodeExecutionResult};
/// use async_trait::async_trait;
/// use serde_json::{Value, json};
///
/// struct EchoExecutor;
///
/// #[async_trait]
/// impl NodeExecutor for EchoExecutor {
///     fn kind(&self) -> &'static str {
///         "echo"
///     }
///
///     async fn execute(&self, _config: &Value, inputs: NodeInputs) -> NodeExecutionResult {
///         NodeExecutionResult::success(inputs.merged())
///     }
/// }
/// ```
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// The node-type tag this executor is dispatched under.
    fn kind(&self) -> &'static str;

    /// Input slots this executor understands.
    ///
    /// `None` (the default) accepts any slot name. When `Some`, graph
    /// validation rejects edges binding other slots.
    fn input_slots(&self) -> Option<&'static [&'static str]> {
        None
    }

    /// Execute the node. May await external work (inference, scripts).
    async fn execute(&self, config: &Value, inputs: NodeInputs) -> NodeExecutionResult;
}

/// Values bound to a node's named input slots for one invocation.
///
/// Root nodes receive the run's seed inputs as their slot map; every other
/// node receives one entry per incoming edge, keyed by the edge's slot name.
#[derive(Clone, Debug, Default)]
pub struct NodeInputs {
    values: FxHashMap<String, Value>,
}

impl NodeInputs {
    /// Build inputs from a pre-assembled slot map (seed inputs for roots).
    #[must_use]
    pub fn seeded(values: FxHashMap<String, Value>) -> Self {
        Self { values }
    }

    /// Bind a value to a slot. Later bindings replace earlier ones; the
    /// engine prevents duplicates through graph validation.
    pub fn bind(&mut self, slot: impl Into<String>, value: Value) {
        self.values.insert(slot.into(), value);
    }

    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.values.get(slot)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Collapse the slot map into a single value.
    ///
    /// A single bound slot yields its value directly, so a script fed by one
    /// edge sees that value as `input`. Multiple slots yield a JSON object
    /// keyed by slot name; no slots yield `null`.
    #[must_use]
    pub fn merged(&self) -> Value {
        match self.values.len() {
            0 => Value::Null,
            1 => self.values.values().next().cloned().unwrap_or(Value::Null),
            _ => Value::Object(
                self.values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        }
    }
}

/// Failure taxonomy for a single node.
///
/// Cloneable and serializable so results can be reported and logged; the
/// original error text is preserved, not the source chain.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeError {
    /// The executor itself reported a failure.
    #[error("node execution failed: {message}")]
    #[diagnostic(code(agentloom::node::execution))]
    Execution { message: String },

    /// A user script threw, failed to parse, or exceeded its limits.
    #[error("script error: {message}")]
    #[diagnostic(code(agentloom::node::sandbox))]
    Sandbox { message: String },

    /// An injected capability failed or a lookup returned nothing.
    #[error("external dependency failed: {message}")]
    #[diagnostic(code(agentloom::node::external_dependency))]
    ExternalDependency { message: String },

    /// A dependency did not complete successfully; this node was
    /// short-circuited without invoking its executor.
    #[error("dependency `{dependency}` did not complete successfully")]
    #[diagnostic(code(agentloom::node::dependency_failed))]
    DependencyFailed { dependency: NodeId },

    /// No executor is registered for the node's type tag.
    #[error("no executor registered for node type `{kind}`")]
    #[diagnostic(
        code(agentloom::node::unknown_type),
        help("Register the executor at process start, before any run.")
    )]
    UnknownNodeType { kind: String },
}

impl NodeError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    pub fn sandbox(message: impl Into<String>) -> Self {
        Self::Sandbox {
            message: message.into(),
        }
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalDependency {
            message: message.into(),
        }
    }
}

/// The only channel through which a node communicates its outcome.
///
/// Exactly one of `value`/`error` is populated. `logs` carries the script
/// sandbox's captured console buffer and is empty for other node types.
#[derive(Clone, Debug, Default, Serialize)]
pub struct NodeExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<NodeError>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    logs: Vec<String>,
}

impl NodeExecutionResult {
    #[must_use]
    pub fn success(value: Value) -> Self {
        Self {
            value: Some(value),
            error: None,
            logs: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(error: NodeError) -> Self {
        Self {
            value: None,
            error: Some(error),
            logs: Vec::new(),
        }
    }

    /// Attach captured diagnostics (script console output).
    #[must_use]
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&NodeError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merged_collapses_by_arity() {
        let mut inputs = NodeInputs::default();
        assert_eq!(inputs.merged(), Value::Null);

        inputs.bind("prompt", json!("hello"));
        assert_eq!(inputs.merged(), json!("hello"));

        inputs.bind("context", json!(42));
        let merged = inputs.merged();
        assert_eq!(merged["prompt"], json!("hello"));
        assert_eq!(merged["context"], json!(42));
    }

    #[test]
    fn result_success_and_failure_are_exclusive() {
        let ok = NodeExecutionResult::success(json!(1));
        assert!(ok.is_success());
        assert_eq!(ok.value(), Some(&json!(1)));
        assert!(ok.error().is_none());

        let err = NodeExecutionResult::failure(NodeError::execution("boom"));
        assert!(!err.is_success());
        assert!(err.value().is_none());
    }

    #[test]
    fn node_error_serializes_tagged() {
        let err = NodeError::sandbox("oops");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "sandbox");
        assert_eq!(json["message"], "oops");
    }
}
