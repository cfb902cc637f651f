//! Built-in node executors: `script`, `inference`, and `store`.
//!
//! All three are thin adapters between the engine's
//! [`NodeExecutor`](crate::node::NodeExecutor) contract and a capability on
//! [`WorkflowDeps`](crate::deps::WorkflowDeps). Every failure mode is folded
//! into the returned [`NodeExecutionResult`](crate::node::NodeExecutionResult);
//! nothing propagates past the node.

mod inference;
mod script;
mod store;

pub use inference::InferenceExecutor;
pub use script::ScriptExecutor;
pub use store::StoreExecutor;
