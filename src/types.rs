//! Core identifier types for the agentloom workflow engine.
//!
//! This module defines the fundamental types used throughout the system for
//! identifying graph nodes and classifying the origin of chat events. These
//! are the core domain concepts that define what an agent workflow *is*;
//! runtime execution types (run ids, reports) live in [`crate::engine`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a node within an agent graph.
///
/// Node ids are author-assigned strings, unique within one graph. They key
/// every per-run structure: input edges, the node value map, and the result
/// map returned by [`WorkflowEngine::run`](crate::engine::WorkflowEngine::run).
///
/// # Examples
///
/// ```rust
/// use agentloom::types::NodeId;
///
/// let id = NodeId::from("summarize");
/// assert_eq!(id.as_str(), "summarize");
/// assert_eq!(id.to_string(), "summarize");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Developer Experience: allow using string literals where a NodeId is expected.
impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Origin flag on a [`ChatEvent`](crate::event_bus::ChatEvent).
///
/// Distinguishes user-driven events from events emitted by the engine or by
/// agent side effects. The trigger manager starts runs only for
/// [`TriggerSource::User`] events; system-sourced events can never start a
/// run, which is what prevents agents from triggering other agents
/// transitively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// The event was produced by a human action in the chat.
    User,
    /// The event was produced by the engine or by an agent's side effect.
    System,
}

impl TriggerSource {
    /// Returns `true` if this is a system-sourced event.
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::System => write!(f, "system"),
        }
    }
}
