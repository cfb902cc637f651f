//! Agent definition: a trigger subscription paired with a graph.

use serde::{Deserialize, Serialize};

use crate::event_bus::ChatEventKind;
use crate::graphs::AgentGraph;

/// An automation unit: fires its [`AgentGraph`] whenever a chat event of a
/// subscribed kind arrives.
///
/// Agents are authored and persisted by an external editor; the engine
/// treats them as immutable inputs. A disabled agent is never triggered and
/// never validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable id, unique across the host application.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Disabled agents are skipped by the trigger manager without logging.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Event kinds that fire this agent.
    #[serde(default)]
    pub triggers: Vec<ChatEventKind>,
    pub graph: AgentGraph,
}

fn default_enabled() -> bool {
    true
}

impl Agent {
    #[must_use]
    pub fn new(id: impl Into<String>, graph: AgentGraph) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            enabled: true,
            triggers: Vec::new(),
            graph,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Subscribe this agent to an event kind.
    #[must_use]
    pub fn on(mut self, kind: ChatEventKind) -> Self {
        self.triggers.push(kind);
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether an event of `kind` should fire this agent.
    #[must_use]
    pub fn is_triggered_by(&self, kind: ChatEventKind) -> bool {
        self.enabled && self.triggers.contains(&kind)
    }
}
