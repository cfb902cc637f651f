//! # Agentloom: Event-driven Agent Workflow Engine
//!
//! Agentloom runs user-defined agents: small directed graphs of typed nodes
//! that fire in response to chat lifecycle events. Graphs are authored in an
//! external editor; this crate validates them, layers them into dependency
//! wavefronts, and executes them concurrently against a pluggable set of
//! node executors.
//!
//! ## Core Concepts
//!
//! - **Events**: Transient chat lifecycle notifications carried by the
//!   [`event_bus`]
//! - **Agents**: A trigger subscription paired with an executable graph
//! - **Nodes**: Typed steps dispatched through the [`registry`] to a
//!   [`node::NodeExecutor`]
//! - **Wavefronts**: Dependency layers; nodes in one layer run concurrently
//! - **Deps**: The host-provided capability bundle ([`deps::WorkflowDeps`])
//!   through which nodes reach models, templates, and stores
//!
//! ## Quick Start
//!
//! ```
//! use agentloom::{
//!     agents::Agent,
//!     deps::InMemoryDeps,
//!     engine::WorkflowEngine,
//!     event_bus::ChatEventKind,
//!     graphs::AgentGraphBuilder,
//!     registry::ExecutorRegistry,
//! };
//! use rustc_hash::FxHashMap;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let deps = Arc::new(InMemoryDeps::new());
//! let engine = WorkflowEngine::new(ExecutorRegistry::with_builtins(deps));
//!
//! let agent = Agent::new(
//!     "shouter",
//!     AgentGraphBuilder::new()
//!         .node("shout", "script", json!({"source": "input.to_upper()"}))
//!         .build(),
//! )
//! .on(ChatEventKind::AfterUserMessage);
//!
//! let mut seed = FxHashMap::default();
//! seed.insert("input".to_string(), json!("hello"));
//! let report = engine.run(&agent, seed).await.unwrap();
//! assert_eq!(report.value(&"shout".into()), Some(&json!("HELLO")));
//! # }
//! ```
//!
//! In production the engine is not driven by hand: a
//! [`triggers::TriggerManager`] attaches to the [`event_bus::EventBus`],
//! matches incoming user-sourced events against registered agents, and
//! spawns runs fire-and-forget. System-sourced events never trigger, which
//! is what keeps agents from triggering each other in a loop.
//!
//! ## Module Guide
//!
//! - [`event_bus`] - Chat lifecycle events and the synchronous listener bus
//! - [`agents`] - Agent definition (triggers plus graph)
//! - [`graphs`] - Graph shape, validation, and wavefront layering
//! - [`node`] - Executor trait, slot-bound inputs, node results
//! - [`registry`] - Immutable tag-to-executor dispatch table
//! - [`executors`] - Built-in `script`, `inference`, and `store` executors
//! - [`sandbox`] - Bounded script evaluation
//! - [`deps`] - Host capability bundle and the in-memory test double
//! - [`engine`] - Wavefront execution and cancellation
//! - [`triggers`] - Event-to-run wiring and run reports

pub mod agents;
pub mod deps;
pub mod engine;
pub mod event_bus;
pub mod executors;
pub mod graphs;
pub mod message;
pub mod node;
pub mod registry;
pub mod sandbox;
pub mod telemetry;
pub mod triggers;
pub mod types;
