//! The workflow engine: validates an agent's graph, layers it into
//! wavefronts, and drives execution to completion.
//!
//! Execution semantics:
//!
//! - The graph is validated before any node runs; a structural defect fails
//!   the whole run with a [`ValidationError`] and executes nothing.
//! - Nodes inside one wavefront run concurrently; wavefronts run strictly in
//!   sequence, so a node never starts before all of its dependencies have
//!   settled.
//! - A failed node poisons its transitive dependents: they are recorded as
//!   [`NodeError::DependencyFailed`] without their executor ever being
//!   invoked. Unrelated branches keep running.
//! - Cancellation is cooperative and observed at wavefront boundaries; an
//!   in-flight wavefront always settles.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::agents::Agent;
use crate::graphs::{AgentGraph, ValidationError, validate, wavefronts};
use crate::node::{NodeError, NodeExecutionResult, NodeInputs};
use crate::registry::ExecutorRegistry;
use crate::types::NodeId;

/// Cooperative cancellation flag for one or more runs.
///
/// Cheap to clone; every clone observes the same flag. Cancelling never
/// interrupts a node mid-execution — the engine checks the flag between
/// wavefronts.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-run mutable state, exclusively owned by one in-flight run.
///
/// Concurrent runs of the same agent each get their own context; nothing is
/// shared between them. `node_values` holds an entry only for nodes that
/// executed and succeeded, a subset of `executed_nodes`.
#[derive(Debug)]
pub struct WorkflowExecutionContext {
    pub agent_id: String,
    pub run_id: Uuid,
    /// Output value per successfully executed node.
    pub node_values: FxHashMap<NodeId, Value>,
    /// Nodes whose executor was invoked and settled.
    pub executed_nodes: FxHashSet<NodeId>,
    pub is_running: bool,
    /// Node most recently dispatched; `None` outside a wavefront. When a
    /// wavefront runs several nodes concurrently this names only the last
    /// dispatch, not every node in flight.
    pub current_node_id: Option<NodeId>,
}

impl WorkflowExecutionContext {
    fn new(agent_id: String, run_id: Uuid) -> Self {
        Self {
            agent_id,
            run_id,
            node_values: FxHashMap::default(),
            executed_nodes: FxHashSet::default(),
            is_running: true,
            current_node_id: None,
        }
    }

    fn settle(&mut self, id: &NodeId, result: &NodeExecutionResult) {
        self.executed_nodes.insert(id.clone());
        if let Some(value) = result.value() {
            self.node_values.insert(id.clone(), value.clone());
        }
    }

    fn finish(&mut self) {
        self.is_running = false;
        self.current_node_id = None;
    }
}

/// Everything one finished (or cancelled) run produced.
#[derive(Debug)]
pub struct RunReport {
    /// The run's final context, with `is_running` already cleared.
    pub context: WorkflowExecutionContext,
    /// Outcome per settled node. Nodes skipped by cancellation are absent;
    /// nodes short-circuited by a failed dependency are present with a
    /// [`NodeError::DependencyFailed`] result.
    pub results: FxHashMap<NodeId, NodeExecutionResult>,
    /// Nodes whose executor was actually invoked, in settle order.
    pub executed: Vec<NodeId>,
    pub cancelled: bool,
}

impl RunReport {
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.context.agent_id
    }

    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.context.run_id
    }

    /// The output value of a node, if it succeeded.
    #[must_use]
    pub fn value(&self, id: &NodeId) -> Option<&Value> {
        self.results.get(id).and_then(NodeExecutionResult::value)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.results.values().all(NodeExecutionResult::is_success)
    }
}

/// Drives agent graphs to completion against an executor registry.
///
/// Stateless apart from the registry: each run gets an independent value
/// context, so concurrent runs of the same agent never observe each other.
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: ExecutorRegistry,
}

impl WorkflowEngine {
    #[must_use]
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Run an agent's graph with the given seed inputs.
    pub async fn run(
        &self,
        agent: &Agent,
        seed: FxHashMap<String, Value>,
    ) -> Result<RunReport, ValidationError> {
        self.run_with_cancel(agent, seed, CancelHandle::new()).await
    }

    /// Run an agent's graph, observing `cancel` between wavefronts.
    #[instrument(skip_all, fields(agent_id = %agent.id, run_id))]
    pub async fn run_with_cancel(
        &self,
        agent: &Agent,
        seed: FxHashMap<String, Value>,
        cancel: CancelHandle,
    ) -> Result<RunReport, ValidationError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        validate(&agent.graph, &self.registry)?;
        let waves = wavefronts(&agent.graph)
            .map_err(|nodes| ValidationError::Cycle { nodes })?;
        info!(waves = waves.len(), nodes = agent.graph.nodes.len(), "run starting");

        let mut context = WorkflowExecutionContext::new(agent.id.clone(), run_id);
        let mut results: FxHashMap<NodeId, NodeExecutionResult> = FxHashMap::default();
        let mut executed: Vec<NodeId> = Vec::new();
        let mut cancelled = false;

        for wave in waves {
            if cancel.is_cancelled() {
                warn!("run cancelled between wavefronts");
                cancelled = true;
                break;
            }

            let mut pending: Vec<(NodeId, BoxFuture<'static, NodeExecutionResult>)> = Vec::new();
            for id in wave {
                context.current_node_id = Some(id.clone());
                match self.prepare(&agent.graph, &id, &seed, &results) {
                    Prepared::Run(future) => pending.push((id, future)),
                    Prepared::ShortCircuit(error) => {
                        debug!(node = %id, "short-circuiting dependent of failed node");
                        results.insert(id, NodeExecutionResult::failure(error));
                    }
                }
            }

            let (ids, futures): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
            for (id, result) in ids.into_iter().zip(join_all(futures).await) {
                if let Some(error) = result.error() {
                    warn!(node = %id, %error, "node failed");
                } else {
                    debug!(node = %id, "node settled");
                }
                context.settle(&id, &result);
                executed.push(id.clone());
                results.insert(id, result);
            }
            context.current_node_id = None;
        }

        context.finish();
        info!(executed = executed.len(), cancelled, "run finished");
        Ok(RunReport {
            context,
            results,
            executed,
            cancelled,
        })
    }

    /// Decide how a node in the current wavefront executes: short-circuited
    /// because a dependency failed, or scheduled with its inputs bound.
    fn prepare(
        &self,
        graph: &AgentGraph,
        id: &NodeId,
        seed: &FxHashMap<String, Value>,
        results: &FxHashMap<NodeId, NodeExecutionResult>,
    ) -> Prepared {
        let spec = match graph.node(id) {
            Some(spec) => spec.clone(),
            // Unreachable: wavefront membership comes from the graph itself.
            None => {
                return Prepared::ShortCircuit(NodeError::execution("node missing from graph"));
            }
        };

        let mut inputs = NodeInputs::default();
        let mut incoming = 0usize;
        for edge in graph.incoming(id) {
            incoming += 1;
            match results.get(&edge.from) {
                Some(result) if result.is_success() => {
                    let value = result.value().cloned().unwrap_or(Value::Null);
                    inputs.bind(edge.slot.clone(), value);
                }
                _ => {
                    return Prepared::ShortCircuit(NodeError::DependencyFailed {
                        dependency: edge.from.clone(),
                    });
                }
            }
        }
        if incoming == 0 {
            inputs = NodeInputs::seeded(seed.clone());
        }

        let executor = match self.registry.get(&spec.kind) {
            Some(executor) => Arc::clone(executor),
            // Unreachable after validation, but kept total.
            None => return Prepared::ShortCircuit(NodeError::UnknownNodeType { kind: spec.kind }),
        };
        Prepared::Run(async move { executor.execute(&spec.config, inputs).await }.boxed())
    }
}

enum Prepared {
    Run(BoxFuture<'static, NodeExecutionResult>),
    ShortCircuit(NodeError),
}
