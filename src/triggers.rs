//! Event-to-run wiring: watches the chat event bus and launches agent runs.
//!
//! The trigger manager owns the roster of registered agents, subscribes to
//! the bus as a wildcard listener, and spawns one engine run per matching
//! agent per event, fire-and-forget. Events whose source is the system are
//! dropped here, which is what keeps agent-produced messages from triggering
//! agents recursively.

use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::agents::Agent;
use crate::engine::{CancelHandle, RunReport, WorkflowEngine};
use crate::event_bus::{ChatEvent, EventBus, Subscription};

struct TriggerInner {
    engine: WorkflowEngine,
    runtime: Handle,
    agents: RwLock<FxHashMap<String, Agent>>,
    /// In-flight runs, keyed by a per-run token so completion can drop
    /// exactly its own handle.
    active: Mutex<FxHashMap<u64, (String, CancelHandle)>>,
    next_token: AtomicU64,
    subscription: Mutex<Option<Subscription>>,
    reports: Mutex<Option<UnboundedSender<RunReport>>>,
}

/// Launches agent runs in response to chat events.
///
/// Cheap to clone; clones share the roster and the in-flight run table.
/// Construct inside a Tokio runtime: the current handle is captured for
/// spawning runs from the bus's synchronous listener context.
#[derive(Clone)]
pub struct TriggerManager {
    inner: Arc<TriggerInner>,
}

impl TriggerManager {
    #[must_use]
    pub fn new(engine: WorkflowEngine) -> Self {
        Self {
            inner: Arc::new(TriggerInner {
                engine,
                runtime: Handle::current(),
                agents: RwLock::new(FxHashMap::default()),
                active: Mutex::new(FxHashMap::default()),
                next_token: AtomicU64::new(0),
                subscription: Mutex::new(None),
                reports: Mutex::new(None),
            }),
        }
    }

    /// Add or replace an agent in the roster.
    pub fn register_agent(&self, agent: Agent) {
        let mut agents = self.inner.agents.write().expect("agent roster poisoned");
        if agents.insert(agent.id.clone(), agent).is_some() {
            debug!("replaced existing agent registration");
        }
    }

    /// Remove an agent from the roster. In-flight runs are unaffected;
    /// use [`cancel`](Self::cancel) to stop those.
    pub fn remove_agent(&self, agent_id: &str) -> Option<Agent> {
        self.inner
            .agents
            .write()
            .expect("agent roster poisoned")
            .remove(agent_id)
    }

    /// Ids of registered agents, unordered.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<String> {
        self.inner
            .agents
            .read()
            .expect("agent roster poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Subscribe to every chat on the bus. Replaces any earlier attachment;
    /// the subscription lives until [`detach`](Self::detach) or the bus is
    /// cleared.
    pub fn attach(&self, bus: &EventBus) {
        let manager = self.clone();
        let subscription = bus.subscribe_all(move |event| {
            manager.handle_event(event);
        });
        *self
            .inner
            .subscription
            .lock()
            .expect("subscription slot poisoned") = Some(subscription);
        info!("trigger manager attached to event bus");
    }

    /// Drop the bus subscription. Registered agents and in-flight runs are
    /// unaffected.
    pub fn detach(&self) {
        if let Some(subscription) = self
            .inner
            .subscription
            .lock()
            .expect("subscription slot poisoned")
            .take()
        {
            subscription.unsubscribe();
            info!("trigger manager detached from event bus");
        }
    }

    /// Receive a [`RunReport`] for every run launched from here on.
    ///
    /// Only the most recent receiver is fed; calling again replaces the
    /// earlier channel.
    pub fn report_stream(&self) -> UnboundedReceiver<RunReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.reports.lock().expect("report channel poisoned") = Some(tx);
        rx
    }

    /// Request cancellation of every in-flight run of `agent_id`.
    ///
    /// Cooperative: each run stops at its next wavefront boundary.
    pub fn cancel(&self, agent_id: &str) {
        let active = self.inner.active.lock().expect("active run table poisoned");
        let mut signalled = 0usize;
        for (id, handle) in active.values() {
            if id == agent_id {
                handle.cancel();
                signalled += 1;
            }
        }
        if signalled > 0 {
            info!(%agent_id, signalled, "cancellation requested");
        }
    }

    /// Number of in-flight runs, across all agents.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.inner
            .active
            .lock()
            .expect("active run table poisoned")
            .len()
    }

    /// React to one chat event: launch a run for every enabled agent
    /// subscribed to the event's kind. System-sourced events never trigger.
    pub fn handle_event(&self, event: &ChatEvent) {
        if event.source.is_system() {
            debug!(kind = %event.kind, chat_id = %event.chat_id, "ignoring system-sourced event");
            return;
        }

        let matching: Vec<Agent> = {
            let agents = self.inner.agents.read().expect("agent roster poisoned");
            agents
                .values()
                .filter(|agent| agent.is_triggered_by(event.kind))
                .cloned()
                .collect()
        };
        if matching.is_empty() {
            return;
        }
        debug!(kind = %event.kind, agents = matching.len(), "event matched agents");

        let seed = event.seed_inputs();
        for agent in matching {
            self.spawn_run(agent, seed.clone());
        }
    }

    fn spawn_run(&self, agent: Agent, seed: FxHashMap<String, serde_json::Value>) {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelHandle::new();
        self.inner
            .active
            .lock()
            .expect("active run table poisoned")
            .insert(token, (agent.id.clone(), cancel.clone()));

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let outcome = inner.engine.run_with_cancel(&agent, seed, cancel).await;
            inner
                .active
                .lock()
                .expect("active run table poisoned")
                .remove(&token);

            match outcome {
                Ok(report) => {
                    if report.cancelled {
                        warn!(agent_id = %report.agent_id(), run_id = %report.run_id(), "run cancelled");
                    }
                    let reports = inner.reports.lock().expect("report channel poisoned");
                    if let Some(tx) = reports.as_ref() {
                        // A closed receiver just means nobody is listening.
                        let _ = tx.send(report);
                    }
                }
                Err(e) => {
                    error!(agent_id = %agent.id, error = %e, "agent graph failed validation");
                }
            }
        });
    }
}
