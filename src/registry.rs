//! Executor registry: the immutable tag-to-executor dispatch table.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::warn;

use crate::deps::WorkflowDeps;
use crate::executors::{InferenceExecutor, ScriptExecutor, StoreExecutor};
use crate::node::NodeExecutor;

/// Immutable map from node-type tag to executor.
///
/// Built once at process start and shared by reference thereafter; there is
/// no way to mutate a built registry, so dispatch is lock-free.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: Arc<FxHashMap<String, Arc<dyn NodeExecutor>>>,
}

impl ExecutorRegistry {
    #[must_use]
    pub fn builder() -> ExecutorRegistryBuilder {
        ExecutorRegistryBuilder::default()
    }

    /// Registry pre-loaded with the built-in executors (`script`,
    /// `inference`, `store`), all wired to the given capability bundle.
    #[must_use]
    pub fn with_builtins(deps: Arc<dyn WorkflowDeps>) -> Self {
        Self::builder()
            .register(Arc::new(ScriptExecutor::new(deps.clone())))
            .register(Arc::new(InferenceExecutor::new(deps.clone())))
            .register(Arc::new(StoreExecutor::new(deps)))
            .build()
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn NodeExecutor>> {
        self.executors.get(kind)
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.executors.contains_key(kind)
    }

    /// Registered type tags, unordered.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

/// Accumulates executors, consumed by [`build`](Self::build).
#[derive(Default)]
pub struct ExecutorRegistryBuilder {
    executors: FxHashMap<String, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistryBuilder {
    /// Register an executor under its [`kind`](NodeExecutor::kind) tag.
    ///
    /// A repeated tag replaces the earlier executor and logs a warning;
    /// registration happens at startup where a collision is a wiring bug.
    #[must_use]
    pub fn register(mut self, executor: Arc<dyn NodeExecutor>) -> Self {
        let kind = executor.kind();
        if self.executors.insert(kind.to_string(), executor).is_some() {
            warn!(%kind, "duplicate executor registration; replacing earlier one");
        }
        self
    }

    #[must_use]
    pub fn build(self) -> ExecutorRegistry {
        ExecutorRegistry {
            executors: Arc::new(self.executors),
        }
    }
}
