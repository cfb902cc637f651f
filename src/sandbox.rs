//! Embedded script sandbox for `script` nodes.
//!
//! Scripts run in an isolated [`rhai`] engine with no ambient authority:
//! besides the language built-ins, exactly four names are bound — `input`
//! (with `args` as an alias), `console`, `utils`, and `stores`. There is no
//! filesystem, network, or process access, and host mutation is limited to
//! the [`StoreAction`]s the script queues through `stores`.
//!
//! Evaluation is synchronous rhai, so it runs on the blocking pool and is
//! bounded both by an operation budget and a wall-clock deadline, enforced
//! through the engine's progress callback.

use miette::Diagnostic;
use rhai::{Dynamic, Engine, Module, Scope};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::deps::StoreAction;

/// Resource bounds applied to a single script evaluation.
#[derive(Clone, Copy, Debug)]
pub struct ScriptLimits {
    /// Wall-clock budget; evaluation is terminated once exceeded.
    pub deadline: Duration,
    /// Upper bound on engine operations, a backstop against tight loops
    /// that never yield to the progress callback's clock check.
    pub max_operations: u64,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(5),
            max_operations: 10_000_000,
        }
    }
}

/// Everything a successful evaluation produced.
#[derive(Clone, Debug, Default)]
pub struct ScriptOutcome {
    /// The script's final expression, converted to JSON.
    pub value: Value,
    /// Lines captured from `console::log`, in call order.
    pub logs: Vec<String>,
    /// Store mutations the script queued, in call order. The caller applies
    /// these only after the evaluation as a whole succeeded.
    pub actions: Vec<StoreAction>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum SandboxError {
    /// Parse error, runtime error, or limit termination inside the script.
    #[error("script evaluation failed: {0}")]
    #[diagnostic(code(agentloom::sandbox::eval))]
    Eval(String),

    #[error("script input is not representable in the sandbox: {0}")]
    #[diagnostic(code(agentloom::sandbox::input))]
    InputConversion(String),

    #[error("script result is not representable as JSON: {0}")]
    #[diagnostic(code(agentloom::sandbox::result))]
    ResultConversion(String),

    #[error("script task was cancelled or panicked")]
    #[diagnostic(code(agentloom::sandbox::join))]
    Join,
}

/// Factory for bounded script evaluations.
///
/// Engines are built per evaluation: the bound modules capture per-run
/// buffers (console lines, queued store actions), so nothing is shared
/// between scripts.
#[derive(Clone, Debug)]
pub struct ScriptSandbox {
    limits: ScriptLimits,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}

impl ScriptSandbox {
    #[must_use]
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    /// Evaluate `source` with `input` bound, on the blocking pool.
    pub async fn eval(&self, source: &str, input: Value) -> Result<ScriptOutcome, SandboxError> {
        let limits = self.limits;
        let source = source.to_owned();
        tokio::task::spawn_blocking(move || eval_blocking(&source, input, limits))
            .await
            .map_err(|_| SandboxError::Join)?
    }
}

fn eval_blocking(
    source: &str,
    input: Value,
    limits: ScriptLimits,
) -> Result<ScriptOutcome, SandboxError> {
    let logs: Arc<Mutex<Vec<String>>> = Arc::default();
    let actions: Arc<Mutex<Vec<StoreAction>>> = Arc::default();

    let mut engine = Engine::new();
    engine.set_strict_variables(true);
    engine.set_max_operations(limits.max_operations);

    let deadline = Instant::now() + limits.deadline;
    engine.on_progress(move |_ops| {
        if Instant::now() >= deadline {
            Some("wall-clock deadline exceeded".into())
        } else {
            None
        }
    });

    engine.register_static_module("console", console_module(logs.clone()).into());
    engine.register_static_module("utils", utils_module().into());
    engine.register_static_module("stores", stores_module(actions.clone()).into());

    let input = rhai::serde::to_dynamic(input)
        .map_err(|e| SandboxError::InputConversion(e.to_string()))?;
    let mut scope = Scope::new();
    scope.push_dynamic("input", input.clone());
    // `args` is a legacy alias kept for graphs authored before the rename.
    scope.push_dynamic("args", input);

    let result: Dynamic = engine
        .eval_with_scope(&mut scope, source)
        .map_err(|e| SandboxError::Eval(e.to_string()))?;
    let value: Value =
        rhai::serde::from_dynamic(&result).map_err(|e| SandboxError::ResultConversion(e.to_string()))?;

    let logs = std::mem::take(&mut *logs.lock().expect("log buffer poisoned"));
    let actions = std::mem::take(&mut *actions.lock().expect("action buffer poisoned"));
    debug!(logs = logs.len(), actions = actions.len(), "script evaluation complete");

    Ok(ScriptOutcome {
        value,
        logs,
        actions,
    })
}

fn console_module(logs: Arc<Mutex<Vec<String>>>) -> Module {
    let mut module = Module::new();
    for level in ["log", "info", "warn", "error"] {
        let sink = logs.clone();
        module.set_native_fn(level, move |value: Dynamic| {
            sink.lock().expect("log buffer poisoned").push(value.to_string());
            Ok(())
        });
    }
    module
}

fn utils_module() -> Module {
    let mut module = Module::new();
    // Malformed input yields unit (JSON null), never an error.
    module.set_native_fn("json_parse", |text: &str| {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                rhai::serde::to_dynamic(value).map_err(|e| format!("json_parse: {e}").into())
            }
            Err(_) => Ok(Dynamic::UNIT),
        }
    });
    module.set_native_fn("json_stringify", |value: Dynamic| {
        let value: Value = rhai::serde::from_dynamic(&value)
            .map_err(|e| format!("json_stringify: {e}"))?;
        serde_json::to_string(&value).map_err(|e| format!("json_stringify: {e}").into())
    });
    // Capped so a script cannot stretch its own deadline meaningfully.
    module.set_native_fn("delay", |millis: i64| {
        std::thread::sleep(Duration::from_millis(millis.clamp(0, 1_000) as u64));
        Ok(())
    });
    module
}

fn stores_module(actions: Arc<Mutex<Vec<StoreAction>>>) -> Module {
    let mut module = Module::new();

    let sink = actions.clone();
    module.set_native_fn(
        "append_chat_message",
        move |role: &str, content: &str| {
            sink.lock().expect("action buffer poisoned").push(
                StoreAction::AppendChatMessage {
                    chat_id: None,
                    role: role.to_string(),
                    content: content.to_string(),
                },
            );
            Ok(())
        },
    );

    let sink = actions.clone();
    module.set_native_fn("set_chat_variable", move |name: &str, value: Dynamic| {
        let value: Value = rhai::serde::from_dynamic(&value)
            .map_err(|e| format!("set_chat_variable: {e}"))?;
        sink.lock()
            .expect("action buffer poisoned")
            .push(StoreAction::SetChatVariable {
                name: name.to_string(),
                value,
            });
        Ok(())
    });

    let sink = actions.clone();
    module.set_native_fn(
        "update_character_field",
        move |character_id: &str, field: &str, value: Dynamic| {
            let value: Value = rhai::serde::from_dynamic(&value)
                .map_err(|e| format!("update_character_field: {e}"))?;
            sink.lock().expect("action buffer poisoned").push(
                StoreAction::UpdateCharacterField {
                    character_id: character_id.to_string(),
                    field: field.to_string(),
                    value,
                },
            );
            Ok(())
        },
    );

    let sink = actions.clone();
    module.set_native_fn(
        "upsert_lorebook_entry",
        move |lorebook_id: &str, key: &str, content: &str| {
            sink.lock().expect("action buffer poisoned").push(
                StoreAction::UpsertLorebookEntry {
                    lorebook_id: lorebook_id.to_string(),
                    key: key.to_string(),
                    content: content.to_string(),
                },
            );
            Ok(())
        },
    );

    module.set_native_fn("set_active_model", move |model_id: &str| {
        actions
            .lock()
            .expect("action buffer poisoned")
            .push(StoreAction::SetActiveModel {
                model_id: model_id.to_string(),
            });
        Ok(())
    });

    module
}
