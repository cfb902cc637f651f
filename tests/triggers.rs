mod common;

use agentloom::agents::Agent;
use agentloom::deps::{InMemoryDeps, StoreAction};
use agentloom::engine::WorkflowEngine;
use agentloom::event_bus::{ChatEvent, ChatEventKind, EventBus};
use agentloom::graphs::AgentGraphBuilder;
use agentloom::registry::ExecutorRegistry;
use agentloom::triggers::TriggerManager;
use common::SlowNode;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Full loop: bus event -> trigger -> script node -> store mutation.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn user_message_event_drives_a_store_mutation() {
    let deps = Arc::new(InMemoryDeps::new());
    let engine = WorkflowEngine::new(ExecutorRegistry::with_builtins(deps.clone()));
    let manager = TriggerManager::new(engine);

    manager.register_agent(
        Agent::new(
            "memo",
            AgentGraphBuilder::new()
                .node(
                    "remember",
                    "script",
                    json!({"source": r#"stores::set_chat_variable("last_message", input.message); true"#}),
                )
                .build(),
        )
        .on(ChatEventKind::AfterUserMessage),
    );
    let mut reports = manager.report_stream();

    let bus = EventBus::new();
    manager.attach(&bus);
    bus.emit(
        &ChatEvent::user(ChatEventKind::AfterUserMessage, "chat-1").with_message("note this down"),
    );

    let report = reports.recv().await.unwrap();
    assert_eq!(report.agent_id(), "memo");
    assert!(report.is_success());
    assert_eq!(
        deps.recorded_actions(),
        vec![StoreAction::SetChatVariable {
            name: "last_message".into(),
            value: json!("note this down"),
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_event_fans_out_to_every_matching_agent() {
    let registry = ExecutorRegistry::builder()
        .register(Arc::new(common::EchoNode))
        .build();
    let manager = TriggerManager::new(WorkflowEngine::new(registry));

    for id in ["a1", "a2"] {
        manager.register_agent(
            Agent::new(
                id,
                AgentGraphBuilder::new().node("only", "echo", json!({})).build(),
            )
            .on(ChatEventKind::AfterParticipantMessage),
        );
    }
    // This one listens to a different kind and must not fire.
    manager.register_agent(
        Agent::new(
            "bystander",
            AgentGraphBuilder::new().node("only", "echo", json!({})).build(),
        )
        .on(ChatEventKind::MessageCountChanged),
    );
    let mut reports = manager.report_stream();

    let bus = EventBus::new();
    manager.attach(&bus);
    bus.emit(&ChatEvent::user(
        ChatEventKind::AfterParticipantMessage,
        "chat-1",
    ));

    let mut fired = vec![
        reports.recv().await.unwrap().agent_id().to_string(),
        reports.recv().await.unwrap().agent_id().to_string(),
    ];
    fired.sort();
    assert_eq!(fired, vec!["a1", "a2"]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reports.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_agent_never_fires() {
    let registry = ExecutorRegistry::builder()
        .register(Arc::new(common::EchoNode))
        .build();
    let manager = TriggerManager::new(WorkflowEngine::new(registry));
    manager.register_agent(
        Agent::new(
            "off",
            AgentGraphBuilder::new().node("only", "echo", json!({})).build(),
        )
        .on(ChatEventKind::AfterUserMessage)
        .disabled(),
    );
    let mut reports = manager.report_stream();

    let bus = EventBus::new();
    manager.attach(&bus);
    bus.emit(&ChatEvent::user(ChatEventKind::AfterUserMessage, "chat-1"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reports.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_stops_in_flight_run_at_wavefront_boundary() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let registry = ExecutorRegistry::builder()
        .register(Arc::new(SlowNode {
            invocations: invocations.clone(),
        }))
        .build();
    let manager = TriggerManager::new(WorkflowEngine::new(registry));
    manager.register_agent(
        Agent::new(
            "sloth",
            AgentGraphBuilder::new()
                .node("first", "slow", json!({"millis": 150}))
                .node("second", "slow", json!({"millis": 150}))
                .edge("first", "second", "x")
                .build(),
        )
        .on(ChatEventKind::AfterUserMessage),
    );
    let mut reports = manager.report_stream();

    let bus = EventBus::new();
    manager.attach(&bus);
    bus.emit(&ChatEvent::user(ChatEventKind::AfterUserMessage, "chat-1"));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(manager.active_runs(), 1);
    manager.cancel("sloth");

    let report = reports.recv().await.unwrap();
    assert!(report.cancelled);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(manager.active_runs(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn removed_agent_no_longer_fires() {
    let registry = ExecutorRegistry::builder()
        .register(Arc::new(common::EchoNode))
        .build();
    let manager = TriggerManager::new(WorkflowEngine::new(registry));
    manager.register_agent(
        Agent::new(
            "gone",
            AgentGraphBuilder::new().node("only", "echo", json!({})).build(),
        )
        .on(ChatEventKind::AfterUserMessage),
    );
    assert_eq!(manager.agent_ids(), vec!["gone".to_string()]);
    manager.remove_agent("gone");
    let mut reports = manager.report_stream();

    let bus = EventBus::new();
    manager.attach(&bus);
    bus.emit(&ChatEvent::user(ChatEventKind::AfterUserMessage, "chat-1"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(reports.try_recv().is_err());
}
