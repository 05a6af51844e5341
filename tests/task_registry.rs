//! Task lifecycle: creation, listing, termination

use std::sync::Arc;
use std::time::Duration;

use ergon::core::{AgentConfig, ErgonError, HubConfig};
use ergon::events::{EventKind, EventPayload};
use ergon::llm::ScriptedProvider;
use ergon::task::{
    planning_agent_factory, reasoning_agent_factory, TaskId, TaskRegistry, TaskStatus,
    TerminateOutcome,
};
use serde_json::json;
use tokio::time::timeout;

fn quick_registry(answer: &str) -> TaskRegistry {
    let provider = Arc::new(ScriptedProvider::new().text(answer).repeat_last());
    TaskRegistry::new(
        reasoning_agent_factory(AgentConfig::default(), provider),
        HubConfig::default(),
    )
}

#[tokio::test]
async fn terminating_a_finished_task_changes_nothing() {
    let registry = quick_registry("done");
    let id = registry.create("hello").unwrap();
    assert_eq!(registry.wait(&id).await.unwrap(), TaskStatus::Completed);

    assert_eq!(
        registry.terminate(&id).unwrap(),
        TerminateOutcome::NotRunning
    );
    assert_eq!(registry.status(&id).unwrap(), TaskStatus::Completed);
    assert_eq!(registry.terminate_all(), 0);
}

#[tokio::test]
async fn terminating_a_running_task_ends_it_once() {
    let provider = ScriptedProvider::new()
        .tool_call("", "planning", json!({"command": "list"}))
        .repeat_last()
        .with_delay(Duration::from_secs(30));
    let registry = TaskRegistry::new(
        planning_agent_factory(AgentConfig::default(), Arc::new(provider)),
        HubConfig::default(),
    );

    let id = registry.create("slow work").unwrap();
    let mut events = registry.subscribe(&id, true).unwrap();

    // Wait until the first step has started
    let first = events.recv().await.unwrap();
    assert_eq!(first.kind(), EventKind::StatusChange);

    assert_eq!(
        registry.terminate(&id).unwrap(),
        TerminateOutcome::Terminated
    );
    let status = timeout(Duration::from_secs(5), registry.wait(&id))
        .await
        .expect("task did not stop after terminate")
        .unwrap();
    assert_eq!(status, TaskStatus::Terminated);
    assert_eq!(status.to_string(), "terminated");

    let history = registry.get(&id).unwrap().events;
    assert_eq!(history.iter().filter(|e| e.is_terminal()).count(), 1);
    match &history.last().unwrap().payload {
        EventPayload::Complete { terminated, .. } => assert!(terminated),
        other => panic!("unexpected payload {:?}", other),
    }

    // The live stream ends after the terminal event
    let rest = timeout(Duration::from_secs(5), events.collect_all())
        .await
        .unwrap();
    assert!(rest.last().unwrap().is_terminal());
}

#[tokio::test]
async fn list_is_newest_first() {
    let registry = quick_registry("ok");
    let first = registry.create("first").unwrap();
    let second = registry.create("second").unwrap();
    let third = registry.create("third").unwrap();

    let ids: Vec<TaskId> = registry.list().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![third, second, first]);
    assert_eq!(registry.len(), 3);

    let task = registry.get(&second).unwrap();
    assert_eq!(task.prompt, "second");
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let registry = quick_registry("ok");
    let id: TaskId = "00000000-0000-0000-0000-000000000000".parse().unwrap();

    assert!(matches!(registry.get(&id), Err(ErgonError::TaskNotFound(_))));
    assert!(matches!(
        registry.terminate(&id),
        Err(ErgonError::TaskNotFound(_))
    ));
    assert!(matches!(
        registry.subscribe(&id, true),
        Err(ErgonError::TaskNotFound(_))
    ));
    assert!(matches!(
        "not-a-uuid".parse::<TaskId>(),
        Err(ErgonError::TaskNotFound(_))
    ));
}

#[tokio::test]
async fn failed_run_reports_reason() {
    let provider = Arc::new(ScriptedProvider::new().fail("upstream down"));
    let config = AgentConfig {
        max_retries: 0,
        ..AgentConfig::default()
    };
    let registry = TaskRegistry::new(
        reasoning_agent_factory(config, provider),
        HubConfig::default(),
    );

    let id = registry.create("hello").unwrap();
    let status = registry.wait(&id).await.unwrap();

    assert!(matches!(status, TaskStatus::Failed(_)));
    assert_eq!(
        status.to_string(),
        "failed: Provider error: upstream down"
    );
}

#[tokio::test]
async fn late_subscriber_gets_full_replay() {
    let registry = quick_registry("42");
    let id = registry.create("meaning of life").unwrap();
    registry.wait(&id).await.unwrap();

    let replayed = registry.subscribe(&id, true).unwrap().collect_all().await;
    assert_eq!(replayed, registry.get(&id).unwrap().events);
    assert_eq!(replayed.last().unwrap().kind(), EventKind::Complete);

    let live_only = registry.subscribe(&id, false).unwrap().collect_all().await;
    assert!(live_only.is_empty());
}
