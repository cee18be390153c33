//! End-to-end task lifecycle against an in-process task store.
//!
//! Drives `HttpTaskApi` and `TaskCollection` through create, toggle, edit
//! and delete, checking the client mirror against what the store holds.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use taskflow::api::{ApiError, HttpTaskApi, TaskApi};
use taskflow::tasks::{Outcome, TaskCollection};
use taskflow_proto::order::is_settled;
use taskflow_proto::task::{NewTask, Priority, TaskId, TaskPatch};
use taskflow_server::server::{ServerState, start_server_with_state};

/// Starts a store on an ephemeral port and returns its origin.
async fn start_store() -> (String, Arc<ServerState>, tokio::task::JoinHandle<()>) {
    let state = Arc::new(ServerState::new());
    let (addr, handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start task store");
    (format!("http://{addr}"), state, handle)
}

async fn collection(base_url: &str) -> TaskCollection<HttpTaskApi> {
    let tasks = TaskCollection::new(HttpTaskApi::new(base_url).expect("valid base url"));
    assert_eq!(tasks.fetch_all().await, Outcome::Committed);
    tasks
}

#[tokio::test]
async fn health_route_answers() {
    let (base_url, _state, handle) = start_store().await;
    let api = HttpTaskApi::new(&base_url).unwrap();
    api.health().await.expect("store should be healthy");
    handle.abort();
}

#[tokio::test]
async fn create_assigns_ids_and_appends() {
    let (base_url, _state, handle) = start_store().await;
    let tasks = collection(&base_url).await;
    assert!(tasks.snapshot().tasks.is_empty());

    for title in ["Plan sprint", "Review PR", "Ship release"] {
        assert_eq!(tasks.create(NewTask::titled(title)).await, Outcome::Committed);
    }

    let snapshot = tasks.snapshot();
    let ids: Vec<i64> = snapshot.tasks.iter().map(|t| t.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(is_settled(&snapshot.tasks));
    assert!(snapshot.tasks.iter().all(|t| t.created_at.is_some()));
    assert!(snapshot.tasks.iter().all(|t| t.priority == Priority::Medium));
    handle.abort();
}

#[tokio::test]
async fn toggle_persists_completion() {
    let (base_url, state, handle) = start_store().await;
    let tasks = collection(&base_url).await;
    tasks.create(NewTask::titled("Water plants")).await;
    let id = tasks.snapshot().tasks[0].id;

    assert_eq!(tasks.toggle_complete(id).await, Outcome::Committed);
    assert!(tasks.snapshot().tasks[0].completed);
    assert!(state.store.get(id).await.unwrap().completed);

    assert_eq!(tasks.toggle_complete(id).await, Outcome::Committed);
    assert!(!state.store.get(id).await.unwrap().completed);
    handle.abort();
}

#[tokio::test]
async fn toggle_of_task_deleted_elsewhere_reverts() {
    let (base_url, state, handle) = start_store().await;
    let tasks = collection(&base_url).await;
    tasks.create(NewTask::titled("Water plants")).await;
    let id = tasks.snapshot().tasks[0].id;

    state.store.delete(id).await.unwrap();

    assert_eq!(tasks.toggle_complete(id).await, Outcome::Reverted);
    let snapshot = tasks.snapshot();
    assert!(!snapshot.tasks[0].completed);
    assert_eq!(snapshot.error.as_deref(), Some("Failed to update task"));
    handle.abort();
}

#[tokio::test]
async fn edit_applies_confirmed_fields() {
    let (base_url, state, handle) = start_store().await;
    let tasks = collection(&base_url).await;
    tasks.create(NewTask::titled("Draft")).await;
    tasks.create(NewTask::titled("Other")).await;
    let id = tasks.snapshot().tasks[1].id;

    let changes = TaskPatch {
        title: Some("Final".to_string()),
        priority: Some(Priority::High),
        ..TaskPatch::default()
    };
    assert_eq!(tasks.update_fields(id, changes).await, Outcome::Committed);

    let local = tasks.snapshot().tasks[1].clone();
    assert_eq!(local.title, "Final");
    assert_eq!(local.priority, Priority::High);
    assert_eq!(local.sort_order, 1);
    assert_eq!(state.store.get(id).await.unwrap(), local);
    handle.abort();
}

#[tokio::test]
async fn delete_closes_the_gap() {
    let (base_url, _state, handle) = start_store().await;
    let tasks = collection(&base_url).await;
    for title in ["A", "B", "C", "D"] {
        tasks.create(NewTask::titled(title)).await;
    }

    assert_eq!(tasks.delete(TaskId::new(2)).await, Outcome::Committed);

    let snapshot = tasks.snapshot();
    let titles: Vec<&str> = snapshot.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "C", "D"]);
    assert!(is_settled(&snapshot.tasks));

    // Ids are never reused.
    tasks.create(NewTask::titled("E")).await;
    assert_eq!(tasks.snapshot().tasks[3].id, TaskId::new(5));
    handle.abort();
}

#[tokio::test]
async fn delete_of_unknown_task_sets_error() {
    let (base_url, _state, handle) = start_store().await;
    let tasks = collection(&base_url).await;
    assert_eq!(tasks.delete(TaskId::new(42)).await, Outcome::Failed);
    assert_eq!(
        tasks.snapshot().error.as_deref(),
        Some("Failed to delete task")
    );
    handle.abort();
}

#[tokio::test]
async fn api_errors_carry_status() {
    let (base_url, _state, handle) = start_store().await;
    let api = HttpTaskApi::new(&base_url).unwrap();

    let err = api.delete(TaskId::new(7)).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "HTTP error! status: 404 Not Found");

    let err = api.create(&NewTask::titled("  ")).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Status {
            status: 400,
            status_text: "Bad Request".to_string()
        }
    );
    handle.abort();
}
