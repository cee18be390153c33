//! Reorder consistency against an in-process task store.
//!
//! A successful reorder must survive a reload by a fresh client. A refused
//! reorder must leave the client showing exactly what the store holds.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use taskflow::api::{HttpTaskApi, TaskApi};
use taskflow::tasks::{Outcome, REORDER_FAILED, TaskCollection};
use taskflow_proto::order::{ReorderRequest, TaskOrder, is_settled};
use taskflow_proto::task::{NewTask, TaskId};
use taskflow_server::server::{ServerState, start_server_with_state};

async fn start_store() -> (String, Arc<ServerState>, tokio::task::JoinHandle<()>) {
    let state = Arc::new(ServerState::new());
    let (addr, handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start task store");
    (format!("http://{addr}"), state, handle)
}

/// Seeds the store with `titles` through the API and returns a loaded client.
async fn seeded(base_url: &str, titles: &[&str]) -> TaskCollection<HttpTaskApi> {
    let api = HttpTaskApi::new(base_url).unwrap();
    for title in titles {
        api.create(&NewTask::titled(*title)).await.unwrap();
    }
    let tasks = TaskCollection::new(api);
    assert_eq!(tasks.fetch_all().await, Outcome::Committed);
    tasks
}

fn titles<A: TaskApi>(tasks: &TaskCollection<A>) -> Vec<String> {
    tasks
        .snapshot()
        .tasks
        .iter()
        .map(|t| t.title.clone())
        .collect()
}

#[tokio::test]
async fn reorder_survives_reload() {
    let (base_url, _state, handle) = start_store().await;
    let tasks = seeded(&base_url, &["A", "B", "C"]).await;

    let order = [TaskId::new(3), TaskId::new(1), TaskId::new(2)];
    assert_eq!(tasks.reorder(&order).await, Outcome::Committed);
    assert_eq!(titles(&tasks), vec!["C", "A", "B"]);

    let fresh = seeded(&base_url, &[]).await;
    assert_eq!(titles(&fresh), vec!["C", "A", "B"]);
    assert!(is_settled(&fresh.snapshot().tasks));
    handle.abort();
}

#[tokio::test]
async fn drag_sequence_keeps_store_dense() {
    let (base_url, state, handle) = start_store().await;
    let tasks = seeded(&base_url, &["A", "B", "C", "D", "E"]).await;

    for (active, over) in [(1, 5), (3, 1), (5, 4), (2, 2), (4, 3)] {
        tasks
            .move_task(TaskId::new(active), TaskId::new(over))
            .await;
        assert_eq!(tasks.snapshot().tasks, state.store.list().await);
    }
    assert!(is_settled(&state.store.list().await));
    handle.abort();
}

#[tokio::test]
async fn refused_reorder_resyncs_to_store() {
    let (base_url, state, handle) = start_store().await;
    let tasks = seeded(&base_url, &["A", "B", "C"]).await;

    // Another client removes B; our list still shows it, so the batch
    // names an unknown id and the store refuses all of it.
    HttpTaskApi::new(&base_url)
        .unwrap()
        .delete(TaskId::new(2))
        .await
        .unwrap();

    let order = [TaskId::new(3), TaskId::new(2), TaskId::new(1)];
    assert_eq!(tasks.reorder(&order).await, Outcome::Resynced);

    let snapshot = tasks.snapshot();
    assert_eq!(snapshot.tasks, state.store.list().await);
    assert_eq!(titles(&tasks), vec!["A", "C"]);
    assert_eq!(snapshot.error.as_deref(), Some(REORDER_FAILED));
    assert!(!snapshot.loading);
    handle.abort();
}

#[tokio::test]
async fn partial_batch_is_rejected_atomically() {
    let (base_url, state, handle) = start_store().await;
    let api = HttpTaskApi::new(&base_url).unwrap();
    for title in ["A", "B"] {
        api.create(&NewTask::titled(title)).await.unwrap();
    }
    let before = state.store.list().await;

    let request = ReorderRequest {
        task_orders: vec![
            TaskOrder {
                id: TaskId::new(2),
                sort_order: 0,
            },
            TaskOrder {
                id: TaskId::new(99),
                sort_order: 1,
            },
        ],
    };
    let err = api.reorder(&request).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(state.store.list().await, before);
    handle.abort();
}
