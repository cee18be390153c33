//! HTTP surface of the task store: routes, handlers and error mapping.
//!
//! Every path keeps its trailing slash. Bodies are JSON. Validation failures
//! (including malformed JSON) answer 400, unknown ids answer 404, and both
//! carry a `{"detail": ...}` body.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use taskflow_proto::order::ReorderRequest;
use taskflow_proto::routes::{HEALTH_PATH, REORDER_PATH, TASKS_PATH};
use taskflow_proto::task::{NewTask, Task, TaskId, TaskPatch};
use tower_http::trace::TraceLayer;

use crate::store::{StoreError, TaskStore};

/// Default maximum accepted request body size in bytes (64 KB).
const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024;

/// Shared server state.
pub struct ServerState {
    /// The task table.
    pub store: TaskStore,
    /// Maximum accepted request body size in bytes.
    max_body_size: usize,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates a state with an empty store and the default body limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: TaskStore::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Creates a state with a custom body limit and a pre-filled store.
    #[must_use]
    pub const fn with_config(max_body_size: usize, store: TaskStore) -> Self {
        Self {
            store,
            max_body_size,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Unwraps a JSON body, turning any rejection into a 400.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, StoreError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| StoreError::Invalid(e.body_text()))
}

/// Builds the router over the given state.
pub fn router(state: Arc<ServerState>) -> Router {
    let item_path = format!("{TASKS_PATH}{{id}}/");
    let max_body_size = state.max_body_size;
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(TASKS_PATH, get(list_tasks).post(create_task))
        .route(REORDER_PATH, axum::routing::post(reorder_tasks))
        .route(
            &item_path,
            get(get_task)
                .put(replace_task)
                .patch(update_task)
                .delete(delete_task),
        )
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_tasks(State(state): State<Arc<ServerState>>) -> Json<Vec<Task>> {
    let tasks = state.store.list().await;
    tracing::debug!(count = tasks.len(), "listing tasks");
    Json(tasks)
}

async fn create_task(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), StoreError> {
    let task = state.store.create(body(payload)?).await?;
    tracing::info!(task_id = %task.id, sort_order = task.sort_order, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, StoreError> {
    Ok(Json(state.store.get(TaskId::new(id)).await?))
}

async fn replace_task(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<Json<Task>, StoreError> {
    let task = state.store.replace(TaskId::new(id), body(payload)?).await?;
    tracing::info!(task_id = %task.id, "task replaced");
    Ok(Json(task))
}

async fn update_task(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, StoreError> {
    let patch = body(payload)?;
    let task = state.store.update(TaskId::new(id), &patch).await?;
    tracing::info!(task_id = %task.id, completed = task.completed, "task updated");
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StoreError> {
    let id = TaskId::new(id);
    state.store.delete(id).await?;
    tracing::info!(task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_tasks(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, StoreError> {
    let request = body(payload)?;
    if let Err(e) = state.store.reorder(&request.task_orders).await {
        tracing::warn!(count = request.task_orders.len(), error = %e, "reorder rejected");
        return Err(e);
    }
    tracing::info!(count = request.task_orders.len(), "tasks reordered");
    Ok(Json(json!({ "status": "success" })))
}

/// Starts the task store on the given address with a fresh state.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ServerState::new())).await
}

/// Starts the task store with a pre-configured [`ServerState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "task store server error");
        }
    });

    Ok((bound_addr, handle))
}
