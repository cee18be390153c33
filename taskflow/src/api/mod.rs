//! API client for the `TaskFlow` task store.
//!
//! Defines the [`TaskApi`] trait that every client implementation satisfies.
//! Concrete implementations include:
//! - [`http::HttpTaskApi`]: `reqwest`-backed client for the real store
//! - [`scripted::ScriptedApi`]: in-process store with scripted failures for testing
//!
//! Each operation is a single request/response mapping: no retries, no
//! caching. Any non-2xx status is an error regardless of body shape.

pub mod http;
pub mod scripted;

use taskflow_proto::order::ReorderRequest;
use taskflow_proto::task::{NewTask, Task, TaskId, TaskPatch};

pub use http::HttpTaskApi;
pub use scripted::ScriptedApi;

/// Errors that can occur during API operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The store answered with a non-success status.
    #[error("HTTP error! status: {status} {status_text}")]
    Status {
        /// Numeric HTTP status.
        status: u16,
        /// Canonical reason phrase.
        status_text: String,
    },

    /// The request never reached the store or the response never arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The configured base URL is not usable.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Returns the HTTP status if the store answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the store answered with an error status.
    #[must_use]
    pub const fn is_status(&self) -> bool {
        matches!(self, Self::Status { .. })
    }
}

/// Async client for the five task store operations.
pub trait TaskApi: Send + Sync {
    /// Fetch every task, ordered by ascending `sort_order` as the store returns them.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Task>, ApiError>> + Send;

    /// Create a task; the store fills `id`, `created_at` and `sort_order`.
    fn create(
        &self,
        task: &NewTask,
    ) -> impl std::future::Future<Output = Result<Task, ApiError>> + Send;

    /// Partially update a task and return it as persisted.
    fn update(
        &self,
        id: TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<Task, ApiError>> + Send;

    /// Delete a task. Fails if the id is unknown.
    fn delete(&self, id: TaskId) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    /// Apply a complete position mapping. The store commits it atomically.
    fn reorder(
        &self,
        request: &ReorderRequest,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}
