//! `reqwest`-backed [`TaskApi`] implementation.

use std::time::Duration;

use serde::de::DeserializeOwned;
use taskflow_proto::codec;
use taskflow_proto::order::ReorderRequest;
use taskflow_proto::routes::{HEALTH_PATH, REORDER_PATH, TASKS_PATH, task_path};
use taskflow_proto::task::{NewTask, Task, TaskId, TaskPatch};

use super::{ApiError, TaskApi};

/// HTTP client for the task store.
///
/// `base_url` is the store origin (e.g. `http://localhost:8000`); the API
/// paths, trailing slashes included, are appended verbatim.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskApi {
    /// Creates a client with the HTTP client's default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` is not an absolute
    /// `http`/`https` URL.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::build(base_url, reqwest::Client::builder())
    }

    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if `base_url` is not usable.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Self::build(base_url, reqwest::Client::builder().timeout(timeout))
    }

    fn build(base_url: &str, builder: reqwest::ClientBuilder) -> Result<Self, ApiError> {
        let parsed =
            url::Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{base_url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the configured store origin.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Calls the store's health route.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the store is unreachable or unhealthy.
    pub async fn health(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .get(self.endpoint(HEALTH_PATH))
            .send()
            .await
            .map_err(transport)?;
        check_status(response)?;
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

/// Maps any non-2xx status to [`ApiError::Status`].
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(transport)?;
    codec::decode(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

impl TaskApi for HttpTaskApi {
    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(TASKS_PATH))
            .send()
            .await
            .map_err(transport)?;
        decode_body(check_status(response)?).await
    }

    async fn create(&self, task: &NewTask) -> Result<Task, ApiError> {
        let response = self
            .client
            .post(self.endpoint(TASKS_PATH))
            .json(task)
            .send()
            .await
            .map_err(transport)?;
        decode_body(check_status(response)?).await
    }

    async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        let response = self
            .client
            .patch(self.endpoint(&task_path(id)))
            .json(patch)
            .send()
            .await
            .map_err(transport)?;
        decode_body(check_status(response)?).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.endpoint(&task_path(id)))
            .send()
            .await
            .map_err(transport)?;
        check_status(response)?;
        Ok(())
    }

    async fn reorder(&self, request: &ReorderRequest) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.endpoint(REORDER_PATH))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        check_status(response)?;
        Ok(())
    }
}
