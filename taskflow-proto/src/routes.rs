//! HTTP paths of the `TaskFlow` API. Every path keeps its trailing slash.

use crate::task::TaskId;

/// Collection route: list (GET) and create (POST).
pub const TASKS_PATH: &str = "/api/tasks/";

/// Bulk reorder route (POST).
pub const REORDER_PATH: &str = "/api/tasks/reorder/";

/// Liveness check (GET).
pub const HEALTH_PATH: &str = "/api/health/";

/// Item route: retrieve, replace, update and delete for one task.
#[must_use]
pub fn task_path(id: TaskId) -> String {
    format!("{TASKS_PATH}{id}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_path_has_trailing_slash() {
        assert_eq!(task_path(TaskId::new(42)), "/api/tasks/42/");
    }
}
