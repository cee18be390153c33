//! In-memory task table.
//!
//! The [`TaskStore`] owns the durable copy of every task. All mutations
//! take the single write lock, so a reorder batch is validated and applied
//! as one unit: either every `{id, sort_order}` pair lands or none does.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use taskflow_proto::order::TaskOrder;
use taskflow_proto::task::{NewTask, Task, TaskId, TaskPatch};
use tokio::sync::RwLock;

/// Errors returned by [`TaskStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No task with the given id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The request body failed validation.
    #[error("invalid request: {0}")]
    Invalid(String),
}

struct Table {
    tasks: HashMap<TaskId, Task>,
    next_id: i64,
}

impl Table {
    /// Tasks in display order: `sort_order`, then creation time, then id.
    fn ordered(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    fn next_sort_order(&self) -> i64 {
        self.tasks
            .values()
            .map(|t| t.sort_order)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Closes any gaps left in `sort_order`, keeping the current display order.
    fn compact(&mut self) {
        let order: Vec<TaskId> = self.ordered().iter().map(|t| t.id).collect();
        for (id, sort_order) in order.into_iter().zip(0_i64..) {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.sort_order = sort_order;
            }
        }
    }
}

/// Thread-safe task table with monotonically allocated ids.
pub struct TaskStore {
    table: RwLock<Table>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// Creates an empty store. The first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                tasks: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Returns every task in display order.
    pub async fn list(&self) -> Vec<Task> {
        self.table.read().await.ordered()
    }

    /// Returns one task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is unknown.
    pub async fn get(&self, id: TaskId) -> Result<Task, StoreError> {
        self.table
            .read()
            .await
            .tasks
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    /// Inserts a task at the end of the ordering.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the body fails validation.
    pub async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        new.validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let mut table = self.table.write().await;
        let id = TaskId::new(table.next_id);
        table.next_id += 1;
        let task = Task {
            id,
            title: new.title,
            description: new.description,
            priority: new.priority,
            completed: new.completed,
            sort_order: table.next_sort_order(),
            due_date: new.due_date,
            created_at: Some(Utc::now()),
        };
        table.tasks.insert(id, task.clone());
        drop(table);
        Ok(task)
    }

    /// Replaces every mutable field of a task (PUT semantics).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the body fails validation, or
    /// [`StoreError::NotFound`] if the id is unknown.
    pub async fn replace(&self, id: TaskId, body: NewTask) -> Result<Task, StoreError> {
        body.validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let mut table = self.table.write().await;
        let task = table.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        task.title = body.title;
        task.description = body.description;
        task.priority = body.priority;
        task.completed = body.completed;
        task.due_date = body.due_date;
        Ok(task.clone())
    }

    /// Applies a partial update (PATCH semantics).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the patch carries an invalid title,
    /// or [`StoreError::NotFound`] if the id is unknown.
    pub async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, StoreError> {
        patch
            .validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let mut table = self.table.write().await;
        let task = table.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    /// Removes a task and renumbers the rest so the ordering stays dense.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is unknown.
    pub async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        table.tasks.remove(&id).ok_or(StoreError::NotFound(id))?;
        table.compact();
        drop(table);
        Ok(())
    }

    /// Applies a batch of position updates atomically.
    ///
    /// The whole batch is checked before anything is written: every id must
    /// exist, appear once, and carry a non-negative position. Tasks absent
    /// from the batch keep their current position, and the positions after
    /// the batch must be exactly `0..n`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] describing the first bad entry, or a
    /// batch that would leave gaps or shared positions; the table is
    /// unchanged in that case.
    pub async fn reorder(&self, orders: &[TaskOrder]) -> Result<(), StoreError> {
        let mut table = self.table.write().await;

        let mut seen = HashSet::with_capacity(orders.len());
        for entry in orders {
            if !table.tasks.contains_key(&entry.id) {
                return Err(StoreError::Invalid(format!("unknown task id {}", entry.id)));
            }
            if !seen.insert(entry.id) {
                return Err(StoreError::Invalid(format!("duplicate task id {}", entry.id)));
            }
            if entry.sort_order < 0 {
                return Err(StoreError::Invalid(format!(
                    "negative sort_order for task {}",
                    entry.id
                )));
            }
        }

        let mut positions: HashMap<TaskId, i64> = table
            .tasks
            .values()
            .map(|t| (t.id, t.sort_order))
            .collect();
        positions.extend(orders.iter().map(|entry| (entry.id, entry.sort_order)));
        let mut resulting: Vec<i64> = positions.into_values().collect();
        resulting.sort_unstable();
        if !resulting.iter().zip(0_i64..).all(|(order, expected)| *order == expected) {
            return Err(StoreError::Invalid(
                "task_orders must leave positions 0..n with no gaps or repeats".to_string(),
            ));
        }

        for entry in orders {
            if let Some(task) = table.tasks.get_mut(&entry.id) {
                task.sort_order = entry.sort_order;
            }
        }
        drop(table);
        Ok(())
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.table.read().await.tasks.len()
    }

    /// Returns `true` if the store holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use taskflow_proto::order::is_settled;
    use taskflow_proto::task::Priority;

    async fn seeded(titles: &[&str]) -> TaskStore {
        let store = TaskStore::new();
        for title in titles {
            store.create(NewTask::titled(*title)).await.unwrap();
        }
        store
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[tokio::test]
    async fn create_appends_after_max() {
        let store = seeded(&["A", "B"]).await;
        let c = store.create(NewTask::titled("C")).await.unwrap();
        assert_eq!(c.sort_order, 2);
        assert_eq!(c.id, TaskId::new(3));
        assert!(c.created_at.is_some());
        assert!(!c.completed);
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let store = TaskStore::new();
        let err = store.create(NewTask::titled("  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn list_is_in_sort_order() {
        let store = seeded(&["A", "B", "C"]).await;
        let tasks = store.list().await;
        assert_eq!(titles(&tasks), vec!["A", "B", "C"]);
        assert!(is_settled(&tasks));
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let store = seeded(&["A", "B"]).await;
        store.delete(TaskId::new(2)).await.unwrap();
        let c = store.create(NewTask::titled("C")).await.unwrap();
        assert_eq!(c.id, TaskId::new(3));
    }

    #[tokio::test]
    async fn update_changes_only_patched_fields() {
        let store = seeded(&["A"]).await;
        let patch = TaskPatch {
            completed: Some(true),
            ..TaskPatch::default()
        };
        let task = store.update(TaskId::new(1), &patch).await.unwrap();
        assert!(task.completed);
        assert_eq!(task.title, "A");
        assert_eq!(task.sort_order, 0);
    }

    #[tokio::test]
    async fn update_with_null_due_date_clears_it() {
        let store = TaskStore::new();
        let mut body = NewTask::titled("A");
        body.due_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        let created = store.create(body).await.unwrap();

        let patch: TaskPatch = serde_json::from_str(r#"{"due_date": null}"#).unwrap();
        let task = store.update(created.id, &patch).await.unwrap();
        assert!(task.due_date.is_none());
        assert_eq!(task.title, "A");
    }

    #[tokio::test]
    async fn update_unknown_id_not_found() {
        let store = TaskStore::new();
        let err = store
            .update(TaskId::new(9), &TaskPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(TaskId::new(9)));
    }

    #[tokio::test]
    async fn replace_overwrites_mutable_fields() {
        let store = seeded(&["A"]).await;
        let body = NewTask {
            title: "Z".to_string(),
            description: "zz".to_string(),
            priority: Priority::Low,
            completed: true,
            due_date: None,
        };
        let task = store.replace(TaskId::new(1), body).await.unwrap();
        assert_eq!(task.title, "Z");
        assert_eq!(task.priority, Priority::Low);
        assert!(task.completed);
        assert_eq!(task.sort_order, 0);
    }

    #[tokio::test]
    async fn delete_closes_the_gap() {
        let store = seeded(&["A", "B", "C"]).await;
        store.delete(TaskId::new(2)).await.unwrap();
        let tasks = store.list().await;
        assert_eq!(titles(&tasks), vec!["A", "C"]);
        assert!(is_settled(&tasks));
    }

    #[tokio::test]
    async fn delete_unknown_id_not_found() {
        let store = TaskStore::new();
        assert_eq!(
            store.delete(TaskId::new(1)).await,
            Err(StoreError::NotFound(TaskId::new(1)))
        );
    }

    #[tokio::test]
    async fn reorder_applies_full_mapping() {
        let store = seeded(&["A", "B", "C"]).await;
        let orders = [
            TaskOrder { id: TaskId::new(3), sort_order: 0 },
            TaskOrder { id: TaskId::new(1), sort_order: 1 },
            TaskOrder { id: TaskId::new(2), sort_order: 2 },
        ];
        store.reorder(&orders).await.unwrap();
        assert_eq!(titles(&store.list().await), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn reorder_with_unknown_id_changes_nothing() {
        let store = seeded(&["A", "B", "C"]).await;
        let orders = [
            TaskOrder { id: TaskId::new(3), sort_order: 0 },
            TaskOrder { id: TaskId::new(1), sort_order: 1 },
            TaskOrder { id: TaskId::new(99), sort_order: 2 },
        ];
        let err = store.reorder(&orders).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(titles(&store.list().await), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn reorder_with_duplicate_id_changes_nothing() {
        let store = seeded(&["A", "B"]).await;
        let orders = [
            TaskOrder { id: TaskId::new(2), sort_order: 0 },
            TaskOrder { id: TaskId::new(2), sort_order: 1 },
        ];
        assert!(store.reorder(&orders).await.is_err());
        assert_eq!(titles(&store.list().await), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn reorder_with_shared_position_changes_nothing() {
        let store = seeded(&["A", "B", "C"]).await;
        let orders = [
            TaskOrder { id: TaskId::new(1), sort_order: 0 },
            TaskOrder { id: TaskId::new(2), sort_order: 0 },
        ];
        assert!(matches!(
            store.reorder(&orders).await,
            Err(StoreError::Invalid(_))
        ));
        let tasks = store.list().await;
        assert_eq!(titles(&tasks), vec!["A", "B", "C"]);
        assert!(is_settled(&tasks));
    }

    #[tokio::test]
    async fn reorder_past_the_end_changes_nothing() {
        let store = seeded(&["A", "B"]).await;
        let orders = [
            TaskOrder { id: TaskId::new(1), sort_order: 1 },
            TaskOrder { id: TaskId::new(2), sort_order: 5 },
        ];
        assert!(store.reorder(&orders).await.is_err());
        assert!(is_settled(&store.list().await));
    }

    #[tokio::test]
    async fn partial_batch_colliding_with_untouched_task_is_rejected() {
        let store = seeded(&["A", "B", "C"]).await;
        let orders = [TaskOrder { id: TaskId::new(3), sort_order: 0 }];
        assert!(store.reorder(&orders).await.is_err());
        assert_eq!(titles(&store.list().await), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn partial_swap_that_stays_dense_is_accepted() {
        let store = seeded(&["A", "B", "C"]).await;
        let orders = [
            TaskOrder { id: TaskId::new(1), sort_order: 2 },
            TaskOrder { id: TaskId::new(3), sort_order: 0 },
        ];
        store.reorder(&orders).await.unwrap();
        let tasks = store.list().await;
        assert_eq!(titles(&tasks), vec!["C", "B", "A"]);
        assert!(is_settled(&tasks));
    }

    #[tokio::test]
    async fn reorder_empty_batch_is_accepted() {
        let store = seeded(&["A"]).await;
        store.reorder(&[]).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
