//! Display ordering: the bulk reorder body and the dense-sequence helpers.
//!
//! At rest, the `sort_order` values of all known tasks form exactly
//! `0..n` with no gaps or duplicates. Individual field edits never touch
//! `sort_order`; only reorder (and the store's post-delete renumbering)
//! do.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// One `{id, sort_order}` pair of a reorder batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOrder {
    /// Task being positioned.
    pub id: TaskId,
    /// Its new position.
    pub sort_order: i64,
}

/// Body of `POST /api/tasks/reorder/`. The store applies it atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    /// The complete new mapping.
    #[serde(default)]
    pub task_orders: Vec<TaskOrder>,
}

impl ReorderRequest {
    /// Builds the batch from tasks already in their new order, numbering
    /// them by index.
    #[must_use]
    pub fn from_sequence(tasks: &[Task]) -> Self {
        Self {
            task_orders: tasks
                .iter()
                .zip(0_i64..)
                .map(|(task, sort_order)| TaskOrder {
                    id: task.id,
                    sort_order,
                })
                .collect(),
        }
    }
}

/// Returns `true` if the `sort_order` values are exactly `0..tasks.len()`.
#[must_use]
pub fn is_dense(tasks: &[Task]) -> bool {
    let mut orders: Vec<i64> = tasks.iter().map(|t| t.sort_order).collect();
    orders.sort_unstable();
    orders.iter().zip(0_i64..).all(|(order, expected)| *order == expected)
}

/// Sets every task's `sort_order` to its index in the slice.
pub fn renumber(tasks: &mut [Task]) {
    for (task, sort_order) in tasks.iter_mut().zip(0_i64..) {
        task.sort_order = sort_order;
    }
}

/// Returns `true` if the slice is in ascending `sort_order` and dense.
#[must_use]
pub fn is_settled(tasks: &[Task]) -> bool {
    tasks
        .iter()
        .zip(0_i64..)
        .all(|(task, expected)| task.sort_order == expected)
}

/// Moves the element at `from` to `to`, shifting the elements in between.
///
/// Indices past the end are clamped; a no-op when `from == to`.
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if items.is_empty() || from == to || from >= items.len() {
        return;
    }
    let to = to.min(items.len() - 1);
    let item = items.remove(from);
    items.insert(to, item);
}
