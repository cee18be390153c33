//! The task collection: optimistic mutation and reconciliation.
//!
//! Every operation suspends only on the store call. State is written in
//! short critical sections before and after that call, never across it, so
//! operations on different tasks interleave freely.

use parking_lot::Mutex;
use taskflow_proto::order::{ReorderRequest, array_move, renumber};
use taskflow_proto::task::{NewTask, Task, TaskId, TaskPatch};
use tokio::sync::watch;

use super::pending::ToggleLedger;
use super::{
    CREATE_FAILED, DELETE_FAILED, LOAD_FAILED, Outcome, REORDER_FAILED, REORDER_MISMATCH,
    Snapshot, UPDATE_FAILED,
};
use crate::api::TaskApi;

/// Times a fetch re-asks the store when local writes raced its answer.
const MAX_FETCH_ATTEMPTS: u32 = 3;

#[derive(Default)]
struct State {
    snapshot: Snapshot,
    toggles: ToggleLedger,
    /// Bumped by every fetch; only the latest fetch may land.
    fetch_generation: u64,
    /// Bumped whenever a toggle, edit or reorder changes the list. A fetch
    /// answer read under an older epoch may predate that change.
    mutation_epoch: u64,
    detached: bool,
}

/// What a fetch does once the store answered.
enum Landing {
    Settled(Outcome),
    Retry(u64),
}

impl State {
    fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.snapshot.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Replaces the list with `fresh`, keeping the optimistic `completed`
    /// of tasks whose toggle has not settled yet.
    fn replace_tasks(&mut self, mut fresh: Vec<Task>) {
        for task in &mut fresh {
            if self.toggles.is_pending(task.id) {
                if let Some(local) = self.snapshot.tasks.iter().find(|t| t.id == task.id) {
                    task.completed = local.completed;
                }
            }
        }
        self.snapshot.tasks = fresh;
    }

    fn fail(&mut self, message: &str) {
        self.snapshot.error = Some(message.to_string());
    }
}

/// Client-side mirror of the task store.
///
/// Holds the displayed list plus `loading` and `error`, and is the only
/// writer of them. Operations never return errors: failures are logged,
/// surfaced through [`Snapshot::error`], and reported as an [`Outcome`].
pub struct TaskCollection<A> {
    api: A,
    state: Mutex<State>,
    tx: watch::Sender<Snapshot>,
}

impl<A: TaskApi> TaskCollection<A> {
    /// Creates an empty, idle collection over `api`.
    #[must_use]
    pub fn new(api: A) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self {
            api,
            state: Mutex::new(State::default()),
            tx,
        }
    }

    /// The underlying API client.
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot.clone()
    }

    /// Receives a new [`Snapshot`] after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Stops all further state writes. Responses still in flight are
    /// dropped when they arrive.
    pub fn detach(&self) {
        self.state.lock().detached = true;
        tracing::debug!("task collection detached");
    }

    /// Returns `true` once [`detach`](Self::detach) has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    /// Clears the error message.
    pub fn clear_error(&self) {
        self.write(|state| state.snapshot.error = None);
    }

    /// Runs `f` against the state and publishes the result if it changed.
    ///
    /// Returns `None` without running `f` when detached.
    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if state.detached {
            return None;
        }
        let result = f(&mut state);
        let snapshot = &state.snapshot;
        self.tx.send_if_modified(|current| {
            if *current == *snapshot {
                false
            } else {
                current.clone_from(snapshot);
                true
            }
        });
        drop(state);
        Some(result)
    }

    /// Reloads the whole list from the store.
    ///
    /// On failure the previous list stays in place and the error is set.
    /// `loading` is cleared when the latest fetch settles.
    ///
    /// A toggle, edit or reorder applied while the request was out may be
    /// missing from the answer, so the list is asked for again instead. If
    /// local writes keep racing it, the local list is kept and the fetch
    /// reports [`Outcome::Superseded`].
    pub async fn fetch_all(&self) -> Outcome {
        let Some((generation, mut epoch)) = self.write(|state| {
            state.fetch_generation += 1;
            state.snapshot.loading = true;
            state.snapshot.error = None;
            (state.fetch_generation, state.mutation_epoch)
        }) else {
            return Outcome::Detached;
        };

        let mut attempt = 1;
        loop {
            let result = self.api.list().await;

            let landing = self.write(|state| {
                if state.fetch_generation != generation {
                    tracing::debug!(generation, "dropping stale task list");
                    return Landing::Settled(Outcome::Superseded);
                }
                if result.is_ok() && state.mutation_epoch != epoch {
                    if attempt < MAX_FETCH_ATTEMPTS {
                        tracing::debug!(attempt, "task list raced a local write; asking again");
                        return Landing::Retry(state.mutation_epoch);
                    }
                    tracing::warn!(attempt, "task list kept racing local writes; keeping local list");
                    state.snapshot.loading = false;
                    return Landing::Settled(Outcome::Superseded);
                }
                state.snapshot.loading = false;
                match result {
                    Ok(tasks) => {
                        tracing::debug!(count = tasks.len(), "task list loaded");
                        state.replace_tasks(tasks);
                        Landing::Settled(Outcome::Committed)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to load tasks");
                        state.fail(LOAD_FAILED);
                        Landing::Settled(Outcome::Failed)
                    }
                }
            });

            match landing {
                None => return Outcome::Detached,
                Some(Landing::Settled(outcome)) => return outcome,
                Some(Landing::Retry(current)) => {
                    epoch = current;
                    attempt += 1;
                }
            }
        }
    }

    /// Flips `completed` locally, then asks the store to persist it.
    ///
    /// The request carries the pre-toggle task with the new flag. A refusal
    /// sets the error and puts back the value of the newest toggle of the
    /// same task that was not refused, or the value before any of them.
    pub async fn toggle_complete(&self, id: TaskId) -> Outcome {
        let Some(started) = self.write(|state| {
            let task = state.snapshot.tasks.iter_mut().find(|t| t.id == id)?;
            let patch = TaskPatch {
                completed: Some(!task.completed),
                ..TaskPatch::from_task(task)
            };
            let pending = state.toggles.begin(task);
            state.mutation_epoch += 1;
            Some((pending, patch))
        }) else {
            return Outcome::Detached;
        };
        let Some((pending, patch)) = started else {
            tracing::debug!(task_id = %id, "toggle of unknown task ignored");
            return Outcome::Skipped;
        };

        let result = self.api.update(id, &patch).await;

        self.write(|state| {
            state.mutation_epoch += 1;
            match result {
                Ok(_) => state.toggles.commit(pending),
                Err(e) => {
                    tracing::warn!(task_id = %id, target = pending.target(), error = %e, "toggle refused");
                    state.fail(UPDATE_FAILED);
                    state.toggles.revert(pending, &mut state.snapshot.tasks)
                }
            }
        })
        .unwrap_or(Outcome::Detached)
    }

    /// Inline edit: sends the task merged with `changes` and applies the
    /// store's answer once confirmed.
    ///
    /// Nothing changes locally before confirmation; a refusal leaves the
    /// last confirmed values in place. The local `sort_order` is kept, and
    /// so is `completed` while a toggle of the task is in flight.
    pub async fn update_fields(&self, id: TaskId, changes: TaskPatch) -> Outcome {
        if let Err(e) = changes.validate() {
            return self
                .write(|state| {
                    state.fail(&e.to_string());
                    Outcome::Rejected
                })
                .unwrap_or(Outcome::Detached);
        }

        let body = {
            let state = self.state.lock();
            if state.detached {
                return Outcome::Detached;
            }
            state
                .snapshot
                .tasks
                .iter()
                .find(|t| t.id == id)
                .map(|task| TaskPatch::from_task(task).merged(&changes))
        };
        let Some(body) = body else {
            tracing::debug!(task_id = %id, "edit of unknown task ignored");
            return Outcome::Skipped;
        };

        let result = self.api.update(id, &body).await;

        self.write(|state| match result {
            Ok(confirmed) => {
                state.mutation_epoch += 1;
                let keep_completed = state.toggles.is_pending(id);
                if let Some(local) = state.task_mut(id) {
                    let sort_order = local.sort_order;
                    let completed = local.completed;
                    *local = confirmed;
                    local.sort_order = sort_order;
                    if keep_completed {
                        local.completed = completed;
                    }
                }
                Outcome::Committed
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "edit refused");
                state.fail(UPDATE_FAILED);
                Outcome::Failed
            }
        })
        .unwrap_or(Outcome::Detached)
    }

    /// Puts the list in the order of `order` and persists it as one batch.
    ///
    /// `order` must name every known task exactly once. The renumbered list
    /// is shown immediately; if the store refuses the batch, the list is
    /// reloaded from the store rather than patched back.
    pub async fn reorder(&self, order: &[TaskId]) -> Outcome {
        let Some(plan) = self.write(|state| plan_reorder(state, order)) else {
            return Outcome::Detached;
        };
        let request = match plan {
            Ok(request) => request,
            Err(outcome) => return outcome,
        };

        match self.api.reorder(&request).await {
            Ok(()) => self
                .write(|state| {
                    state.mutation_epoch += 1;
                    tracing::debug!(count = request.task_orders.len(), "reorder persisted");
                    Outcome::Committed
                })
                .unwrap_or(Outcome::Detached),
            Err(e) => {
                tracing::warn!(error = %e, "reorder refused; reloading");
                if self.fetch_all().await == Outcome::Detached {
                    return Outcome::Detached;
                }
                self.write(|state| {
                    state.fail(REORDER_FAILED);
                    Outcome::Resynced
                })
                .unwrap_or(Outcome::Detached)
            }
        }
    }

    /// Drag end: moves `active` to the position of `over`, then reorders.
    ///
    /// Dropping a task onto itself, or naming an unknown task, does nothing.
    pub async fn move_task(&self, active: TaskId, over: TaskId) -> Outcome {
        if active == over {
            return Outcome::Skipped;
        }
        let mut ids: Vec<TaskId> = self.snapshot().tasks.iter().map(|t| t.id).collect();
        let (Some(from), Some(to)) = (
            ids.iter().position(|id| *id == active),
            ids.iter().position(|id| *id == over),
        ) else {
            tracing::debug!(%active, %over, "move of unknown task ignored");
            return Outcome::Skipped;
        };
        array_move(&mut ids, from, to);
        self.reorder(&ids).await
    }

    /// Creates a task, then reloads the list.
    pub async fn create(&self, task: NewTask) -> Outcome {
        if let Err(e) = task.validate() {
            return self
                .write(|state| {
                    state.fail(&e.to_string());
                    Outcome::Rejected
                })
                .unwrap_or(Outcome::Detached);
        }
        match self.api.create(&task).await {
            Ok(created) => {
                tracing::info!(task_id = %created.id, "task created");
                self.after_list_change().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "create refused");
                self.write(|state| {
                    state.fail(CREATE_FAILED);
                    Outcome::Failed
                })
                .unwrap_or(Outcome::Detached)
            }
        }
    }

    /// Deletes a task, then reloads the list.
    pub async fn delete(&self, id: TaskId) -> Outcome {
        match self.api.delete(id).await {
            Ok(()) => {
                tracing::info!(task_id = %id, "task deleted");
                self.after_list_change().await
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "delete refused");
                self.write(|state| {
                    state.fail(DELETE_FAILED);
                    Outcome::Failed
                })
                .unwrap_or(Outcome::Detached)
            }
        }
    }

    /// The id set or numbering changed on the store; re-derive from it.
    async fn after_list_change(&self) -> Outcome {
        match self.fetch_all().await {
            Outcome::Detached => Outcome::Detached,
            _ => Outcome::Committed,
        }
    }
}

/// Validates `order` against the current list and applies it optimistically.
fn plan_reorder(state: &mut State, order: &[TaskId]) -> Result<ReorderRequest, Outcome> {
    let current = &state.snapshot.tasks;
    if current.len() < 2 {
        return Err(Outcome::Skipped);
    }

    let mut reordered = Vec::with_capacity(order.len());
    let mut seen = std::collections::HashSet::with_capacity(order.len());
    for id in order {
        match current.iter().find(|t| t.id == *id) {
            Some(task) if seen.insert(*id) => reordered.push(task.clone()),
            _ => {
                reordered.clear();
                break;
            }
        }
    }
    if reordered.len() != current.len() {
        tracing::warn!(
            expected = current.len(),
            given = order.len(),
            "reorder does not match the task list"
        );
        state.fail(REORDER_MISMATCH);
        return Err(Outcome::Rejected);
    }

    renumber(&mut reordered);
    if reordered == *current {
        return Err(Outcome::Skipped);
    }
    let request = ReorderRequest::from_sequence(&reordered);
    state.snapshot.tasks = reordered;
    state.mutation_epoch += 1;
    Ok(request)
}
