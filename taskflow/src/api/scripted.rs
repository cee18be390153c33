//! Scripted in-process task store for testing.
//!
//! [`ScriptedApi`] keeps its own "server-side" task table and records every
//! call it receives. Failures can be queued per operation with
//! [`fail_next`](ScriptedApi::fail_next), and a single call can be parked
//! with [`hold_next`](ScriptedApi::hold_next) until the test decides its
//! verdict through the returned [`Gate`]. This makes out-of-order network
//! completions reproducible without timers.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use taskflow_proto::order::{ReorderRequest, renumber};
use taskflow_proto::task::{NewTask, Task, TaskId, TaskPatch};
use tokio::sync::oneshot;

use super::{ApiError, TaskApi};

/// The five store operations, used to target scripted failures and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `list`
    List,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `reorder`
    Reorder,
}

/// A call received by the scripted store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list()`
    List,
    /// `create(body)`
    Create(NewTask),
    /// `update(id, patch)`
    Update(TaskId, TaskPatch),
    /// `delete(id)`
    Delete(TaskId),
    /// `reorder(batch)`
    Reorder(ReorderRequest),
}

impl Call {
    const fn op(&self) -> Op {
        match self {
            Self::List => Op::List,
            Self::Create(_) => Op::Create,
            Self::Update(..) => Op::Update,
            Self::Delete(_) => Op::Delete,
            Self::Reorder(_) => Op::Reorder,
        }
    }
}

/// How a held call should complete.
#[derive(Debug)]
enum Verdict {
    Succeed,
    Fail(ApiError),
}

/// Releases one held call. Dropping the gate fails the call.
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<Verdict>,
}

impl Gate {
    /// Lets the held call reach the store and succeed.
    pub fn succeed(self) {
        let _ = self.tx.send(Verdict::Succeed);
    }

    /// Fails the held call with a 503 without touching the store.
    pub fn fail(self) {
        let _ = self.tx.send(Verdict::Fail(unavailable()));
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        status_text: "Service Unavailable".to_string(),
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: 404,
        status_text: "Not Found".to_string(),
    }
}

fn bad_request() -> ApiError {
    ApiError::Status {
        status: 400,
        status_text: "Bad Request".to_string(),
    }
}

#[derive(Default)]
struct Script {
    tasks: Vec<Task>,
    next_id: i64,
    failures: HashMap<Op, VecDeque<ApiError>>,
    holds: HashMap<Op, VecDeque<oneshot::Receiver<Verdict>>>,
    calls: Vec<Call>,
}

/// In-process [`TaskApi`] with a scriptable store behind it.
pub struct ScriptedApi {
    script: Mutex<Script>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApi {
    /// Creates an empty store. The first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                next_id: 1,
                ..Script::default()
            }),
        }
    }

    /// Creates a store holding `tasks`; ids continue after the largest one.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let api = Self::new();
        api.set_server_tasks(tasks);
        api
    }

    /// Replaces what the store holds, bypassing the API.
    pub fn set_server_tasks(&self, mut tasks: Vec<Task>) {
        tasks.sort_by_key(|t| t.sort_order);
        let mut script = self.script.lock();
        script.next_id = script
            .next_id
            .max(tasks.iter().map(|t| t.id.get() + 1).max().unwrap_or(1));
        script.tasks = tasks;
    }

    /// What the store currently holds, in `sort_order`.
    #[must_use]
    pub fn server_tasks(&self) -> Vec<Task> {
        self.script.lock().tasks.clone()
    }

    /// Makes the next call of `op` fail with a 503.
    pub fn fail_next(&self, op: Op) {
        self.fail_next_with(op, unavailable());
    }

    /// Makes the next call of `op` fail with `error`.
    pub fn fail_next_with(&self, op: Op, error: ApiError) {
        self.script
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Parks the next call of `op` until the returned gate is released.
    pub fn hold_next(&self, op: Op) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.script.lock().holds.entry(op).or_default().push_back(rx);
        Gate { tx }
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    /// Number of calls received for `op`.
    #[must_use]
    pub fn call_count(&self, op: Op) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    /// Records the call and decides whether it may proceed.
    async fn admit(&self, call: Call) -> Result<(), ApiError> {
        let op = call.op();
        let hold = {
            let mut script = self.script.lock();
            script.calls.push(call);
            script.holds.get_mut(&op).and_then(VecDeque::pop_front)
        };
        if let Some(rx) = hold {
            return match rx.await {
                Ok(Verdict::Succeed) => Ok(()),
                Ok(Verdict::Fail(e)) => Err(e),
                Err(_) => Err(unavailable()),
            };
        }
        let failure = self
            .script
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        failure.map_or(Ok(()), Err)
    }
}

impl TaskApi for ScriptedApi {
    async fn list(&self) -> Result<Vec<Task>, ApiError> {
        // The answer is what the table held when the request arrived, so a
        // held list returns data that may be stale by the time it is released.
        let tasks = self.server_tasks();
        self.admit(Call::List).await?;
        Ok(tasks)
    }

    async fn create(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.admit(Call::Create(task.clone())).await?;
        if task.validate().is_err() {
            return Err(bad_request());
        }
        let mut script = self.script.lock();
        let id = TaskId::new(script.next_id);
        script.next_id += 1;
        let sort_order = script
            .tasks
            .iter()
            .map(|t| t.sort_order)
            .max()
            .map_or(0, |max| max + 1);
        let created = Task {
            id,
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            completed: task.completed,
            sort_order,
            due_date: task.due_date,
            created_at: None,
        };
        script.tasks.push(created.clone());
        drop(script);
        Ok(created)
    }

    async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        self.admit(Call::Update(id, patch.clone())).await?;
        let mut script = self.script.lock();
        let task = script
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(not_found)?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn delete(&self, id: TaskId) -> Result<(), ApiError> {
        self.admit(Call::Delete(id)).await?;
        let mut script = self.script.lock();
        let before = script.tasks.len();
        script.tasks.retain(|t| t.id != id);
        if script.tasks.len() == before {
            return Err(not_found());
        }
        renumber(&mut script.tasks);
        drop(script);
        Ok(())
    }

    async fn reorder(&self, request: &ReorderRequest) -> Result<(), ApiError> {
        self.admit(Call::Reorder(request.clone())).await?;
        let mut script = self.script.lock();
        if request
            .task_orders
            .iter()
            .any(|entry| !script.tasks.iter().any(|t| t.id == entry.id))
        {
            return Err(bad_request());
        }
        let mut resulting: Vec<i64> = script
            .tasks
            .iter()
            .map(|task| {
                request
                    .task_orders
                    .iter()
                    .find(|entry| entry.id == task.id)
                    .map_or(task.sort_order, |entry| entry.sort_order)
            })
            .collect();
        resulting.sort_unstable();
        if !resulting.iter().zip(0_i64..).all(|(order, expected)| *order == expected) {
            return Err(bad_request());
        }
        for entry in &request.task_orders {
            if let Some(task) = script.tasks.iter_mut().find(|t| t.id == entry.id) {
                task.sort_order = entry.sort_order;
            }
        }
        script.tasks.sort_by_key(|t| t.sort_order);
        drop(script);
        Ok(())
    }
}
