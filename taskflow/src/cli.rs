//! Command-line presenter over [`TaskCollection`].
//!
//! Each command loads the list, dispatches one intent to the collection and
//! reports the settled state. Nothing here touches the list directly.

use std::fmt::Write as _;

use chrono::NaiveDate;
use taskflow_proto::task::{NewTask, Priority, Task, TaskId, TaskPatch};

use crate::api::{ApiError, TaskApi};
use crate::config::ConfigError;
use crate::tasks::{Outcome, Snapshot, TaskCollection};

/// Errors that end the CLI before or outside a task operation.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The API client could not be built or the store did not answer.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The operation settled with an error.
    #[error("{0}")]
    Operation(String),
}

/// One user intent.
#[derive(clap::Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum Command {
    /// Show every task in display order.
    #[default]
    List,

    /// Create a task.
    Add {
        /// Task title.
        title: String,
        /// Longer description.
        #[arg(short, long, default_value = "")]
        description: String,
        /// low, medium or high.
        #[arg(short, long, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Due date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Change a task's title, description, priority or due date.
    Edit {
        /// Task to edit.
        id: TaskId,
        /// New title.
        #[arg(short, long)]
        title: Option<String>,
        /// New description.
        #[arg(short, long)]
        description: Option<String>,
        /// New priority.
        #[arg(short, long)]
        priority: Option<Priority>,
        /// New due date (YYYY-MM-DD).
        #[arg(long, conflicts_with = "no_due")]
        due: Option<NaiveDate>,
        /// Remove the due date.
        #[arg(long)]
        no_due: bool,
    },

    /// Flip a task between open and completed.
    Toggle {
        /// Task to toggle.
        id: TaskId,
    },

    /// Delete a task.
    Delete {
        /// Task to delete.
        id: TaskId,
    },

    /// Drop a task onto another task's position.
    Move {
        /// Task being dragged.
        id: TaskId,
        /// Task it is dropped on.
        over: TaskId,
    },

    /// Put the tasks in the given order; every task must be listed once.
    Reorder {
        /// Task ids, first to last.
        #[arg(required = true, num_args = 1..)]
        ids: Vec<TaskId>,
    },

    /// Check that the store is reachable.
    Health,
}

/// Settled result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// How the operation settled.
    pub outcome: Outcome,
    /// State after it settled.
    pub snapshot: Snapshot,
}

impl Report {
    /// Converts a settled error into [`CliError::Operation`].
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Operation`] if the snapshot carries an error.
    pub fn into_result(self) -> Result<Snapshot, CliError> {
        match self.snapshot.error {
            Some(message) => Err(CliError::Operation(message)),
            None => Ok(self.snapshot),
        }
    }
}

/// Runs `command` against `tasks`.
///
/// The list is loaded first; if that fails the command is not attempted.
/// [`Command::Health`] is answered by the list round trip itself.
pub async fn run<A: TaskApi>(command: Command, tasks: &TaskCollection<A>) -> Report {
    let loaded = tasks.fetch_all().await;
    let outcome = if loaded == Outcome::Committed {
        dispatch(command, tasks).await.unwrap_or(loaded)
    } else {
        loaded
    };
    tracing::debug!(?outcome, "command settled");
    Report {
        outcome,
        snapshot: tasks.snapshot(),
    }
}

/// Returns `None` for commands that are complete once the list is loaded.
async fn dispatch<A: TaskApi>(command: Command, tasks: &TaskCollection<A>) -> Option<Outcome> {
    let outcome = match command {
        Command::List | Command::Health => return None,
        Command::Add {
            title,
            description,
            priority,
            due,
        } => {
            tasks
                .create(NewTask {
                    title,
                    description,
                    priority,
                    completed: false,
                    due_date: due,
                })
                .await
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
            due,
            no_due,
        } => {
            let changes = TaskPatch {
                title,
                description,
                priority,
                due_date: if no_due { Some(None) } else { due.map(Some) },
                ..TaskPatch::default()
            };
            if changes.is_empty() {
                return Some(Outcome::Skipped);
            }
            tasks.update_fields(id, changes).await
        }
        Command::Toggle { id } => tasks.toggle_complete(id).await,
        Command::Delete { id } => tasks.delete(id).await,
        Command::Move { id, over } => tasks.move_task(id, over).await,
        Command::Reorder { ids } => tasks.reorder(&ids).await,
    };
    Some(outcome)
}

/// One line per task: `[x] #3  (high)  Title`.
#[must_use]
pub fn format_task(task: &Task) -> String {
    let mark = if task.completed { 'x' } else { ' ' };
    let mut line = format!(
        "[{mark}] #{}  ({})  {}",
        task.id, task.priority, task.title
    );
    if let Some(due) = task.due_date {
        let _ = write!(line, "  due {due}");
    }
    line
}

/// The whole list, or a placeholder when it is empty.
#[must_use]
pub fn format_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    tasks.iter().map(format_task).collect::<Vec<_>>().join("\n")
}
