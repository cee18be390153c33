//! Client-side task collection state.
//!
//! [`TaskCollection`] is the single writer of the in-memory task list. It
//! applies optimistic changes for toggles and reorders, reconciles them with
//! the store's answers, and publishes every state change as a [`Snapshot`]
//! to subscribers.

pub mod collection;
pub mod pending;

pub use collection::TaskCollection;
pub use pending::{PendingToggle, ToggleLedger};

use taskflow_proto::task::Task;

/// Error shown when the list cannot be loaded.
pub const LOAD_FAILED: &str = "Failed to load tasks";
/// Error shown when a toggle or inline edit is refused.
pub const UPDATE_FAILED: &str = "Failed to update task";
/// Error shown when a reorder is refused and the list was reloaded.
pub const REORDER_FAILED: &str = "Failed to reorder tasks";
/// Error shown when a reorder does not name every known task exactly once.
pub const REORDER_MISMATCH: &str = "Reorder must list every task exactly once";
/// Error shown when a create is refused.
pub const CREATE_FAILED: &str = "Failed to create task";
/// Error shown when a delete is refused.
pub const DELETE_FAILED: &str = "Failed to delete task";

/// Observable state of the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Tasks in display order (ascending `sort_order`).
    pub tasks: Vec<Task>,
    /// A list fetch is in flight.
    pub loading: bool,
    /// Message of the most recent failure, if not cleared since.
    pub error: Option<String>,
}

impl Snapshot {
    /// Returns `true` if an error is being shown.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// How one operation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The store accepted the change and local state reflects it.
    Committed,
    /// The store refused the change and the optimistic edit was undone.
    Reverted,
    /// The store refused the change, but newer local state made the revert
    /// moot, or a newer fetch replaced this one's result.
    Superseded,
    /// The store refused a reorder and the list was reloaded from it.
    Resynced,
    /// Nothing to do: no state change and no network call.
    Skipped,
    /// Refused locally before any network call.
    Rejected,
    /// The store refused the change; local state was left untouched.
    Failed,
    /// The collection was detached; the response was dropped.
    Detached,
}
