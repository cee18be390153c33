//! Compensating transitions for optimistic toggles.
//!
//! A toggle is `pending` from the moment the local flip is applied until the
//! store answers. It then settles as committed, or as refused. Every toggle
//! of a task joins that task's chain in the [`ToggleLedger`], in issue
//! order. When one is refused, the entry is set to the target of the newest
//! toggle in the chain that was not refused, or to the value the task had
//! before the chain started. A chain is dropped once none of its toggles
//! are pending.

use std::collections::HashMap;

use taskflow_proto::task::{Task, TaskId};

use super::Outcome;

/// One in-flight completion toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingToggle {
    id: TaskId,
    seq: u64,
    target: bool,
}

impl PendingToggle {
    /// Task this toggle targets.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Value the store was asked to persist.
    #[must_use]
    pub const fn target(&self) -> bool {
        self.target
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pending,
    Accepted,
    Refused,
}

#[derive(Debug)]
struct Step {
    seq: u64,
    target: bool,
    verdict: Verdict,
}

#[derive(Debug)]
struct Chain {
    /// `completed` before the first toggle of the chain.
    base: bool,
    steps: Vec<Step>,
}

impl Chain {
    fn settle(&mut self, seq: u64, verdict: Verdict) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.seq == seq) {
            step.verdict = verdict;
        }
    }

    /// Value the entry should show given the verdicts so far.
    fn effective(&self) -> bool {
        self.steps
            .iter()
            .rev()
            .find(|s| s.verdict != Verdict::Refused)
            .map_or(self.base, |s| s.target)
    }

    fn is_open(&self) -> bool {
        self.steps.iter().any(|s| s.verdict == Verdict::Pending)
    }
}

/// Toggle chains per task, ordered by issue.
#[derive(Debug, Default)]
pub struct ToggleLedger {
    chains: HashMap<TaskId, Chain>,
    next_seq: u64,
}

impl ToggleLedger {
    /// Flips `task.completed` and records the toggle.
    pub fn begin(&mut self, task: &mut Task) -> PendingToggle {
        self.next_seq += 1;
        let pending = PendingToggle {
            id: task.id,
            seq: self.next_seq,
            target: !task.completed,
        };
        let chain = self.chains.entry(task.id).or_insert_with(|| Chain {
            base: task.completed,
            steps: Vec::new(),
        });
        chain.steps.push(Step {
            seq: pending.seq,
            target: pending.target,
            verdict: Verdict::Pending,
        });
        task.completed = pending.target;
        pending
    }

    /// Returns `true` while any toggle of `id` awaits an answer.
    #[must_use]
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.chains.contains_key(&id)
    }

    /// The store accepted the toggle; local state already reflects it.
    pub fn commit(&mut self, pending: PendingToggle) -> Outcome {
        self.settle(pending, Verdict::Accepted);
        Outcome::Committed
    }

    /// The store refused the toggle.
    ///
    /// Returns [`Outcome::Reverted`] when the entry had to change, and
    /// [`Outcome::Superseded`] when a newer toggle already shows the right
    /// value or the entry is gone.
    pub fn revert(&mut self, pending: PendingToggle, tasks: &mut [Task]) -> Outcome {
        let Some(effective) = self.settle(pending, Verdict::Refused) else {
            return Outcome::Superseded;
        };
        match tasks.iter_mut().find(|t| t.id == pending.id) {
            Some(task) if task.completed != effective => {
                task.completed = effective;
                Outcome::Reverted
            }
            _ => Outcome::Superseded,
        }
    }

    /// Records the verdict and returns the value the entry should now show.
    fn settle(&mut self, pending: PendingToggle, verdict: Verdict) -> Option<bool> {
        let chain = self.chains.get_mut(&pending.id)?;
        chain.settle(pending.seq, verdict);
        let effective = chain.effective();
        if !chain.is_open() {
            self.chains.remove(&pending.id);
        }
        Some(effective)
    }
}
