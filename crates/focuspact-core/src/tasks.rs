//! Deferred, fire-and-forget work scheduled after a mutation commits.
//!
//! There is no delivery guarantee: a task that fails is logged and
//! dropped, never retried. That is acceptable because every task is an
//! idempotent recomputation from current ledger state, and the periodic
//! reconciliation sweep re-derives the same result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::identity::UserId;

/// Work enqueued after a session write commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferredTask {
    /// Re-run the challenge evaluator for a user.
    EvaluateChallenges { user_id: UserId },
    /// Recompute pact daily progress for the day a session landed on,
    /// then re-check pact transitions.
    RefreshPactProgress { user_id: UserId, date: NaiveDate },
}

/// FIFO queue of deferred tasks.
///
/// Ordering between tasks is not part of the contract; consumers must
/// tolerate any interleaving.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<DeferredTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: DeferredTask) {
        self.queue.push_back(task);
    }

    pub fn pop(&mut self) -> Option<DeferredTask> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
