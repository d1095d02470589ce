// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch extraction from the operation queue.
//!
//! Entries pulled from the queue but not yet handed to a worker sit in
//! `currently_executing`; they still count as "in the executor" so the
//! dedup in `enqueue` and targeted removal in `dequeue` cover them.

use crate::error::QueueError;
use crate::opqueue::{OperationQueue, QueueEntry};
use gavel_core::Operation;

/// Hard cap on the number of operations shipped to one worker at once.
pub const MAX_OPERATIONS_PER_BATCH: usize = 25;

#[derive(Default)]
pub struct EvaluationExecutor {
    queue: OperationQueue,
    currently_executing: Vec<QueueEntry>,
}

impl EvaluationExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the operation is queued or extracted-but-unassigned.
    pub fn contains(&self, operation: &Operation) -> bool {
        self.queue.contains(operation)
            || self.currently_executing.iter().any(|entry| &entry.operation == operation)
    }

    /// Push an entry; `false` if that operation is already queued.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        self.queue.push(entry)
    }

    /// Remove an operation from the queue, or from the extracted batch if
    /// it has already been pulled but not yet assigned.
    pub fn dequeue(&mut self, operation: &Operation) -> Result<(), QueueError> {
        if self.queue.remove(operation).is_some() {
            return Ok(());
        }
        if let Some(index) =
            self.currently_executing.iter().position(|entry| &entry.operation == operation)
        {
            self.currently_executing.remove(index);
            return Ok(());
        }
        Err(QueueError::NotQueued(operation.clone()))
    }

    /// Batch size: queue length spread over the fleet, at least 1, capped
    /// at [`MAX_OPERATIONS_PER_BATCH`].
    pub fn max_batch(&self, workers: usize) -> usize {
        let ratio = match workers {
            0 => 1,
            n => self.queue.len() / n + 1,
        };
        ratio.clamp(1, MAX_OPERATIONS_PER_BATCH)
    }

    /// Pull up to `max` entries into the extracted batch.
    pub fn take_batch(&mut self, max: usize) -> Vec<QueueEntry> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.queue.pop_first() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        self.currently_executing = batch.clone();
        batch
    }

    /// The extracted batch was assigned (or abandoned); forget it.
    pub fn clear_current(&mut self) {
        self.currently_executing.clear();
    }

    pub fn current(&self) -> &[QueueEntry] {
        &self.currently_executing
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter_queue(&self) -> impl Iterator<Item = &QueueEntry> {
        self.queue.iter()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
