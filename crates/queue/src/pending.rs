// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Staging area for worker results awaiting persistence.
//!
//! A result is pending from the moment it returns from a worker until
//! EvaluationService confirms the write: first in `results` (not yet sent)
//! then in `writes` (sent, unconfirmed). An operation in either set must
//! not be re-enqueued.

use crate::error::PendingError;
use crate::event::Event;
use chrono::{DateTime, Utc};
use gavel_core::{Job, Operation, Priority};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// A worker result plus the scheduling side-data needed to re-enqueue the
/// operation if the write fails.
#[derive(Debug, Clone)]
pub struct StagedResult {
    pub job: Job,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    results: HashMap<Operation, StagedResult>,
    writes: HashSet<Operation>,
}

/// Two disjoint sets over operation identity, guarding a wake-up event
/// for the result dispatcher.
#[derive(Default)]
pub struct PendingResults {
    inner: Mutex<Inner>,
    event: Event,
}

impl PendingResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the operation is pending: staged or in-flight to ES.
    pub fn contains(&self, operation: &Operation) -> bool {
        let inner = self.inner.lock();
        inner.results.contains_key(operation) || inner.writes.contains(operation)
    }

    /// Stage one result and signal the dispatcher.
    pub fn add(&self, operation: Operation, result: StagedResult) {
        let mut inner = self.inner.lock();
        inner.results.insert(operation, result);
        self.event.set();
    }

    /// Move one arbitrary staged result into the write set.
    pub fn pop(&self) -> Result<(Operation, StagedResult), PendingError> {
        let mut inner = self.inner.lock();
        let operation = inner.results.keys().next().cloned().ok_or(PendingError::Empty)?;
        // The key was just read from the map.
        let result = inner.results.remove(&operation).ok_or(PendingError::Empty)?;
        if inner.results.is_empty() {
            self.event.clear();
        }
        inner.writes.insert(operation.clone());
        Ok((operation, result))
    }

    /// Confirm the write of a popped operation.
    pub fn finalize(&self, operation: &Operation) -> Result<(), PendingError> {
        let mut inner = self.inner.lock();
        if inner.writes.remove(operation) {
            Ok(())
        } else {
            Err(PendingError::NotFound(operation.clone()))
        }
    }

    /// Block until at least one result is staged.
    pub async fn wait(&self) {
        self.event.wait().await;
    }

    /// (staged, in-flight) counts, for introspection.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.results.len(), inner.writes.len())
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
