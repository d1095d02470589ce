// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake queue/scoring clients for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::{DatasetId, Job, Operation, Priority, SubmissionId};
use gavel_wire::{QueueClient, RpcError, ScoringClient};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every enqueue request instead of scheduling anything.
#[derive(Default)]
pub struct FakeQueue {
    calls: Mutex<Vec<(Operation, Priority, DateTime<Utc>, Option<Job>)>>,
}

impl FakeQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(Operation, Priority, DateTime<Utc>, Option<Job>)> {
        self.calls.lock().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls.lock().iter().map(|(operation, _, _, _)| operation.clone()).collect()
    }
}

#[async_trait]
impl QueueClient for FakeQueue {
    async fn enqueue(
        &self,
        operation: Operation,
        priority: Priority,
        timestamp: DateTime<Utc>,
        job: Option<Job>,
    ) -> Result<bool, RpcError> {
        self.calls.lock().push((operation, priority, timestamp, job));
        Ok(true)
    }
}

/// Records scoring notifications.
#[derive(Default)]
pub struct FakeScoring {
    notifications: Mutex<Vec<(SubmissionId, DatasetId)>>,
}

impl FakeScoring {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<(SubmissionId, DatasetId)> {
        self.notifications.lock().clone()
    }
}

#[async_trait]
impl ScoringClient for FakeScoring {
    async fn new_evaluation(
        &self,
        submission_id: SubmissionId,
        dataset_id: DatasetId,
    ) -> Result<(), RpcError> {
        self.notifications.lock().push((submission_id, dataset_id));
        Ok(())
    }
}
