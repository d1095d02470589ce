// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker state machine.
//!
//! A worker is Inactive (free), Active (executing a job group) or
//! Disabled (administratively removed; results from it are discarded).

use crate::error::PoolError;
use crate::opqueue::QueueEntry;
use crate::status::WorkerStatusEntry;
use chrono::{DateTime, Duration, Utc};
use gavel_core::{epoch_seconds, JobGroup, Operation, Shard};
use gavel_store::{jobs::build_job, Datastore};
use gavel_wire::WorkerClient;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Inactive,
    Active,
    Disabled,
}

gavel_core::simple_display! {
    WorkerStatus {
        Inactive => "inactive",
        Active => "active",
        Disabled => "disabled",
    }
}

/// State of one worker in the pool.
pub struct WorkerData {
    shard: Shard,
    client: Arc<dyn WorkerClient>,
    status: WorkerStatus,
    /// Entries the worker is currently executing; non-empty iff Active.
    operations: Vec<QueueEntry>,
    /// Operations whose results must be discarded on arrival.
    to_ignore: HashSet<Operation>,
    /// When the current job group was shipped; Some iff Active.
    start_time: Option<DateTime<Utc>>,
    /// Connectivity observed by the last sweep, to detect reconnects.
    pub(crate) was_connected: bool,
}

impl WorkerData {
    pub fn new(shard: Shard, client: Arc<dyn WorkerClient>) -> Self {
        let was_connected = client.is_connected();
        Self {
            shard,
            client,
            status: WorkerStatus::Inactive,
            operations: Vec::new(),
            to_ignore: HashSet::new(),
            start_time: None,
            was_connected,
        }
    }

    pub fn shard(&self) -> Shard {
        self.shard
    }

    pub fn client(&self) -> &Arc<dyn WorkerClient> {
        &self.client
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    pub fn is_inactive(&self) -> bool {
        self.status == WorkerStatus::Inactive
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }

    pub fn is_disabled(&self) -> bool {
        self.status == WorkerStatus::Disabled
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// How long the worker has been active; zero when it is not.
    pub fn active_time(&self, now: DateTime<Utc>) -> Duration {
        match self.start_time {
            Some(start) => now - start,
            None => Duration::zero(),
        }
    }

    /// Record the batch and build the job group to ship.
    ///
    /// Entries carry the job EvaluationService attached at enqueue time;
    /// bare entries (the sweeper's) get one built from the store here. An
    /// entry whose job cannot be assembled stays tracked but is not
    /// shipped.
    pub fn set_active(
        &mut self,
        mut entries: Vec<QueueEntry>,
        now: DateTime<Utc>,
        store: &dyn Datastore,
    ) -> Result<JobGroup, PoolError> {
        self.ensure_status("start a batch", &[WorkerStatus::Inactive])?;
        let mut jobs = Vec::with_capacity(entries.len());
        for entry in &mut entries {
            tracing::info!(shard = %self.shard, operation = %entry.operation, "asking worker to execute");
            if entry.job.is_none() {
                match build_job(store, &entry.operation) {
                    Ok(job) => entry.job = Some(job),
                    Err(e) => tracing::error!(
                        shard = %self.shard,
                        operation = %entry.operation,
                        error = %e,
                        "no job attached and none can be built; not shipping"
                    ),
                }
            }
            if let Some(job) = &entry.job {
                jobs.push(job.clone());
            }
        }
        self.start_time = Some(now);
        self.operations = entries;
        self.status = WorkerStatus::Active;
        Ok(JobGroup::new(jobs))
    }

    /// Hand back the current batch, split into (to consider, to ignore).
    ///
    /// If the worker is not Active — it was disabled, or this is a
    /// duplicate callback after a timeout-induced requeue — every
    /// operation goes to the ignore side: results from a worker we have
    /// given up on must never land in the store.
    pub fn release(&mut self) -> (Vec<QueueEntry>, Vec<QueueEntry>) {
        let operations = std::mem::take(&mut self.operations);
        let ignored = std::mem::take(&mut self.to_ignore);
        let (to_consider, to_ignore) = if self.status != WorkerStatus::Active {
            (Vec::new(), operations)
        } else {
            operations.into_iter().partition(|entry| !ignored.contains(&entry.operation))
        };
        if self.status != WorkerStatus::Disabled {
            self.status = WorkerStatus::Inactive;
        }
        self.start_time = None;
        (to_consider, to_ignore)
    }

    /// Administratively remove the worker. Returns `release()`'s split
    /// when a batch was in flight.
    pub fn disable(&mut self) -> Result<(Vec<QueueEntry>, Vec<QueueEntry>), PoolError> {
        self.ensure_status("be disabled", &[WorkerStatus::Inactive, WorkerStatus::Active])?;
        let lost = if self.status == WorkerStatus::Active {
            self.release()
        } else {
            (Vec::new(), Vec::new())
        };
        self.status = WorkerStatus::Disabled;
        Ok(lost)
    }

    /// Bring a disabled worker back into rotation.
    pub fn enable(&mut self) -> Result<(), PoolError> {
        self.ensure_status("be enabled", &[WorkerStatus::Disabled])?;
        self.status = WorkerStatus::Inactive;
        Ok(())
    }

    /// Mark one in-flight operation so its result is discarded on arrival.
    pub fn ignore(&mut self, operation: &Operation) -> Result<(), PoolError> {
        if !self.operations.iter().any(|entry| &entry.operation == operation) {
            return Err(PoolError::OperationNotAssigned(operation.clone()));
        }
        self.to_ignore.insert(operation.clone());
        Ok(())
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.operations
    }

    pub fn status_entry(&self) -> WorkerStatusEntry {
        WorkerStatusEntry {
            connected: self.is_connected(),
            status: self.status,
            start_time: self.start_time.map(epoch_seconds),
            operations: self.operations.iter().map(|entry| entry.operation.clone()).collect(),
        }
    }

    fn ensure_status(&self, action: &'static str, allowed: &[WorkerStatus]) -> Result<(), PoolError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            tracing::error!(shard = %self.shard, status = %self.status, "cannot {}", action);
            Err(PoolError::WrongStatus {
                shard: self.shard,
                action,
                status: match self.status {
                    WorkerStatus::Inactive => "inactive",
                    WorkerStatus::Active => "active",
                    WorkerStatus::Disabled => "disabled",
                },
            })
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
