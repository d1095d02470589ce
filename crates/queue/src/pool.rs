// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry and assignment of the worker fleet.
//!
//! The pool hands batches to free workers, reclaims batches from workers
//! that time out or disconnect, and keeps a reverse index from operation
//! to shard so targeted lookups never scan the fleet.

use crate::error::PoolError;
use crate::event::Event;
use crate::opqueue::QueueEntry;
use crate::status::WorkerStatusEntry;
use crate::worker::WorkerData;
use chrono::{DateTime, Duration, Utc};
use gavel_core::{ContestId, JobGroup, Operation, Shard};
use gavel_store::Datastore;
use gavel_wire::{RpcError, WorkerClient};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Time since acquisition after which a worker counts as stale.
pub const WORKER_TIMEOUT_SECS: i64 = 600;

/// Completion of a worker RPC, delivered to the service event loop.
#[derive(Debug)]
pub enum PoolEvent {
    ActionFinished { shard: Shard, result: Result<JobGroup, RpcError> },
}

pub struct WorkerPool {
    contest_id: Option<ContestId>,
    /// For building jobs of bare (sweeper-enqueued) operations.
    store: Arc<dyn Datastore>,
    workers: BTreeMap<Shard, WorkerData>,
    /// Reverse index over every assigned operation. The only structure
    /// that lets `contains` and `ignore_operation` run in O(1).
    operations_reverse: HashMap<Operation, Shard>,
    /// Shards that might be acquirable. May hold stale entries; the
    /// Inactive+connected gate in `acquire_worker` is authoritative.
    free_workers: VecDeque<Shard>,
    /// Set when a free worker has been announced since the last clear.
    free_event: Arc<Event>,
    events_tx: UnboundedSender<PoolEvent>,
}

impl WorkerPool {
    pub fn new(
        contest_id: Option<ContestId>,
        store: Arc<dyn Datastore>,
        events_tx: UnboundedSender<PoolEvent>,
    ) -> Self {
        Self {
            contest_id,
            store,
            workers: BTreeMap::new(),
            operations_reverse: HashMap::new(),
            free_workers: VecDeque::new(),
            free_event: Arc::new(Event::new()),
            events_tx,
        }
    }

    /// The "a free worker might be available" event, for the executor.
    pub fn free_event(&self) -> Arc<Event> {
        Arc::clone(&self.free_event)
    }

    pub fn add_worker(
        &mut self,
        shard: Shard,
        client: Arc<dyn WorkerClient>,
    ) -> Result<(), PoolError> {
        if self.workers.contains_key(&shard) {
            return Err(PoolError::DuplicateWorker(shard));
        }
        debug!(shard = %shard, "worker added");
        self.workers.insert(shard, WorkerData::new(shard, client));
        self.note_maybe_free(shard);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, operation: &Operation) -> bool {
        self.operations_reverse.contains_key(operation)
    }

    /// Announce that a shard might be free. Safe to call spuriously or
    /// repeatedly; missing a call for a genuinely free worker would
    /// starve it.
    fn note_maybe_free(&mut self, shard: Shard) {
        self.free_workers.push_back(shard);
        self.free_event.set();
    }

    /// Try to hand the batch to a free worker.
    ///
    /// `None` either means no free worker was announced (the free event
    /// is cleared so callers can wait) or the announced shard turned out
    /// to be stale (callers just retry).
    pub fn acquire_worker(
        &mut self,
        entries: &[QueueEntry],
        now: DateTime<Utc>,
    ) -> Option<Shard> {
        let shard = match self.free_workers.pop_front() {
            Some(shard) => shard,
            None => {
                self.free_event.clear();
                return None;
            }
        };
        let worker = self.workers.get_mut(&shard)?;
        // The worker might have been taken, disabled or disconnected
        // while its announcement sat in the deque.
        if !(worker.is_inactive() && worker.is_connected()) {
            return None;
        }
        debug!(shard = %shard, operations = entries.len(), "worker acquired");

        let group = match worker.set_active(entries.to_vec(), now, self.store.as_ref()) {
            Ok(group) => group,
            Err(e) => {
                error!(shard = %shard, error = %e, "acquire raced a state change");
                return None;
            }
        };
        for entry in entries {
            self.operations_reverse.insert(entry.operation.clone(), shard);
        }

        let client = Arc::clone(worker.client());
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.execute_job_group(group).await;
            let _ = events_tx.send(PoolEvent::ActionFinished { shard, result });
        });

        Some(shard)
    }

    /// Release a worker whose RPC completed: purge its operations from
    /// the reverse index, re-announce the shard if it is usable again,
    /// and hand back the (to consider, to ignore) split.
    pub fn finish_worker(
        &mut self,
        shard: Shard,
    ) -> Result<(Vec<QueueEntry>, Vec<QueueEntry>), PoolError> {
        let worker = self.workers.get_mut(&shard).ok_or(PoolError::UnknownWorker(shard))?;
        let (to_consider, to_ignore) = worker.release();
        let inactive = worker.is_inactive();
        self.purge(&to_consider);
        self.purge(&to_ignore);
        if inactive {
            self.note_maybe_free(shard);
        }
        Ok((to_consider, to_ignore))
    }

    /// Mark an assigned operation so its result is discarded on arrival.
    pub fn ignore_operation(&mut self, operation: &Operation) -> Result<(), PoolError> {
        let shard = self
            .operations_reverse
            .get(operation)
            .copied()
            .ok_or_else(|| PoolError::OperationNotAssigned(operation.clone()))?;
        let worker = self.workers.get_mut(&shard).ok_or(PoolError::UnknownWorker(shard))?;
        worker.ignore(operation)
    }

    /// Administratively remove a worker, returning the non-ignored
    /// entries it was executing so the caller can re-enqueue them.
    pub fn disable_worker(&mut self, shard: Shard) -> Result<Vec<QueueEntry>, PoolError> {
        let worker = self.workers.get_mut(&shard).ok_or(PoolError::UnknownWorker(shard))?;
        let (lost, ignored) = worker.disable()?;
        self.purge(&lost);
        self.purge(&ignored);
        info!(shard = %shard, "worker disabled");
        Ok(lost)
    }

    /// Bring a disabled worker back into rotation.
    pub fn enable_worker(&mut self, shard: Shard) -> Result<(), PoolError> {
        let worker = self.workers.get_mut(&shard).ok_or(PoolError::UnknownWorker(shard))?;
        worker.enable()?;
        info!(shard = %shard, "worker enabled");
        self.note_maybe_free(shard);
        Ok(())
    }

    /// Reclaim batches from workers that have been active too long. The
    /// stale worker is told to quit and disabled; its non-ignored entries
    /// are returned for re-enqueueing.
    pub fn check_timeouts(&mut self, now: DateTime<Utc>) -> Vec<QueueEntry> {
        let stale: Vec<Shard> = self
            .workers
            .values()
            .filter(|worker| worker.active_time(now) > Duration::seconds(WORKER_TIMEOUT_SECS))
            .map(|worker| worker.shard())
            .collect();
        let mut lost_entries = Vec::new();
        for shard in stale {
            if let Some(worker) = self.workers.get_mut(&shard) {
                error!(
                    shard = %shard,
                    active_for = %worker.active_time(now),
                    "disabling and shutting down worker: no response"
                );
                let client = Arc::clone(worker.client());
                tokio::spawn(async move {
                    if let Err(e) = client.quit("No response for a long time.").await {
                        warn!(shard = %shard, error = %e, "quit request failed");
                    }
                });
                match worker.disable() {
                    Ok((lost, ignored)) => {
                        self.purge(&lost);
                        self.purge(&ignored);
                        lost_entries.extend(lost);
                    }
                    Err(e) => error!(shard = %shard, error = %e, "timeout disable failed"),
                }
            }
        }
        lost_entries
    }

    /// Reconcile connectivity: reclaim batches from workers that dropped
    /// off, and greet workers that came back (precache hint + free
    /// announcement).
    pub fn check_connections(&mut self) -> Vec<QueueEntry> {
        let mut lost_entries = Vec::new();
        let shards: Vec<Shard> = self.workers.keys().copied().collect();
        for shard in shards {
            let Some(worker) = self.workers.get_mut(&shard) else { continue };
            let connected = worker.is_connected();
            let was_connected = worker.was_connected;
            worker.was_connected = connected;

            if !connected && worker.is_active() {
                let (lost, ignored) = worker.release();
                self.purge(&lost);
                self.purge(&ignored);
                lost_entries.extend(lost);
            } else if connected && !was_connected {
                info!(shard = %shard, "worker online again");
                let client = Arc::clone(worker.client());
                let contest_id = self.contest_id;
                tokio::spawn(async move {
                    if let Err(e) = client.precache_files(contest_id).await {
                        warn!(shard = %shard, error = %e, "precache hint failed");
                    }
                });
                if worker.is_inactive() {
                    self.note_maybe_free(shard);
                }
            }
        }
        lost_entries
    }

    /// Every operation currently assigned to some worker.
    pub fn assigned_operations(&self) -> Vec<Operation> {
        self.operations_reverse.keys().cloned().collect()
    }

    /// Per-shard status map for the admin surface.
    pub fn status(&self) -> BTreeMap<String, WorkerStatusEntry> {
        self.workers
            .iter()
            .map(|(shard, worker)| (shard.to_string(), worker.status_entry()))
            .collect()
    }

    fn purge(&mut self, entries: &[QueueEntry]) {
        for entry in entries {
            self.operations_reverse.remove(&entry.operation);
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
