// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! QueueService: the public scheduling surface.
//!
//! One writer lock (`core`) serializes every mutating entry point —
//! enqueue, the sweeper, worker completions, invalidation, re-enqueues
//! after failed writes. While it is held, the union {queue, extracted
//! batch, pool-assigned, pending results, pending writes} is stable, which
//! is what keeps the sweeper from double-enqueueing an operation whose
//! result is mid-commit.

use crate::counter::AtomicCounter;
use crate::error::PoolError;
use crate::event::Event;
use crate::executor::EvaluationExecutor;
use crate::opqueue::QueueEntry;
use crate::pending::{PendingResults, StagedResult};
use crate::pool::{PoolEvent, WorkerPool};
use crate::status::{QueueStatusEntry, WorkerStatusEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::{
    epoch_seconds, Clock, ContestId, Job, JobGroup, Operation, Priority, Shard, SystemClock,
};
use gavel_store::{ops, Datastore};
use gavel_wire::{EvalClient, QueueClient, RpcError, WorkerClient};
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

/// How often the sweeper re-scans the store for missing operations.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(117);
/// How often stale workers are checked.
pub const WORKER_TIMEOUT_CHECK_TIME: Duration = Duration::from_secs(300);
/// How often worker connectivity is checked.
pub const WORKER_CONNECTION_CHECK_TIME: Duration = Duration::from_secs(10);

pub(crate) struct QsCore {
    pub(crate) executor: EvaluationExecutor,
    pub(crate) pool: WorkerPool,
}

/// The scheduling authority: priority queue, worker pool, staging of
/// results, reconciliation sweeps.
pub struct QueueService<C: Clock = SystemClock> {
    pub(crate) contest_id: Option<ContestId>,
    clock: C,
    pub(crate) store: Arc<dyn Datastore>,
    /// The post-finish lock.
    pub(crate) core: Mutex<QsCore>,
    pub(crate) pending: PendingResults,
    pub(crate) sweeper_blockers: Arc<AtomicCounter>,
    pub(crate) eval_clients: RwLock<Vec<Arc<dyn EvalClient>>>,
    /// Set while the queue is non-empty.
    queue_event: Event,
    /// Set while a free worker has been announced.
    free_event: Arc<Event>,
    events_rx: Mutex<Option<UnboundedReceiver<PoolEvent>>>,
}

impl<C: Clock> QueueService<C> {
    pub fn new(contest_id: Option<ContestId>, store: Arc<dyn Datastore>, clock: C) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::new(contest_id, Arc::clone(&store), events_tx);
        let free_event = pool.free_event();
        Arc::new(Self {
            contest_id,
            clock,
            store,
            core: Mutex::new(QsCore { executor: EvaluationExecutor::new(), pool }),
            pending: PendingResults::new(),
            sweeper_blockers: Arc::new(AtomicCounter::new()),
            eval_clients: RwLock::new(Vec::new()),
            queue_event: Event::new(),
            free_event,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    pub fn add_worker(&self, shard: Shard, client: Arc<dyn WorkerClient>) -> Result<(), PoolError> {
        self.core.lock().pool.add_worker(shard, client)
    }

    pub fn add_eval_client(&self, client: Arc<dyn EvalClient>) {
        self.eval_clients.write().push(client);
    }

    /// Spawn the background machinery: the pool completion loop, the
    /// executor, the result dispatcher and the periodic sweeps.
    pub fn start(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_pool_events().await });
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_executor().await });
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_dispatcher().await });

        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(SWEEP_INTERVAL);
            timer.tick().await;
            loop {
                timer.tick().await;
                service.sweep_missing();
            }
        });
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(WORKER_TIMEOUT_CHECK_TIME);
            timer.tick().await;
            loop {
                timer.tick().await;
                service.check_workers_timeout();
            }
        });
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(WORKER_CONNECTION_CHECK_TIME);
            timer.tick().await;
            loop {
                timer.tick().await;
                service.check_workers_connection();
            }
        });
    }

    /// Push an operation unless it is already anywhere in the pipeline.
    ///
    /// Returns `true` iff a new queue entry was created.
    pub fn enqueue(
        &self,
        operation: Operation,
        priority: Priority,
        timestamp: DateTime<Utc>,
        job: Option<Job>,
    ) -> bool {
        let mut core = self.core.lock();
        self.enqueue_locked(&mut core, QueueEntry { operation, priority, timestamp, job })
    }

    pub(crate) fn enqueue_locked(&self, core: &mut QsCore, entry: QueueEntry) -> bool {
        if core.executor.contains(&entry.operation)
            || core.pool.contains(&entry.operation)
            || self.pending.contains(&entry.operation)
        {
            return false;
        }
        if entry.job.is_none() {
            warn!(
                operation = %entry.operation,
                "enqueueing without a job; the pool will have to build one from the store"
            );
        }
        let pushed = core.executor.enqueue(entry);
        if pushed {
            self.queue_event.set();
        }
        pushed
    }

    /// Sweeper body: re-enqueue operations the store says are missing.
    /// Skipped entirely while invalidation fan-out is in flight.
    pub fn sweep_missing(&self) -> usize {
        if self.sweeper_blockers.get() > 0 {
            debug!("sweeper paused by invalidation fan-out");
            return 0;
        }
        let mut core = self.core.lock();
        let mut counter = 0;
        let missing = ops::missing_submission_operations(self.store.as_ref(), self.contest_id)
            .into_iter()
            .chain(ops::missing_user_test_operations(self.store.as_ref(), self.contest_id));
        for (operation, priority, timestamp) in missing {
            if self.enqueue_locked(&mut core, QueueEntry { operation, priority, timestamp, job: None })
            {
                counter += 1;
            }
        }
        if counter > 0 {
            info!(count = counter, "sweeper enqueued missing operations");
        }
        counter
    }

    /// Pool callback: a worker finished (or failed) its job group.
    pub fn action_finished(&self, shard: Shard, result: Result<JobGroup, RpcError>) {
        let mut core = self.core.lock();
        let (to_consider, to_ignore) = match core.pool.finish_worker(shard) {
            Ok(split) => split,
            Err(e) => {
                error!(shard = %shard, error = %e, "completion from a worker not in the pool");
                return;
            }
        };
        // The lock stays held while results are staged: between the pool
        // purge above and the `pending` insert below the operation is in
        // no set, and the sweeper must never observe that gap.
        match result {
            Err(e) => {
                // The batch was already released; the sweeper will
                // re-discover whatever was lost.
                error!(shard = %shard, error = %e, "received error from worker");
            }
            Ok(group) => {
                for job in group.jobs {
                    let operation = job.operation.clone();
                    if let Some(entry) =
                        to_consider.iter().find(|entry| entry.operation == operation)
                    {
                        info!(operation = %operation, success = ?job.success, "operation completed");
                        self.pending.add(
                            operation,
                            StagedResult {
                                job,
                                priority: entry.priority,
                                timestamp: entry.timestamp,
                            },
                        );
                    } else if to_ignore.iter().any(|entry| entry.operation == operation) {
                        info!(operation = %operation, "result ignored as requested");
                    } else {
                        warn!(
                            operation = %operation,
                            shard = %shard,
                            "result for an operation this worker no longer owns; dropped"
                        );
                    }
                }
            }
        }
    }

    /// Timeout sweep: reclaim batches from unresponsive workers.
    pub fn check_workers_timeout(&self) {
        let mut core = self.core.lock();
        let lost = core.pool.check_timeouts(self.clock.now());
        for entry in lost {
            info!(operation = %entry.operation, "re-enqueued after worker timeout");
            self.enqueue_locked(&mut core, entry);
        }
    }

    /// Connection sweep: reclaim batches from disconnected workers.
    pub fn check_workers_connection(&self) {
        let mut core = self.core.lock();
        let lost = core.pool.check_connections();
        for entry in lost {
            info!(operation = %entry.operation, "re-enqueued after worker disconnect");
            self.enqueue_locked(&mut core, entry);
        }
    }

    /// Admin: disable a worker, recovering its assigned operations.
    pub fn disable_worker(&self, shard: Shard) -> bool {
        info!(shard = %shard, "received request to disable worker");
        let mut core = self.core.lock();
        match core.pool.disable_worker(shard) {
            Ok(lost) => {
                for entry in lost {
                    info!(operation = %entry.operation, "re-enqueued after worker disable");
                    self.enqueue_locked(&mut core, entry);
                }
                true
            }
            Err(e) => {
                warn!(shard = %shard, error = %e, "disable failed");
                false
            }
        }
    }

    /// Admin: bring a disabled worker back.
    pub fn enable_worker(&self, shard: Shard) -> bool {
        info!(shard = %shard, "received request to enable worker");
        match self.core.lock().pool.enable_worker(shard) {
            Ok(()) => true,
            Err(e) => {
                warn!(shard = %shard, error = %e, "enable failed");
                false
            }
        }
    }

    pub fn workers_status(&self) -> BTreeMap<String, WorkerStatusEntry> {
        self.core.lock().pool.status()
    }

    /// Queue snapshot with per-testcase evaluations of one (type, object,
    /// dataset) collapsed into a multiplicity count.
    pub fn queue_status(&self) -> Vec<QueueStatusEntry> {
        let core = self.core.lock();
        let mut collapsed: Vec<QueueStatusEntry> = Vec::new();
        let mut index: HashMap<(u8, i64, i64), usize> = HashMap::new();
        for entry in core.executor.iter_queue() {
            let key = (
                u8::from(entry.operation.kind),
                entry.operation.object_id,
                entry.operation.dataset_id.as_i64(),
            );
            match index.get(&key) {
                Some(&slot) => collapsed[slot].multiplicity += 1,
                None => {
                    index.insert(key, collapsed.len());
                    collapsed.push(QueueStatusEntry {
                        operation: entry.operation.clone(),
                        multiplicity: 1,
                        priority: entry.priority,
                        timestamp: epoch_seconds(entry.timestamp),
                    });
                }
            }
        }
        collapsed.sort_by(|a, b| {
            a.priority.cmp(&b.priority).then_with(|| a.timestamp.total_cmp(&b.timestamp))
        });
        collapsed
    }

    /// Whether the operation is anywhere in the pipeline (queue, extracted
    /// batch, pool or pending). Introspection for callers and tests.
    pub fn contains_operation(&self, operation: &Operation) -> bool {
        let core = self.core.lock();
        core.executor.contains(operation)
            || core.pool.contains(operation)
            || self.pending.contains(operation)
    }

    /// (staged, in-flight) pending-result counts.
    pub fn pending_counts(&self) -> (usize, usize) {
        self.pending.counts()
    }

    /// Outstanding invalidation fan-out batches holding the sweeper back.
    pub fn sweeper_blocker_count(&self) -> i64 {
        self.sweeper_blockers.get()
    }

    async fn run_pool_events(self: Arc<Self>) {
        let receiver = self.events_rx.lock().take();
        let Some(mut receiver) = receiver else {
            warn!("pool event loop already started");
            return;
        };
        while let Some(event) = receiver.recv().await {
            match event {
                PoolEvent::ActionFinished { shard, result } => self.action_finished(shard, result),
            }
        }
    }

    async fn run_executor(self: Arc<Self>) {
        loop {
            self.queue_event.wait().await;
            let batch = {
                let mut core = self.core.lock();
                let workers = core.pool.len();
                let max = core.executor.max_batch(workers);
                let batch = core.executor.take_batch(max);
                if core.executor.queue_is_empty() {
                    self.queue_event.clear();
                }
                batch
            };
            if batch.is_empty() {
                continue;
            }
            debug!(operations = batch.len(), "executing batch");
            loop {
                self.free_event.wait().await;
                let done = {
                    let mut core = self.core.lock();
                    if core.executor.current().is_empty() {
                        // Everything was dequeued while we waited.
                        true
                    } else {
                        let current = core.executor.current().to_vec();
                        let now = self.clock.now();
                        if core.pool.acquire_worker(&current, now).is_some() {
                            core.executor.clear_current();
                            true
                        } else {
                            // Stale free announcement; wait for the next.
                            false
                        }
                    }
                };
                if done {
                    break;
                }
            }
        }
    }

    async fn run_dispatcher(self: Arc<Self>) {
        loop {
            self.pending.wait().await;
            let (operation, staged) = match self.pending.pop() {
                Ok(popped) => popped,
                Err(_) => continue,
            };
            match self.pick_eval_client() {
                None => {
                    error!(
                        operation = %operation,
                        "no evaluation service connected; result discarded"
                    );
                    if let Err(e) = self.pending.finalize(&operation) {
                        warn!(error = %e, "discarded result was not pending");
                    }
                }
                Some(client) => {
                    debug!(operation = %operation, "sending result to evaluation service");
                    let result =
                        client.write_result(operation.clone(), staged.job.clone()).await;
                    self.result_written(operation, staged, result);
                }
            }
        }
    }

    fn pick_eval_client(&self) -> Option<Arc<dyn EvalClient>> {
        let clients = self.eval_clients.read();
        let connected: Vec<Arc<dyn EvalClient>> =
            clients.iter().filter(|client| client.is_connected()).cloned().collect();
        connected.choose(&mut rand::thread_rng()).cloned()
    }

    fn result_written(
        &self,
        operation: Operation,
        staged: StagedResult,
        result: Result<(bool, Vec<gavel_wire::FollowUp>), RpcError>,
    ) {
        let mut core = self.core.lock();
        if let Err(e) = self.pending.finalize(&operation) {
            warn!(operation = %operation, error = %e, "written operation was not pending");
        }
        match result {
            Err(error) => {
                warn!(
                    operation = %operation,
                    error = %error,
                    "write failed; re-enqueueing at original priority"
                );
                let entry = QueueEntry {
                    operation,
                    priority: staged.priority,
                    timestamp: staged.timestamp,
                    job: Some(staged.job),
                };
                self.enqueue_locked(&mut core, entry);
            }
            Ok((success, follow_ups)) => {
                info!(operation = %operation, success, "result written");
                for follow_up in follow_ups {
                    let timestamp = follow_up.timestamp_utc();
                    let entry = QueueEntry {
                        operation: follow_up.operation,
                        priority: follow_up.priority,
                        timestamp,
                        job: follow_up.job,
                    };
                    self.enqueue_locked(&mut core, entry);
                }
            }
        }
    }
}

/// In-process [`QueueClient`] over a service instance, for single-host
/// wiring and tests.
pub struct LoopbackQueue<C: Clock = SystemClock>(pub Arc<QueueService<C>>);

#[async_trait]
impl<C: Clock> QueueClient for LoopbackQueue<C> {
    async fn enqueue(
        &self,
        operation: Operation,
        priority: Priority,
        timestamp: DateTime<Utc>,
        job: Option<Job>,
    ) -> Result<bool, RpcError> {
        Ok(self.0.enqueue(operation, priority, timestamp, job))
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
