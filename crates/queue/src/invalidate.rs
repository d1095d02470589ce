// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invalidation: drop persisted results for a set of submissions, discard
//! their in-flight work, and fan the survivors out to the evaluation
//! services for re-derivation.

use crate::error::QueueError;
use crate::service::QueueService;
use gavel_core::{Clock, Operation, SubmissionId};
use gavel_store::SubmissionFilter;
use gavel_wire::{EvalClient, InvalidateLevel, InvalidateParams};
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Batches of at most this many submissions go to a single random ES;
/// larger invalidations are split across every connected ES.
const SINGLE_BATCH_LIMIT: usize = 20;

/// Delay between fan-out retries.
const RETRY_DELAY: Duration = Duration::from_secs(2);

fn operation_matches(operation: &Operation, targets: &HashSet<i64>, level: InvalidateLevel) -> bool {
    if !operation.for_submission() || !targets.contains(&operation.object_id) {
        return false;
    }
    match level {
        // Dropping compilations invalidates everything downstream too.
        InvalidateLevel::Compilation => true,
        InvalidateLevel::Evaluation => operation.kind.is_evaluation(),
    }
}

impl<C: Clock> QueueService<C> {
    /// Drop results at `level` for every submission matching the filters,
    /// discard matching in-flight operations, and ask the evaluation
    /// services to re-derive fresh work.
    ///
    /// The sweeper is paused (via the blocker counter) until every
    /// fan-out batch has been acknowledged.
    pub fn invalidate_submission(&self, params: &InvalidateParams) -> Result<(), QueueError> {
        info!(
            submission = ?params.submission_id,
            dataset = ?params.dataset_id,
            task = ?params.task_id,
            participation = ?params.participation_id,
            level = %params.level,
            "invalidation requested"
        );
        let filter = SubmissionFilter {
            contest: params.contest_id.or(self.contest_id),
            submission: params.submission_id,
            dataset: params.dataset_id,
            participation: params.participation_id,
            task: params.task_id,
        };
        let submissions = self.store.submissions_matching(&filter)?;
        if submissions.is_empty() {
            info!("invalidation matched no submissions");
            return Ok(());
        }
        let targets: HashSet<i64> = submissions.iter().map(|s| s.id.as_i64()).collect();

        let mut core = self.core.lock();

        // Discard matching work still in the queue or on a worker. Both
        // removals tolerate "not found": an operation sits in at most one
        // place, or in neither if its result is already pending.
        let assigned = core.pool.assigned_operations();
        let relevant: Vec<Operation> = core
            .executor
            .iter_queue()
            .map(|entry| entry.operation.clone())
            .chain(core.executor.current().iter().map(|entry| entry.operation.clone()))
            .chain(assigned.into_iter())
            .filter(|operation| operation_matches(operation, &targets, params.level))
            .collect::<HashSet<Operation>>()
            .into_iter()
            .collect();
        for operation in &relevant {
            let _ = core.executor.dequeue(operation);
            let _ = core.pool.ignore_operation(operation);
        }

        // Clear the persisted rows.
        for submission in &submissions {
            for mut row in self.store.submission_results(submission.id) {
                if let Some(dataset) = params.dataset_id {
                    if row.dataset_id != dataset {
                        continue;
                    }
                }
                match params.level {
                    InvalidateLevel::Compilation => row.invalidate_compilation(),
                    InvalidateLevel::Evaluation => row.invalidate_evaluation(),
                }
                self.store.update_submission_result(&row)?;
                self.store.clear_evaluations(row.submission_id, row.dataset_id);
            }
        }

        // Fan the surviving ids out for re-derivation. The queue lock is
        // still held: the fan-out only spawns, it never waits.
        let ids: Vec<SubmissionId> = submissions.iter().map(|s| s.id).collect();
        self.fan_out_new_submissions(ids)
    }

    /// Send `new_submissions` batches, pausing the sweeper until every
    /// batch is acknowledged. Failed batches retry on a fresh random
    /// endpoint rather than being dropped.
    fn fan_out_new_submissions(&self, ids: Vec<SubmissionId>) -> Result<(), QueueError> {
        let clients: Vec<Arc<dyn EvalClient>> = self
            .eval_clients
            .read()
            .iter()
            .filter(|client| client.is_connected())
            .cloned()
            .collect();
        if clients.is_empty() {
            error!("no evaluation service connected; cannot fan out invalidation");
            return Err(QueueError::NoEvaluationService);
        }

        let batches: Vec<Vec<SubmissionId>> = if ids.len() <= SINGLE_BATCH_LIMIT {
            vec![ids]
        } else {
            let per_batch = ids.len().div_ceil(clients.len());
            ids.chunks(per_batch).map(<[SubmissionId]>::to_vec).collect()
        };

        for batch in batches {
            self.sweeper_blockers.get_and_add(1);
            let clients = clients.clone();
            let blockers = Arc::clone(&self.sweeper_blockers);
            tokio::spawn(async move {
                let mut attempt = 0u32;
                loop {
                    attempt += 1;
                    let Some(client) = clients.choose(&mut rand::thread_rng()).cloned() else {
                        break;
                    };
                    match client.new_submissions(batch.clone()).await {
                        Ok(()) => break,
                        Err(e) => {
                            warn!(
                                attempt,
                                count = batch.len(),
                                error = %e,
                                "new_submissions batch failed; retrying"
                            );
                            tokio::time::sleep(RETRY_DELAY).await;
                        }
                    }
                }
                blockers.get_and_add(-1);
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "invalidate_tests.rs"]
mod tests;
