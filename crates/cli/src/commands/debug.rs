// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator diagnosis: compile and evaluate one submission in-process,
//! bypassing the queue.

use crate::config::GavelConfig;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::{
    DatasetId, Job, JobGroup, Operation, Priority, SubmissionId,
};
use gavel_eval::{build_job, EvaluationService};
use gavel_store::{Datastore, MemStore, Snapshot};
use gavel_wire::{
    QueueClient, RemoteService, RemoteWorker, RpcError, ScoringClient, WorkerClient,
};
use std::sync::Arc;
use tracing::info;

/// The debug path never schedules; enqueue requests are dropped.
struct NullQueue;

#[async_trait]
impl QueueClient for NullQueue {
    async fn enqueue(
        &self,
        _operation: Operation,
        _priority: Priority,
        _timestamp: DateTime<Utc>,
        _job: Option<Job>,
    ) -> Result<bool, RpcError> {
        Ok(false)
    }
}

/// Scoring is not interesting while debugging a single submission.
struct NullScoring;

#[async_trait]
impl ScoringClient for NullScoring {
    async fn new_evaluation(
        &self,
        _submission: SubmissionId,
        _dataset: DatasetId,
    ) -> Result<(), RpcError> {
        Ok(())
    }
}

pub async fn debug_submission(
    config: &GavelConfig,
    submission_id: SubmissionId,
    dataset_id: Option<DatasetId>,
    testcase_codename: &str,
    worker_addr: Option<&str>,
) -> anyhow::Result<()> {
    let snapshot_path =
        config.snapshot.as_ref().context("debug-submission needs a store snapshot")?;
    let store: Arc<MemStore> = Arc::new(Snapshot::load(snapshot_path)?.into_store());

    let submission = store.submission(submission_id).context("loading submission")?;
    let dataset_id = match dataset_id {
        Some(id) => id,
        None => store.task(submission.task_id).context("loading task")?.active_dataset_id,
    };

    let worker = worker_addr.map(|addr| RemoteWorker(RemoteService::connect(addr.to_string())));
    let service = EvaluationService::new(
        None,
        store.clone(),
        Arc::new(NullQueue),
        Arc::new(NullScoring),
    );

    // Compilation first; its committed executables feed the evaluation.
    let compile = Operation::compile_submission(submission_id, dataset_id);
    run_step(&service, store.as_ref(), &compile, worker.as_ref()).await?;

    let result = store
        .submission_result(submission_id, dataset_id)
        .context("no result row after compilation")?;
    if worker.is_some() && !result.compilation_succeeded() {
        info!("compilation did not succeed; skipping evaluation");
        return Ok(());
    }

    let evaluate = Operation::evaluate_submission(submission_id, dataset_id, testcase_codename);
    run_step(&service, store.as_ref(), &evaluate, worker.as_ref()).await?;
    Ok(())
}

/// Build the job for one operation; with a worker, execute it and commit
/// the result through the regular write path. Prints the envelope either
/// way.
async fn run_step(
    service: &EvaluationService,
    store: &dyn Datastore,
    operation: &Operation,
    worker: Option<&RemoteWorker>,
) -> anyhow::Result<()> {
    let job = build_job(store, operation).map_err(|e| anyhow::anyhow!("building job: {}", e))?;
    match worker {
        None => {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Some(worker) => {
            info!(operation = %operation, "executing on worker");
            let group = worker
                .execute_job_group(JobGroup::new(vec![job]))
                .await
                .map_err(|e| anyhow::anyhow!("worker call failed: {}", e))?;
            let completed =
                group.jobs.into_iter().next().context("worker returned an empty group")?;
            println!("{}", serde_json::to_string_pretty(&completed)?);
            let (written, _) = service.write_result(operation.clone(), completed);
            anyhow::ensure!(written, "result commit failed");
        }
    }
    Ok(())
}
