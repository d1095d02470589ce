// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side traits for the four RPC peers of the dispatch core.
//!
//! Services are generic over these, so tests plug in fakes and the
//! binaries plug in the remote implementations.

use crate::envelope::FollowUp;
use crate::frame::ProtocolError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::{ContestId, DatasetId, Job, JobGroup, Operation, Priority, SubmissionId};
use thiserror::Error;

/// Errors surfaced by an RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer answered with `ok = false`.
    #[error("remote error: {0}")]
    Remote(String),

    /// The peer is not currently reachable.
    #[error("peer disconnected")]
    Disconnected,
}

/// Result of `write_result`: whether the commit succeeded, plus the
/// follow-up operations to enqueue.
pub type WriteOutcome = (bool, Vec<FollowUp>);

/// A remote sandboxing worker.
#[async_trait]
pub trait WorkerClient: Send + Sync + 'static {
    /// Whether the worker currently answers pings.
    fn is_connected(&self) -> bool;

    /// Ship a batch of jobs; resolves when the worker is done with all of
    /// them, returning the same group with the result halves filled.
    async fn execute_job_group(&self, group: JobGroup) -> Result<JobGroup, RpcError>;

    /// Hint the worker to warm its blob cache for a contest.
    async fn precache_files(&self, contest: Option<ContestId>) -> Result<(), RpcError>;

    /// Ask the worker process to shut down.
    async fn quit(&self, reason: &str) -> Result<(), RpcError>;
}

/// An EvaluationService endpoint, as seen from QueueService.
#[async_trait]
pub trait EvalClient: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    async fn write_result(&self, operation: Operation, job: Job) -> Result<WriteOutcome, RpcError>;

    async fn new_submissions(&self, submission_ids: Vec<SubmissionId>) -> Result<(), RpcError>;
}

/// The QueueService endpoint, as seen from EvaluationService.
#[async_trait]
pub trait QueueClient: Send + Sync + 'static {
    async fn enqueue(
        &self,
        operation: Operation,
        priority: Priority,
        timestamp: DateTime<Utc>,
        job: Option<Job>,
    ) -> Result<bool, RpcError>;
}

/// The scoring service consuming finalized outcomes.
#[async_trait]
pub trait ScoringClient: Send + Sync + 'static {
    async fn new_evaluation(
        &self,
        submission_id: SubmissionId,
        dataset_id: DatasetId,
    ) -> Result<(), RpcError>;
}
