// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors of the scheduling side.

use gavel_core::{Operation, Shard};
use thiserror::Error;

/// Errors from the pending-result store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PendingError {
    #[error("no results available")]
    Empty,

    #[error("operation `{0}` is not pending a write")]
    NotFound(Operation),
}

/// Errors from the worker pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker {0} is not in the pool")]
    UnknownWorker(Shard),

    #[error("worker {0} is already in the pool")]
    DuplicateWorker(Shard),

    #[error("worker {shard} cannot {action} while {status}")]
    WrongStatus { shard: Shard, action: &'static str, status: &'static str },

    #[error("operation `{0}` is not assigned to any worker")]
    OperationNotAssigned(Operation),
}

/// Errors surfaced by the QueueService RPC surface.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Store(#[from] gavel_store::StoreError),

    #[error("operation `{0}` is not queued")]
    NotQueued(Operation),

    #[error("no evaluation service is connected")]
    NoEvaluationService,

    #[error("malformed operation: {0}")]
    BadOperation(#[from] gavel_core::OperationParseError),

    #[error("malformed timestamp: {0}")]
    BadTimestamp(#[from] chrono::ParseError),
}
