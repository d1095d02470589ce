// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gavel-queue: the scheduling authority of the grading dispatch core.
//!
//! Owns the priority queue of pending operations and the pool of remote
//! workers; decides who does what, when. Results are staged in
//! [`PendingResults`] and handed to EvaluationService for persistence.

mod counter;
mod error;
mod event;
mod executor;
mod opqueue;
mod pending;
mod pool;
mod rpc;
mod service;
mod status;
mod worker;

mod invalidate;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use counter::AtomicCounter;
pub use error::{PendingError, PoolError, QueueError};
pub use event::Event;
pub use executor::{EvaluationExecutor, MAX_OPERATIONS_PER_BATCH};
pub use opqueue::{OperationQueue, QueueEntry};
pub use pending::{PendingResults, StagedResult};
pub use pool::{PoolEvent, WorkerPool, WORKER_TIMEOUT_SECS};
pub use rpc::QueueRpc;
pub use service::{
    LoopbackQueue, QueueService, SWEEP_INTERVAL, WORKER_CONNECTION_CHECK_TIME,
    WORKER_TIMEOUT_CHECK_TIME,
};
pub use status::{QueueStatusEntry, WorkerStatusEntry};
pub use worker::{WorkerData, WorkerStatus};
