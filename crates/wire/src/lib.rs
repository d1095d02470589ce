// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gavel-wire: RPC plumbing between the dispatch services.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload, one
//! request and one response per connection. Method names are the wire
//! symbols the surrounding system already speaks.

mod client;
mod envelope;
mod frame;
mod remote;
mod server;

pub use client::{EvalClient, QueueClient, RpcError, ScoringClient, WorkerClient, WriteOutcome};
pub use envelope::{
    EnqueueParams, FollowUp, InvalidateLevel, InvalidateParams, JobGroupParams,
    NewSubmissionParams, NewSubmissionsParams, NewUserTestParams, OperationPayload,
    PrecacheParams, QuitParams, RpcRequest, RpcResponse, ShardParams, TimestampPayload,
    WriteResultParams,
};
pub use frame::{decode, encode, read_frame, write_frame, ProtocolError, MAX_FRAME_BYTES};
pub use remote::{RemoteEval, RemoteQueue, RemoteScoring, RemoteService, RemoteWorker};
pub use server::{serve, RpcHandler};
