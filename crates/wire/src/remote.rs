// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote peers over TCP: one connection per call, liveness via a
//! background ping.

use crate::client::{EvalClient, QueueClient, RpcError, ScoringClient, WorkerClient, WriteOutcome};
use crate::envelope::{
    EnqueueParams, FollowUp, JobGroupParams, NewSubmissionsParams, PrecacheParams, QuitParams,
    RpcRequest, RpcResponse, TimestampPayload,
};
use crate::frame::{decode, encode, read_frame, write_frame};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::{epoch_seconds, ContestId, DatasetId, Job, JobGroup, Operation, Priority, SubmissionId};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// How often the liveness ping runs.
const PING_INTERVAL: Duration = Duration::from_secs(5);

/// A dialable peer address with a liveness flag.
///
/// Every call opens a fresh connection (the protocol is one request per
/// connection); `is_connected` reflects the most recent ping or call.
pub struct RemoteService {
    addr: String,
    connected: Arc<AtomicBool>,
}

impl RemoteService {
    /// Create the handle and start the background ping loop.
    pub fn connect(addr: impl Into<String>) -> Arc<Self> {
        let service =
            Arc::new(Self { addr: addr.into(), connected: Arc::new(AtomicBool::new(false)) });
        let ping_handle = Arc::clone(&service);
        tokio::spawn(async move {
            loop {
                let alive = ping_handle.call("ping", Value::Null).await.is_ok();
                ping_handle.connected.store(alive, Ordering::SeqCst);
                tokio::time::sleep(PING_INTERVAL).await;
            }
        });
        service
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Issue one request and wait for its response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let result = self.call_inner(method, params).await;
        match &result {
            Ok(_) => self.connected.store(true, Ordering::SeqCst),
            Err(RpcError::Protocol(_)) => self.connected.store(false, Ordering::SeqCst),
            // A remote error still proves the peer is alive.
            Err(_) => {}
        }
        result
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| RpcError::Protocol(e.into()))?;
        let payload = encode(&RpcRequest::new(method, params))?;
        write_frame(&mut stream, &payload).await?;
        let raw = read_frame(&mut stream).await?;
        let response: RpcResponse = decode(&raw)?;
        if response.ok {
            Ok(response.data)
        } else {
            Err(RpcError::Remote(response.error.unwrap_or_else(|| "unspecified".to_string())))
        }
    }
}

/// A remote sandboxing worker.
pub struct RemoteWorker(pub Arc<RemoteService>);

#[async_trait]
impl WorkerClient for RemoteWorker {
    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    async fn execute_job_group(&self, group: JobGroup) -> Result<JobGroup, RpcError> {
        let params = serde_json::to_value(JobGroupParams { job_group: group })
            .map_err(|e| RpcError::Protocol(e.into()))?;
        let data = self.0.call("execute_job_group", params).await?;
        let params: JobGroupParams = serde_json::from_value(data)
            .map_err(|e| RpcError::Protocol(e.into()))?;
        Ok(params.job_group)
    }

    async fn precache_files(&self, contest: Option<ContestId>) -> Result<(), RpcError> {
        let params = serde_json::to_value(PrecacheParams { contest_id: contest })
            .map_err(|e| RpcError::Protocol(e.into()))?;
        self.0.call("precache_files", params).await.map(|_| ())
    }

    async fn quit(&self, reason: &str) -> Result<(), RpcError> {
        let params = serde_json::to_value(QuitParams { reason: reason.to_string() })
            .map_err(|e| RpcError::Protocol(e.into()))?;
        self.0.call("quit", params).await.map(|_| ())
    }
}

/// A remote EvaluationService shard.
pub struct RemoteEval(pub Arc<RemoteService>);

#[async_trait]
impl EvalClient for RemoteEval {
    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    async fn write_result(&self, operation: Operation, job: Job) -> Result<WriteOutcome, RpcError> {
        let params = json!({ "operation": operation, "job": job });
        let data = self.0.call("write_result", params).await?;
        let (success, follow_ups): (bool, Vec<FollowUp>) =
            serde_json::from_value(data).map_err(|e| RpcError::Protocol(e.into()))?;
        Ok((success, follow_ups))
    }

    async fn new_submissions(&self, submission_ids: Vec<SubmissionId>) -> Result<(), RpcError> {
        let params = serde_json::to_value(NewSubmissionsParams { submission_ids })
            .map_err(|e| RpcError::Protocol(e.into()))?;
        self.0.call("new_submissions", params).await.map(|_| ())
    }
}

/// The remote QueueService.
pub struct RemoteQueue(pub Arc<RemoteService>);

#[async_trait]
impl QueueClient for RemoteQueue {
    async fn enqueue(
        &self,
        operation: Operation,
        priority: Priority,
        timestamp: DateTime<Utc>,
        job: Option<Job>,
    ) -> Result<bool, RpcError> {
        let params = serde_json::to_value(EnqueueParams {
            operation: operation.into(),
            priority,
            timestamp: TimestampPayload::Epoch(epoch_seconds(timestamp)),
            job,
        })
        .map_err(|e| RpcError::Protocol(e.into()))?;
        let data = self.0.call("enqueue", params).await?;
        serde_json::from_value(data).map_err(|e| RpcError::Protocol(e.into()))
    }
}

/// The remote scoring service.
pub struct RemoteScoring(pub Arc<RemoteService>);

#[async_trait]
impl ScoringClient for RemoteScoring {
    async fn new_evaluation(
        &self,
        submission_id: SubmissionId,
        dataset_id: DatasetId,
    ) -> Result<(), RpcError> {
        let params = json!({ "submission_id": submission_id, "dataset_id": dataset_id });
        self.0.call("new_evaluation", params).await.map(|_| ())
    }
}
