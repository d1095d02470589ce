// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response envelopes and the parameter DTOs of each RPC method.
//!
//! Operations are accepted in either their wire list form or the
//! structured map form; timestamps as epoch seconds or RFC 3339 text.

use chrono::{DateTime, Utc};
use gavel_core::{
    from_epoch_seconds, ContestId, DatasetId, Job, JobGroup, Operation, OperationParseError,
    ParticipationId, Priority, SubmissionId, TaskId, UserTestId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One RPC call: a wire-symbol method name plus its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { method: method.into(), params }
    }
}

/// The reply to an [`RpcRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    pub fn success(data: Value) -> Self {
        Self { ok: true, data, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { ok: false, data: Value::Null, error: Some(message.into()) }
    }
}

/// An operation in either encoding accepted on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationPayload {
    List(Vec<Value>),
    Structured(Operation),
}

impl OperationPayload {
    pub fn resolve(&self) -> Result<Operation, OperationParseError> {
        match self {
            OperationPayload::List(list) => Operation::from_list(list),
            OperationPayload::Structured(operation) => Ok(operation.clone()),
        }
    }
}

impl From<Operation> for OperationPayload {
    fn from(operation: Operation) -> Self {
        OperationPayload::Structured(operation)
    }
}

/// A timestamp as epoch seconds or RFC 3339 text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampPayload {
    Epoch(f64),
    Text(String),
}

impl TimestampPayload {
    pub fn resolve(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        match self {
            TimestampPayload::Epoch(seconds) => Ok(from_epoch_seconds(*seconds)),
            TimestampPayload::Text(text) => {
                Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
            }
        }
    }
}

/// Parameters of `enqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueParams {
    pub operation: OperationPayload,
    pub priority: Priority,
    pub timestamp: TimestampPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
}

/// Which layer of results an invalidation clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidateLevel {
    Compilation,
    Evaluation,
}

gavel_core::simple_display! {
    InvalidateLevel {
        Compilation => "compilation",
        Evaluation => "evaluation",
    }
}

/// Parameters of `invalidate_submission`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<ContestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<SubmissionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<DatasetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_id: Option<ParticipationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default = "default_level")]
    pub level: InvalidateLevel,
}

impl Default for InvalidateLevel {
    fn default() -> Self {
        InvalidateLevel::Compilation
    }
}

fn default_level() -> InvalidateLevel {
    InvalidateLevel::Compilation
}

/// Parameters of `write_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResultParams {
    pub operation: OperationPayload,
    pub job: Job,
}

/// One follow-up operation returned by `write_result`, carrying enough to
/// re-enqueue without re-deriving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub operation: Operation,
    pub priority: Priority,
    /// Epoch seconds, matching the transport encoding of timestamps.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
}

impl FollowUp {
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        from_epoch_seconds(self.timestamp)
    }
}

/// Parameters of `new_submission`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmissionParams {
    pub submission_id: SubmissionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<DatasetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_priority: Option<Priority>,
}

/// Parameters of `new_submissions` (bulk re-derivation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmissionsParams {
    pub submission_ids: Vec<SubmissionId>,
}

/// Parameters of `new_user_test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserTestParams {
    pub user_test_id: UserTestId,
}

/// Parameters of `precache_files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecacheParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<ContestId>,
}

/// Parameters of `quit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuitParams {
    pub reason: String,
}

/// Parameters of `disable_worker` / `enable_worker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardParams {
    pub shard: u32,
}

/// Parameters of `execute_job_group`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobGroupParams {
    pub job_group: JobGroup,
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
