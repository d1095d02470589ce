// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker-ready payload for one operation.
//!
//! A `Job` carries everything a worker needs to execute without touching
//! the store: source and manager digests, dataset configuration, limits.
//! The worker fills in the result half and ships the same envelope back.
//! Only EvaluationService inspects the contents; QueueService treats jobs
//! as opaque JSON-able blobs.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sentinel blob digest marking an executable lost from the blob cache.
///
/// A worker handed a tombstone executable reports failure with
/// `plus.tombstone = true`; the compilation must then be re-run.
pub const TOMBSTONE_DIGEST: &str = "x";

/// Sandbox accounting attached to a worker result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_wall_clock_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<String>,
    /// Set when the executable the worker was handed was the tombstone
    /// sentinel rather than a real binary.
    #[serde(default)]
    pub tombstone: bool,
}

/// The envelope crossing the core boundary to a worker and back.
///
/// The input half is filled by EvaluationService from persisted state;
/// the result half (`success` onward) by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub operation: Operation,

    // Input half.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Source files, filename to blob digest.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Grader/checker managers, filename to blob digest.
    #[serde(default)]
    pub managers: BTreeMap<String, String>,
    /// Compiled executables, filename to blob digest (input for evaluations,
    /// output for compilations).
    #[serde(default)]
    pub executables: BTreeMap<String, String>,
    /// Testcase input digest (evaluations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Expected-output digest (submission evaluations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    pub task_type: String,
    #[serde(default)]
    pub task_type_parameters: Value,

    // Result half.
    /// Whether the worker completed the job on our side; `Some(false)`
    /// means an infrastructure failure, not a user outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Compilation verdict when `success` (compile jobs only): `true` if the
    /// sources compiled, `false` if the contestant's code was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation_success: Option<bool>,
    /// Evaluation outcome as a score fraction string (evaluate jobs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Human-readable messages from the sandbox.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
    /// Digest of the output produced on the contestant's input (user-test
    /// evaluations only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plus: Option<ExecutionStats>,
}

impl Job {
    /// An empty envelope for the given operation; the input half is filled
    /// by the job builder, the result half by the worker.
    pub fn new(operation: Operation, task_type: impl Into<String>) -> Self {
        Self {
            operation,
            language: None,
            files: BTreeMap::new(),
            managers: BTreeMap::new(),
            executables: BTreeMap::new(),
            input: None,
            output: None,
            time_limit: None,
            memory_limit: None,
            task_type: task_type.into(),
            task_type_parameters: Value::Null,
            success: None,
            compilation_success: None,
            outcome: None,
            text: Vec::new(),
            user_output: None,
            plus: None,
        }
    }

    /// Whether the worker reported our-side success.
    pub fn succeeded(&self) -> bool {
        self.success == Some(true)
    }

    /// Whether the result flags a tombstone executable.
    pub fn hit_tombstone(&self) -> bool {
        self.plus.as_ref().is_some_and(|plus| plus.tombstone)
    }
}

/// A batch of jobs shipped to one worker in a single RPC, so a worker with
/// multiple cores can pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobGroup {
    pub jobs: Vec<Job>,
}

impl JobGroup {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
