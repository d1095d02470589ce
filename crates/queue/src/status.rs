// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only introspection DTOs for the admin surface.

use crate::worker::WorkerStatus;
use gavel_core::{Operation, Priority};
use serde::{Deserialize, Serialize};

/// One worker in `workers_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusEntry {
    pub connected: bool,
    pub status: WorkerStatus,
    /// Epoch seconds when the current batch started, if active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    pub operations: Vec<Operation>,
}

/// One collapsed entry in `queue_status`: per-testcase evaluations of the
/// same (type, object, dataset) fold into a multiplicity count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusEntry {
    pub operation: Operation,
    pub multiplicity: usize,
    pub priority: Priority,
    /// Epoch seconds.
    pub timestamp: f64,
}
