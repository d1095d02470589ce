// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake RPC peers for tests: a scriptable worker and a recording
//! evaluation endpoint.

use async_trait::async_trait;
use gavel_core::{ContestId, Job, JobGroup, Operation, OperationKind, SubmissionId};
use gavel_wire::{EvalClient, RpcError, WorkerClient, WriteOutcome};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// How a [`FakeWorker`] answers `execute_job_group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeWorkerMode {
    /// Every job succeeds: compiles produce an executable, evaluations a
    /// full-score outcome.
    Success,
    /// Every job fails on our side (no user-facing outcome).
    OurFault,
    /// Evaluations fail flagging a tombstone executable.
    Tombstone,
    /// Never answer; the call hangs until the worker is dropped.
    Hang,
    /// Park each request until the test completes it via [`FakeWorker::respond`].
    Manual,
}

struct ParkedRequest {
    group: JobGroup,
    respond: oneshot::Sender<Result<JobGroup, RpcError>>,
}

/// In-process stand-in for a remote sandboxing worker.
pub struct FakeWorker {
    connected: AtomicBool,
    mode: Mutex<FakeWorkerMode>,
    parked: Mutex<VecDeque<ParkedRequest>>,
    parked_signal: crate::event::Event,
    executed: Mutex<Vec<JobGroup>>,
    quit_reasons: Mutex<Vec<String>>,
    precache_calls: AtomicUsize,
}

impl FakeWorker {
    pub fn new(mode: FakeWorkerMode) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            mode: Mutex::new(mode),
            parked: Mutex::new(VecDeque::new()),
            parked_signal: crate::event::Event::new(),
            executed: Mutex::new(Vec::new()),
            quit_reasons: Mutex::new(Vec::new()),
            precache_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_mode(&self, mode: FakeWorkerMode) {
        *self.mode.lock() = mode;
    }

    /// Job groups shipped to this worker so far.
    pub fn executed_groups(&self) -> Vec<JobGroup> {
        self.executed.lock().clone()
    }

    pub fn quit_reasons(&self) -> Vec<String> {
        self.quit_reasons.lock().clone()
    }

    pub fn precache_calls(&self) -> usize {
        self.precache_calls.load(Ordering::SeqCst)
    }

    /// Wait until a Manual-mode request is parked and return its group.
    pub async fn next_request(&self) -> JobGroup {
        loop {
            self.parked_signal.wait().await;
            let parked = self.parked.lock();
            if let Some(request) = parked.front() {
                return request.group.clone();
            }
        }
    }

    /// Complete the oldest parked request with the given result group.
    pub fn respond(&self, group: JobGroup) {
        let mut parked = self.parked.lock();
        if let Some(request) = parked.pop_front() {
            let _ = request.respond.send(Ok(group));
        }
        if parked.is_empty() {
            self.parked_signal.clear();
        }
    }

    /// Complete the worker's result for a group assuming everything went
    /// well, the way a healthy sandbox would.
    pub fn complete_success(group: &JobGroup) -> JobGroup {
        let jobs = group.jobs.iter().cloned().map(complete_job_success).collect();
        JobGroup::new(jobs)
    }

    /// Complete every job in the group as an our-fault failure.
    pub fn complete_failure(group: &JobGroup) -> JobGroup {
        let jobs = group
            .jobs
            .iter()
            .cloned()
            .map(|mut job| {
                job.success = Some(false);
                job
            })
            .collect();
        JobGroup::new(jobs)
    }
}

fn complete_job_success(mut job: Job) -> Job {
    job.success = Some(true);
    match job.operation.kind {
        OperationKind::CompileSubmission | OperationKind::CompileUserTest => {
            job.compilation_success = Some(true);
            job.text = vec!["OK".to_string()];
            job.executables.insert("sol".to_string(), format!("exe-{}", job.operation.object_id));
        }
        OperationKind::EvaluateSubmission => {
            job.outcome = Some("1.0".to_string());
            job.text = vec!["Output is correct".to_string()];
        }
        OperationKind::EvaluateUserTest => {
            job.outcome = Some("1.0".to_string());
            job.user_output = Some(format!("out-{}", job.operation.object_id));
        }
    }
    job
}

fn complete_job_tombstone(mut job: Job) -> Job {
    match job.operation.kind {
        OperationKind::EvaluateSubmission | OperationKind::EvaluateUserTest => {
            job.success = Some(false);
            job.plus = Some(gavel_core::ExecutionStats {
                tombstone: true,
                ..gavel_core::ExecutionStats::default()
            });
        }
        _ => return complete_job_success(job),
    }
    job
}

#[async_trait]
impl WorkerClient for FakeWorker {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn execute_job_group(&self, group: JobGroup) -> Result<JobGroup, RpcError> {
        self.executed.lock().push(group.clone());
        let mode = *self.mode.lock();
        match mode {
            FakeWorkerMode::Success => Ok(Self::complete_success(&group)),
            FakeWorkerMode::OurFault => Ok(Self::complete_failure(&group)),
            FakeWorkerMode::Tombstone => Ok(JobGroup::new(
                group.jobs.iter().cloned().map(complete_job_tombstone).collect(),
            )),
            FakeWorkerMode::Hang => std::future::pending().await,
            FakeWorkerMode::Manual => {
                let (tx, rx) = oneshot::channel();
                {
                    let mut parked = self.parked.lock();
                    parked.push_back(ParkedRequest { group, respond: tx });
                    self.parked_signal.set();
                }
                rx.await.unwrap_or(Err(RpcError::Disconnected))
            }
        }
    }

    async fn precache_files(&self, _contest: Option<ContestId>) -> Result<(), RpcError> {
        self.precache_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn quit(&self, reason: &str) -> Result<(), RpcError> {
        self.quit_reasons.lock().push(reason.to_string());
        Ok(())
    }
}

/// Recording stand-in for an EvaluationService endpoint.
pub struct FakeEval {
    connected: AtomicBool,
    delay: Mutex<Option<Duration>>,
    write_calls: Mutex<Vec<(Operation, Job)>>,
    new_submissions_calls: Mutex<Vec<Vec<SubmissionId>>>,
    scripted: Mutex<VecDeque<Result<WriteOutcome, RpcError>>>,
    fail_new_submissions: AtomicUsize,
}

impl FakeEval {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            delay: Mutex::new(None),
            write_calls: Mutex::new(Vec::new()),
            new_submissions_calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            fail_new_submissions: AtomicUsize::new(0),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Delay every RPC by this much (to observe in-flight states).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Queue a scripted `write_result` outcome; defaults to `(true, [])`.
    pub fn script_write(&self, outcome: Result<WriteOutcome, RpcError>) {
        self.scripted.lock().push_back(outcome);
    }

    /// Make the next `n` calls to `new_submissions` fail.
    pub fn fail_new_submissions_times(&self, n: usize) {
        self.fail_new_submissions.store(n, Ordering::SeqCst);
    }

    pub fn write_calls(&self) -> Vec<(Operation, Job)> {
        self.write_calls.lock().clone()
    }

    pub fn new_submissions_calls(&self) -> Vec<Vec<SubmissionId>> {
        self.new_submissions_calls.lock().clone()
    }
}

#[async_trait]
impl EvalClient for FakeEval {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn write_result(&self, operation: Operation, job: Job) -> Result<WriteOutcome, RpcError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.write_calls.lock().push((operation, job));
        match self.scripted.lock().pop_front() {
            Some(outcome) => outcome,
            None => Ok((true, Vec::new())),
        }
    }

    async fn new_submissions(&self, submission_ids: Vec<SubmissionId>) -> Result<(), RpcError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.fail_new_submissions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_new_submissions.store(remaining - 1, Ordering::SeqCst);
            return Err(RpcError::Disconnected);
        }
        self.new_submissions_calls.lock().push(submission_ids);
        Ok(())
    }
}
