// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! EvaluationService: result commit, retry policy, follow-up derivation.
//!
//! One writer lock serializes every mutating entry point, mirroring the
//! QueueService discipline: while a result is being committed, derivation
//! never observes a half-written row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gavel_core::{
    epoch_seconds, ContestId, DatasetId, Job, Operation, OperationKind, Priority, SubmissionId,
    UserTestId, TOMBSTONE_DIGEST,
};
use gavel_store::jobs::build_job;
use gavel_store::{
    ops, ops::DerivedOperation, CompilationOutcome, Dataset, Datastore, Evaluation, StoreError,
    Submission, SubmissionResult, UserTest, UserTestResult,
};
use gavel_wire::{EvalClient, FollowUp, QueueClient, RpcError, ScoringClient, WriteOutcome};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The persistence and policy authority.
pub struct EvaluationService {
    store: Arc<dyn Datastore>,
    queue: Arc<dyn QueueClient>,
    scoring: Arc<dyn ScoringClient>,
    /// The post-finish lock.
    lock: Mutex<()>,
}

impl EvaluationService {
    pub fn new(
        contest_id: Option<ContestId>,
        store: Arc<dyn Datastore>,
        queue: Arc<dyn QueueClient>,
        scoring: Arc<dyn ScoringClient>,
    ) -> Arc<Self> {
        info!(contest = ?contest_id, "evaluation service ready");
        Arc::new(Self { store, queue, scoring, lock: Mutex::new(()) })
    }

    /// Commit one worker result. Returns whether the commit succeeded and
    /// the follow-up operations QueueService should enqueue, each with
    /// its job attached so nothing needs re-deriving.
    pub fn write_result(&self, operation: Operation, job: Job) -> WriteOutcome {
        let _guard = self.lock.lock();
        let dataset = match self.store.dataset(operation.dataset_id) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(operation = %operation, error = %e, "dataset not found");
                return (false, Vec::new());
            }
        };
        if operation.for_submission() {
            self.write_submission_result(&operation, job, &dataset)
        } else {
            self.write_user_test_result(&operation, job, &dataset)
        }
    }

    /// Intake: a new submission exists; derive and enqueue its work.
    pub fn new_submission(
        &self,
        submission_id: SubmissionId,
        dataset_id: Option<DatasetId>,
        force_priority: Option<Priority>,
    ) {
        let _guard = self.lock.lock();
        self.new_submission_locked(submission_id, dataset_id, force_priority);
    }

    /// Bulk re-derivation, used by the invalidation fan-out.
    pub fn new_submissions(&self, submission_ids: Vec<SubmissionId>) {
        let _guard = self.lock.lock();
        for submission_id in submission_ids {
            self.new_submission_locked(submission_id, None, None);
        }
    }

    /// Intake: a new user test exists.
    pub fn new_user_test(&self, user_test_id: UserTestId) {
        let _guard = self.lock.lock();
        let user_test = match self.store.user_test(user_test_id) {
            Ok(user_test) => user_test,
            Err(e) => {
                error!(user_test = %user_test_id, error = %e, "new_user_test lookup failed");
                return;
            }
        };
        let operations = self.get_user_test_operations(&user_test);
        self.enqueue_all(operations, None);
    }

    fn new_submission_locked(
        &self,
        submission_id: SubmissionId,
        dataset_id: Option<DatasetId>,
        force_priority: Option<Priority>,
    ) {
        let submission = match self.store.submission(submission_id) {
            Ok(submission) => submission,
            Err(e) => {
                error!(submission = %submission_id, error = %e, "new_submission lookup failed");
                return;
            }
        };
        let dataset = match dataset_id {
            Some(id) => match self.store.dataset(id) {
                Ok(dataset) => Some(dataset),
                Err(e) => {
                    error!(dataset = %id, error = %e, "new_submission dataset lookup failed");
                    return;
                }
            },
            None => None,
        };
        let operations = self.get_submission_operations(&submission, dataset.as_ref());
        self.enqueue_all(operations, force_priority);
    }

    // Submission side.

    fn write_submission_result(
        &self,
        operation: &Operation,
        job: Job,
        dataset: &Dataset,
    ) -> WriteOutcome {
        let Some(submission_id) = operation.submission_id() else {
            return (false, Vec::new());
        };
        let submission = match self.store.submission(submission_id) {
            Ok(submission) => submission,
            Err(e) => {
                error!(operation = %operation, error = %e, "submission not found");
                return (false, Vec::new());
            }
        };
        let mut row = self.store.get_or_create_submission_result(submission_id, dataset.id);
        info!(operation = %operation, "writing result");

        let short_circuit = match self.apply_submission_job(&mut row, operation, &job, &submission)
        {
            Ok(operations) => operations,
            Err(StoreError::Integrity(msg)) => {
                // A concurrent writer got there first; the row already
                // holds this result.
                warn!(operation = %operation, detail = %msg, "integrity conflict; treating as written");
                return (true, Vec::new());
            }
            Err(e) => {
                error!(operation = %operation, error = %e, "commit failed");
                return (false, Vec::new());
            }
        };
        if !short_circuit.is_empty() {
            // The compilation was invalidated under us (tombstone); these
            // are the fresh operations for the whole submission.
            return (true, self.to_follow_ups(short_circuit));
        }

        if operation.kind == OperationKind::EvaluateSubmission {
            // Reload so concurrent evaluation inserts are visible.
            row = self.store.get_or_create_submission_result(submission_id, dataset.id);
            if !row.evaluated() && row.evaluations.len() == dataset.testcases.len() {
                row.set_evaluation_outcome();
                // Second commit; if it fails the outcome stays unset and
                // the finalize pass of the next derivation retries it.
                if let Err(e) = self.store.update_submission_result(&row) {
                    error!(operation = %operation, error = %e, "outcome commit failed");
                    return (false, Vec::new());
                }
            }
        }

        let follow_ups = match operation.kind {
            OperationKind::CompileSubmission => self.compilation_ended(&row, &submission),
            OperationKind::EvaluateSubmission if row.evaluated() => {
                self.evaluation_ended(&row, &submission)
            }
            _ => Vec::new(),
        };
        (true, self.to_follow_ups(follow_ups))
    }

    fn apply_submission_job(
        &self,
        row: &mut SubmissionResult,
        operation: &Operation,
        job: &Job,
        submission: &Submission,
    ) -> Result<Vec<DerivedOperation>, StoreError> {
        match operation.kind {
            OperationKind::CompileSubmission => {
                if job.succeeded() {
                    row.compilation_outcome = Some(if job.compilation_success == Some(true) {
                        CompilationOutcome::Ok
                    } else {
                        CompilationOutcome::Fail
                    });
                    row.compilation_text = job.text.clone();
                    row.executables = job.executables.clone();
                } else {
                    row.compilation_tries += 1;
                }
                self.store.update_submission_result(row)?;
                Ok(Vec::new())
            }
            OperationKind::EvaluateSubmission => {
                if job.succeeded() {
                    let codename = operation.testcase_codename.clone().unwrap_or_default();
                    let plus = job.plus.clone().unwrap_or_default();
                    self.store.insert_evaluation(
                        row.submission_id,
                        row.dataset_id,
                        Evaluation {
                            testcase_codename: codename,
                            outcome: job.outcome.clone(),
                            text: job.text.clone(),
                            execution_time: plus.execution_time,
                            execution_wall_clock_time: plus.execution_wall_clock_time,
                            execution_memory: plus.execution_memory,
                        },
                    )?;
                    Ok(Vec::new())
                } else if job.hit_tombstone() {
                    if row.executables.values().any(|digest| digest == TOMBSTONE_DIGEST) {
                        info!(
                            submission = %row.submission_id,
                            dataset = %row.dataset_id,
                            "stored executable was the tombstone; invalidating compilation"
                        );
                        row.invalidate_compilation();
                        self.store.update_submission_result(row)?;
                        self.store.clear_evaluations(row.submission_id, row.dataset_id);
                        Ok(self.get_submission_operations(submission, None))
                    } else {
                        // The worker's cache was stale but the stored
                        // executable is real; leave the tries budget alone.
                        Ok(Vec::new())
                    }
                } else {
                    row.evaluation_tries += 1;
                    self.store.update_submission_result(row)?;
                    Ok(Vec::new())
                }
            }
            _ => {
                error!(operation = %operation, "operation kind does not belong to a submission");
                Ok(Vec::new())
            }
        }
    }

    /// The operations currently missing for a submission; finalizes the
    /// evaluation outcome as a side effect when nothing is missing but
    /// the row is still waiting for one.
    fn get_submission_operations(
        &self,
        submission: &Submission,
        dataset: Option<&Dataset>,
    ) -> Vec<DerivedOperation> {
        let datasets: Vec<Dataset> = match dataset {
            Some(dataset) => vec![dataset.clone()],
            None => match self.store.datasets_to_judge(submission.task_id) {
                Ok(datasets) => datasets,
                Err(e) => {
                    error!(submission = %submission.id, error = %e, "datasets_to_judge failed");
                    return Vec::new();
                }
            },
        };
        let mut operations = Vec::new();
        for dataset in &datasets {
            let result = self.store.submission_result(submission.id, dataset.id);
            let derived = ops::submission_operations(result.as_ref(), submission, dataset);
            if derived.is_empty() && ops::submission_to_evaluate(result.as_ref()) {
                info!(
                    submission = %submission.id,
                    dataset = %dataset.id,
                    "result already has all evaluations; finalizing"
                );
                if let Some(mut row) = result {
                    row.set_evaluation_outcome();
                    match self.store.update_submission_result(&row) {
                        Ok(()) => {
                            let _ = self.evaluation_ended(&row, submission);
                        }
                        Err(e) => {
                            error!(submission = %submission.id, error = %e, "finalize commit failed")
                        }
                    }
                }
            } else {
                operations.extend(derived);
            }
        }
        operations
    }

    fn compilation_ended(
        &self,
        row: &SubmissionResult,
        submission: &Submission,
    ) -> Vec<DerivedOperation> {
        if row.compilation_succeeded() {
            info!(submission = %row.submission_id, dataset = %row.dataset_id, "compiled successfully");
        } else if row.compilation_failed() {
            info!(submission = %row.submission_id, dataset = %row.dataset_id, "did not compile");
            self.notify_scoring(row.submission_id, row.dataset_id);
        } else {
            warn!(
                submission = %row.submission_id,
                dataset = %row.dataset_id,
                tries = row.compilation_tries,
                "worker failed while compiling"
            );
            if row.compilation_tries >= ops::MAX_COMPILATION_TRIES {
                error!(
                    submission = %row.submission_id,
                    dataset = %row.dataset_id,
                    "maximum compilation failures reached"
                );
            }
        }
        self.get_submission_operations(submission, None)
    }

    fn evaluation_ended(
        &self,
        row: &SubmissionResult,
        submission: &Submission,
    ) -> Vec<DerivedOperation> {
        if row.evaluated() {
            info!(submission = %row.submission_id, dataset = %row.dataset_id, "evaluated successfully");
            self.notify_scoring(row.submission_id, row.dataset_id);
        } else {
            warn!(
                submission = %row.submission_id,
                dataset = %row.dataset_id,
                tries = row.evaluation_tries,
                "worker failed while evaluating"
            );
            if row.evaluation_tries >= ops::MAX_EVALUATION_TRIES {
                error!(
                    submission = %row.submission_id,
                    dataset = %row.dataset_id,
                    "maximum evaluation failures reached"
                );
            }
        }
        self.get_submission_operations(submission, None)
    }

    // User-test side.

    fn write_user_test_result(
        &self,
        operation: &Operation,
        job: Job,
        dataset: &Dataset,
    ) -> WriteOutcome {
        let Some(user_test_id) = operation.user_test_id() else {
            return (false, Vec::new());
        };
        let user_test = match self.store.user_test(user_test_id) {
            Ok(user_test) => user_test,
            Err(e) => {
                error!(operation = %operation, error = %e, "user test not found");
                return (false, Vec::new());
            }
        };
        let mut row = self.store.get_or_create_user_test_result(user_test_id, dataset.id);
        info!(operation = %operation, "writing user-test result");

        match operation.kind {
            OperationKind::CompileUserTest => {
                if job.succeeded() {
                    row.compilation_outcome = Some(if job.compilation_success == Some(true) {
                        CompilationOutcome::Ok
                    } else {
                        CompilationOutcome::Fail
                    });
                    row.compilation_text = job.text.clone();
                    row.executables = job.executables.clone();
                } else {
                    row.compilation_tries += 1;
                }
            }
            OperationKind::EvaluateUserTest => {
                if job.succeeded() {
                    row.evaluation_outcome = Some("ok".to_string());
                    row.output = job.user_output.clone();
                    if let Some(plus) = &job.plus {
                        row.execution_time = plus.execution_time;
                        row.execution_memory = plus.execution_memory;
                    }
                } else {
                    row.evaluation_tries += 1;
                }
            }
            _ => {
                error!(operation = %operation, "operation kind does not belong to a user test");
                return (false, Vec::new());
            }
        }
        if let Err(e) = self.store.update_user_test_result(&row) {
            error!(operation = %operation, error = %e, "user-test commit failed");
            return (false, Vec::new());
        }

        let follow_ups = match operation.kind {
            OperationKind::CompileUserTest => self.user_test_compilation_ended(&row, &user_test),
            OperationKind::EvaluateUserTest if row.evaluated() => {
                self.user_test_evaluation_ended(&row, &user_test)
            }
            _ => Vec::new(),
        };
        (true, self.to_follow_ups(follow_ups))
    }

    fn user_test_compilation_ended(
        &self,
        row: &UserTestResult,
        user_test: &UserTest,
    ) -> Vec<DerivedOperation> {
        if row.compilation_succeeded() {
            info!(user_test = %row.user_test_id, dataset = %row.dataset_id, "user test compiled");
        } else if row.compilation_failed() {
            info!(user_test = %row.user_test_id, dataset = %row.dataset_id, "user test did not compile");
        } else {
            warn!(
                user_test = %row.user_test_id,
                dataset = %row.dataset_id,
                tries = row.compilation_tries,
                "worker failed while compiling user test"
            );
            if row.compilation_tries >= ops::MAX_USER_TEST_COMPILATION_TRIES {
                error!(
                    user_test = %row.user_test_id,
                    dataset = %row.dataset_id,
                    "maximum user-test compilation failures reached"
                );
            }
        }
        self.get_user_test_operations(user_test)
    }

    fn user_test_evaluation_ended(
        &self,
        row: &UserTestResult,
        user_test: &UserTest,
    ) -> Vec<DerivedOperation> {
        if row.evaluated() {
            info!(user_test = %row.user_test_id, dataset = %row.dataset_id, "user test evaluated");
        } else {
            warn!(
                user_test = %row.user_test_id,
                dataset = %row.dataset_id,
                tries = row.evaluation_tries,
                "worker failed while evaluating user test"
            );
            if row.evaluation_tries >= ops::MAX_USER_TEST_EVALUATION_TRIES {
                error!(
                    user_test = %row.user_test_id,
                    dataset = %row.dataset_id,
                    "maximum user-test evaluation failures reached"
                );
            }
        }
        self.get_user_test_operations(user_test)
    }

    fn get_user_test_operations(&self, user_test: &UserTest) -> Vec<DerivedOperation> {
        let datasets = match self.store.datasets_to_judge(user_test.task_id) {
            Ok(datasets) => datasets,
            Err(e) => {
                error!(user_test = %user_test.id, error = %e, "datasets_to_judge failed");
                return Vec::new();
            }
        };
        let mut operations = Vec::new();
        for dataset in &datasets {
            let result = self.store.user_test_result(user_test.id, dataset.id);
            operations.extend(ops::user_test_operations(result.as_ref(), user_test, dataset));
        }
        operations
    }

    // Shared plumbing.

    fn notify_scoring(&self, submission_id: SubmissionId, dataset_id: DatasetId) {
        let scoring = Arc::clone(&self.scoring);
        tokio::spawn(async move {
            if let Err(e) = scoring.new_evaluation(submission_id, dataset_id).await {
                warn!(submission = %submission_id, error = %e, "scoring notification failed");
            }
        });
    }

    fn enqueue_all(&self, operations: Vec<DerivedOperation>, force_priority: Option<Priority>) {
        for (operation, priority, timestamp) in operations {
            let priority = force_priority.unwrap_or(priority);
            self.send_enqueue(operation, priority, timestamp);
        }
    }

    fn send_enqueue(&self, operation: Operation, priority: Priority, timestamp: DateTime<Utc>) {
        let job = match build_job(self.store.as_ref(), &operation) {
            Ok(job) => job,
            Err(e) => {
                error!(operation = %operation, error = %e, "cannot build job; not enqueueing");
                return;
            }
        };
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            match queue.enqueue(operation.clone(), priority, timestamp, Some(job)).await {
                Ok(true) => debug!(operation = %operation, "queued"),
                Ok(false) => debug!(operation = %operation, "already in the pipeline"),
                Err(e) => warn!(operation = %operation, error = %e, "enqueue failed"),
            }
        });
    }

    fn to_follow_ups(&self, operations: Vec<DerivedOperation>) -> Vec<FollowUp> {
        let mut follow_ups = Vec::new();
        for (operation, priority, timestamp) in operations {
            match build_job(self.store.as_ref(), &operation) {
                Ok(job) => follow_ups.push(FollowUp {
                    operation,
                    priority,
                    timestamp: epoch_seconds(timestamp),
                    job: Some(job),
                }),
                Err(e) => {
                    error!(operation = %operation, error = %e, "cannot build follow-up job; dropping");
                }
            }
        }
        follow_ups
    }
}

/// In-process [`EvalClient`] over a service instance, for single-host
/// wiring and tests.
pub struct LoopbackEval(pub Arc<EvaluationService>);

#[async_trait]
impl EvalClient for LoopbackEval {
    fn is_connected(&self) -> bool {
        true
    }

    async fn write_result(&self, operation: Operation, job: Job) -> Result<WriteOutcome, RpcError> {
        Ok(self.0.write_result(operation, job))
    }

    async fn new_submissions(&self, submission_ids: Vec<SubmissionId>) -> Result<(), RpcError> {
        self.0.new_submissions(submission_ids);
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
