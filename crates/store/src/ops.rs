// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derivation of the operations an object still needs.
//!
//! Given a result row, a submission (or user test) and a dataset, these
//! queries emit the compile/evaluate operations that are missing. They are
//! shared by EvaluationService (to drive new arrivals and follow-ups) and
//! by the QueueService sweeper (to re-discover lost work).

use crate::datastore::Datastore;
use crate::model::{Dataset, Submission, SubmissionResult, UserTest, UserTestResult};
use chrono::{DateTime, Utc};
use gavel_core::{ContestId, Operation, Priority};

pub const MAX_COMPILATION_TRIES: i32 = 3;
pub const MAX_EVALUATION_TRIES: i32 = 3;
pub const MAX_USER_TEST_COMPILATION_TRIES: i32 = 3;
pub const MAX_USER_TEST_EVALUATION_TRIES: i32 = 3;

/// Codename of the single pseudo-testcase a user test evaluates on (its
/// own input).
pub const USER_TEST_INPUT_CODENAME: &str = "input";

/// An operation the store says is missing, with its scheduling band and
/// the timestamp of the object that wants it.
pub type DerivedOperation = (Operation, Priority, DateTime<Utc>);

fn retry_priority(first: Priority, tries: i32) -> Priority {
    if tries == 0 {
        first
    } else {
        Priority::INVALIDATED
    }
}

/// Operations currently missing for a submission on one dataset.
///
/// Emits nothing once the compilation failed for the contestant, or once
/// the bounded-retry caps are exhausted.
pub fn submission_operations(
    result: Option<&SubmissionResult>,
    submission: &Submission,
    dataset: &Dataset,
) -> Vec<DerivedOperation> {
    let mut operations = Vec::new();
    match result {
        None => {
            operations.push((
                Operation::compile_submission(submission.id, dataset.id),
                Priority::SUBMISSION,
                submission.timestamp,
            ));
        }
        Some(row) if !row.compiled() => {
            if row.compilation_tries < MAX_COMPILATION_TRIES {
                operations.push((
                    Operation::compile_submission(submission.id, dataset.id),
                    retry_priority(Priority::SUBMISSION, row.compilation_tries),
                    submission.timestamp,
                ));
            }
        }
        Some(row) if row.compilation_succeeded() && !row.evaluated() => {
            if row.evaluation_tries < MAX_EVALUATION_TRIES {
                let priority = retry_priority(Priority::SUBMISSION, row.evaluation_tries);
                for codename in dataset.testcases.keys() {
                    if !row.evaluations.contains_key(codename) {
                        operations.push((
                            Operation::evaluate_submission(submission.id, dataset.id, codename),
                            priority,
                            submission.timestamp,
                        ));
                    }
                }
            }
        }
        Some(_) => {}
    }
    operations
}

/// Whether the scheduler is still interested in evaluating the submission:
/// compiled successfully, no outcome yet, retry budget not exhausted.
pub fn submission_to_evaluate(result: Option<&SubmissionResult>) -> bool {
    result.is_some_and(|row| {
        row.compilation_succeeded()
            && !row.evaluated()
            && row.evaluation_tries < MAX_EVALUATION_TRIES
    })
}

/// Operations currently missing for a user test on one dataset.
pub fn user_test_operations(
    result: Option<&UserTestResult>,
    user_test: &UserTest,
    dataset: &Dataset,
) -> Vec<DerivedOperation> {
    let mut operations = Vec::new();
    match result {
        None => {
            operations.push((
                Operation::compile_user_test(user_test.id, dataset.id),
                Priority::INTERACTION,
                user_test.timestamp,
            ));
        }
        Some(row) if !row.compiled() => {
            if row.compilation_tries < MAX_USER_TEST_COMPILATION_TRIES {
                operations.push((
                    Operation::compile_user_test(user_test.id, dataset.id),
                    retry_priority(Priority::INTERACTION, row.compilation_tries),
                    user_test.timestamp,
                ));
            }
        }
        Some(row) if row.compilation_succeeded() && !row.evaluated() => {
            if row.evaluation_tries < MAX_USER_TEST_EVALUATION_TRIES {
                operations.push((
                    Operation::evaluate_user_test(
                        user_test.id,
                        dataset.id,
                        USER_TEST_INPUT_CODENAME,
                    ),
                    retry_priority(Priority::INTERACTION, row.evaluation_tries),
                    user_test.timestamp,
                ));
            }
        }
        Some(_) => {}
    }
    operations
}

/// Sweep query: every submission operation missing across the contest (or
/// across all contests when `contest` is `None`), at sweep priority.
pub fn missing_submission_operations(
    store: &dyn Datastore,
    contest: Option<ContestId>,
) -> Vec<DerivedOperation> {
    let mut missing = Vec::new();
    for submission in store.submissions(contest) {
        let datasets = match store.datasets_to_judge(submission.task_id) {
            Ok(datasets) => datasets,
            Err(err) => {
                tracing::warn!(submission = %submission.id, error = %err, "sweep skipping submission");
                continue;
            }
        };
        for dataset in datasets {
            let result = store.submission_result(submission.id, dataset.id);
            for (operation, _, timestamp) in
                submission_operations(result.as_ref(), &submission, &dataset)
            {
                missing.push((operation, Priority::SWEEP, timestamp));
            }
        }
    }
    missing
}

/// Sweep query: every user-test operation missing across the contest.
pub fn missing_user_test_operations(
    store: &dyn Datastore,
    contest: Option<ContestId>,
) -> Vec<DerivedOperation> {
    let mut missing = Vec::new();
    for user_test in store.user_tests(contest) {
        let datasets = match store.datasets_to_judge(user_test.task_id) {
            Ok(datasets) => datasets,
            Err(err) => {
                tracing::warn!(user_test = %user_test.id, error = %err, "sweep skipping user test");
                continue;
            }
        };
        for dataset in datasets {
            let result = store.user_test_result(user_test.id, dataset.id);
            for (operation, _, timestamp) in
                user_test_operations(result.as_ref(), &user_test, &dataset)
            {
                missing.push((operation, Priority::SWEEP, timestamp));
            }
        }
    }
    missing
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
