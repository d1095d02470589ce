// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Construction of worker-ready jobs from persisted state.
//!
//! The job is the operation's complete execution context: once built, the
//! worker needs no store access. Evaluations pull the executables out of
//! the result row the preceding compilation committed.
//!
//! EvaluationService attaches a job to everything it enqueues; the worker
//! pool falls back to building one here for operations that arrive bare
//! (the sweeper's).

use crate::datastore::Datastore;
use crate::error::StoreError;
use crate::ops::USER_TEST_INPUT_CODENAME;
use gavel_core::{Job, Operation, OperationKind};
use thiserror::Error;

/// Why a job could not be assembled for an operation.
#[derive(Debug, Error)]
pub enum JobBuildError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("operation `{operation}` references testcase `{codename}` which the dataset lacks")]
    MissingTestcase { operation: Operation, codename: String },

    #[error("evaluate operation `{0}` carries no testcase codename")]
    MissingCodename(Operation),
}

/// Build the worker payload for one operation.
pub fn build_job(store: &dyn Datastore, operation: &Operation) -> Result<Job, JobBuildError> {
    let dataset = store.dataset(operation.dataset_id)?;
    let mut job = Job::new(operation.clone(), dataset.task_type.clone());
    job.task_type_parameters = dataset.task_type_parameters.clone();
    job.time_limit = dataset.time_limit;
    job.memory_limit = dataset.memory_limit;
    job.managers = dataset.managers.clone();

    match operation.kind {
        OperationKind::CompileSubmission => {
            let submission = store.submission(operation.submission_id().unwrap_or_default())?;
            job.language = submission.language;
            job.files = submission.files;
        }
        OperationKind::EvaluateSubmission => {
            let submission_id = operation.submission_id().unwrap_or_default();
            let submission = store.submission(submission_id)?;
            job.language = submission.language;
            job.files = submission.files;
            if let Some(row) = store.submission_result(submission_id, dataset.id) {
                job.executables = row.executables;
            }
            let codename = operation
                .testcase_codename
                .clone()
                .ok_or_else(|| JobBuildError::MissingCodename(operation.clone()))?;
            let testcase = dataset.testcases.get(&codename).ok_or_else(|| {
                JobBuildError::MissingTestcase { operation: operation.clone(), codename }
            })?;
            job.input = Some(testcase.input.clone());
            job.output = Some(testcase.output.clone());
        }
        OperationKind::CompileUserTest => {
            let user_test = store.user_test(operation.user_test_id().unwrap_or_default())?;
            job.language = user_test.language;
            job.files = user_test.files;
            // Contestant-provided managers shadow the dataset's.
            for (name, digest) in user_test.managers {
                job.managers.insert(name, digest);
            }
        }
        OperationKind::EvaluateUserTest => {
            let user_test_id = operation.user_test_id().unwrap_or_default();
            let user_test = store.user_test(user_test_id)?;
            job.language = user_test.language;
            job.files = user_test.files;
            job.input = Some(user_test.input);
            for (name, digest) in user_test.managers {
                job.managers.insert(name, digest);
            }
            if let Some(row) = store.user_test_result(user_test_id, dataset.id) {
                job.executables = row.executables;
            }
            let codename = operation.testcase_codename.as_deref();
            if codename != Some(USER_TEST_INPUT_CODENAME) {
                tracing::debug!(operation = %operation, "unusual user-test codename");
            }
        }
    }
    Ok(job)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
