// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between the dispatch core and the relational store.

use crate::error::StoreError;
use crate::model::{
    Dataset, Evaluation, Submission, SubmissionResult, Task, UserTest, UserTestResult,
};
use gavel_core::{ContestId, DatasetId, ParticipationId, SubmissionId, TaskId, UserTestId};

/// Filter for resolving the target set of an invalidation.
///
/// The broadest non-empty combination wins; an all-`None` filter matches
/// every submission the service can see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub contest: Option<ContestId>,
    pub submission: Option<SubmissionId>,
    pub dataset: Option<DatasetId>,
    pub participation: Option<ParticipationId>,
    pub task: Option<TaskId>,
}

/// Read/write access to the rows the core manipulates.
///
/// Methods are synchronous: implementations are either in-memory or thin
/// session wrappers, and callers hold the service writer lock across
/// calls — the serialization invariant depends on that.
pub trait Datastore: Send + Sync {
    fn contest_ids(&self) -> Vec<ContestId>;
    fn task(&self, id: TaskId) -> Result<Task, StoreError>;
    /// Load a dataset together with its testcases.
    fn dataset(&self, id: DatasetId) -> Result<Dataset, StoreError>;
    fn submission(&self, id: SubmissionId) -> Result<Submission, StoreError>;
    fn user_test(&self, id: UserTestId) -> Result<UserTest, StoreError>;

    /// The datasets a submission or user test on this task must be judged
    /// on: the active dataset plus every autojudge dataset.
    fn datasets_to_judge(&self, task: TaskId) -> Result<Vec<Dataset>, StoreError>;

    /// All submissions, optionally restricted to one contest.
    fn submissions(&self, contest: Option<ContestId>) -> Vec<Submission>;
    /// All user tests, optionally restricted to one contest.
    fn user_tests(&self, contest: Option<ContestId>) -> Vec<UserTest>;
    /// Submissions matching an invalidation filter.
    fn submissions_matching(&self, filter: &SubmissionFilter)
        -> Result<Vec<Submission>, StoreError>;

    fn submission_result(
        &self,
        submission: SubmissionId,
        dataset: DatasetId,
    ) -> Option<SubmissionResult>;
    /// Every result row of one submission, across datasets.
    fn submission_results(&self, submission: SubmissionId) -> Vec<SubmissionResult>;
    /// Load the result row, creating an empty one if absent.
    fn get_or_create_submission_result(
        &self,
        submission: SubmissionId,
        dataset: DatasetId,
    ) -> SubmissionResult;
    /// Write back the scalar fields of a result row (outcomes, tries,
    /// texts, executables). Stored evaluations are untouched.
    fn update_submission_result(&self, row: &SubmissionResult) -> Result<(), StoreError>;
    /// Insert one evaluation; `StoreError::Integrity` if the testcase
    /// already has one.
    fn insert_evaluation(
        &self,
        submission: SubmissionId,
        dataset: DatasetId,
        evaluation: Evaluation,
    ) -> Result<(), StoreError>;
    /// Delete every evaluation of a result row.
    fn clear_evaluations(&self, submission: SubmissionId, dataset: DatasetId);

    fn user_test_result(&self, user_test: UserTestId, dataset: DatasetId)
        -> Option<UserTestResult>;
    fn get_or_create_user_test_result(
        &self,
        user_test: UserTestId,
        dataset: DatasetId,
    ) -> UserTestResult;
    /// Write back a user-test result row.
    fn update_user_test_result(&self, row: &UserTestResult) -> Result<(), StoreError>;
}
