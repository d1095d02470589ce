// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory datastore for tests and the single-host harness.

use crate::datastore::{Datastore, SubmissionFilter};
use crate::error::StoreError;
use crate::model::{
    Contest, Dataset, Evaluation, Submission, SubmissionResult, Task, UserTest, UserTestResult,
};
use gavel_core::{ContestId, DatasetId, SubmissionId, TaskId, UserTestId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Inner {
    contests: BTreeMap<ContestId, Contest>,
    tasks: BTreeMap<TaskId, Task>,
    datasets: BTreeMap<DatasetId, Dataset>,
    submissions: BTreeMap<SubmissionId, Submission>,
    user_tests: BTreeMap<UserTestId, UserTest>,
    submission_results: HashMap<(SubmissionId, DatasetId), SubmissionResult>,
    user_test_results: HashMap<(UserTestId, DatasetId), UserTestResult>,
}

/// Whole-dataset in memory, guarded by one mutex. Callers never observe a
/// partially applied mutation.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contest(&self, contest: Contest) {
        self.inner.lock().contests.insert(contest.id, contest);
    }

    pub fn add_task(&self, task: Task) {
        self.inner.lock().tasks.insert(task.id, task);
    }

    pub fn add_dataset(&self, dataset: Dataset) {
        self.inner.lock().datasets.insert(dataset.id, dataset);
    }

    pub fn add_submission(&self, submission: Submission) {
        self.inner.lock().submissions.insert(submission.id, submission);
    }

    pub fn add_user_test(&self, user_test: UserTest) {
        self.inner.lock().user_tests.insert(user_test.id, user_test);
    }

    pub fn put_submission_result(&self, row: SubmissionResult) {
        self.inner
            .lock()
            .submission_results
            .insert((row.submission_id, row.dataset_id), row);
    }

    pub fn put_user_test_result(&self, row: UserTestResult) {
        self.inner.lock().user_test_results.insert((row.user_test_id, row.dataset_id), row);
    }
}

impl Inner {
    fn contest_of_task(&self, task: TaskId) -> Option<ContestId> {
        self.tasks.get(&task).map(|t| t.contest_id)
    }
}

impl Datastore for MemStore {
    fn contest_ids(&self) -> Vec<ContestId> {
        self.inner.lock().contests.keys().copied().collect()
    }

    fn task(&self, id: TaskId) -> Result<Task, StoreError> {
        self.inner
            .lock()
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("task", id.as_i64()))
    }

    fn dataset(&self, id: DatasetId) -> Result<Dataset, StoreError> {
        self.inner
            .lock()
            .datasets
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("dataset", id.as_i64()))
    }

    fn submission(&self, id: SubmissionId) -> Result<Submission, StoreError> {
        self.inner
            .lock()
            .submissions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("submission", id.as_i64()))
    }

    fn user_test(&self, id: UserTestId) -> Result<UserTest, StoreError> {
        self.inner
            .lock()
            .user_tests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user test", id.as_i64()))
    }

    fn datasets_to_judge(&self, task: TaskId) -> Result<Vec<Dataset>, StoreError> {
        let inner = self.inner.lock();
        let task_row =
            inner.tasks.get(&task).ok_or_else(|| StoreError::not_found("task", task.as_i64()))?;
        let mut datasets: Vec<Dataset> = Vec::new();
        for dataset in inner.datasets.values() {
            if dataset.task_id != task {
                continue;
            }
            if dataset.id == task_row.active_dataset_id || dataset.autojudge {
                datasets.push(dataset.clone());
            }
        }
        Ok(datasets)
    }

    fn submissions(&self, contest: Option<ContestId>) -> Vec<Submission> {
        let inner = self.inner.lock();
        inner
            .submissions
            .values()
            .filter(|s| match contest {
                Some(c) => inner.contest_of_task(s.task_id) == Some(c),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn user_tests(&self, contest: Option<ContestId>) -> Vec<UserTest> {
        let inner = self.inner.lock();
        inner
            .user_tests
            .values()
            .filter(|t| match contest {
                Some(c) => inner.contest_of_task(t.task_id) == Some(c),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn submissions_matching(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>, StoreError> {
        let inner = self.inner.lock();
        // A dataset filter narrows by the dataset's task.
        let task_of_dataset = match filter.dataset {
            Some(dataset_id) => Some(
                inner
                    .datasets
                    .get(&dataset_id)
                    .ok_or_else(|| StoreError::not_found("dataset", dataset_id.as_i64()))?
                    .task_id,
            ),
            None => None,
        };
        Ok(inner
            .submissions
            .values()
            .filter(|s| {
                if let Some(id) = filter.submission {
                    return s.id == id;
                }
                if let Some(participation) = filter.participation {
                    if s.participation_id != participation {
                        return false;
                    }
                }
                if let Some(task) = filter.task.or(task_of_dataset) {
                    if s.task_id != task {
                        return false;
                    }
                }
                if let Some(contest) = filter.contest {
                    if inner.contest_of_task(s.task_id) != Some(contest) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect())
    }

    fn submission_result(
        &self,
        submission: SubmissionId,
        dataset: DatasetId,
    ) -> Option<SubmissionResult> {
        self.inner.lock().submission_results.get(&(submission, dataset)).cloned()
    }

    fn submission_results(&self, submission: SubmissionId) -> Vec<SubmissionResult> {
        let mut rows: Vec<SubmissionResult> = self
            .inner
            .lock()
            .submission_results
            .values()
            .filter(|row| row.submission_id == submission)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.dataset_id);
        rows
    }

    fn get_or_create_submission_result(
        &self,
        submission: SubmissionId,
        dataset: DatasetId,
    ) -> SubmissionResult {
        self.inner
            .lock()
            .submission_results
            .entry((submission, dataset))
            .or_insert_with(|| SubmissionResult::new(submission, dataset))
            .clone()
    }

    fn update_submission_result(&self, row: &SubmissionResult) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let stored = inner
            .submission_results
            .entry((row.submission_id, row.dataset_id))
            .or_insert_with(|| SubmissionResult::new(row.submission_id, row.dataset_id));
        stored.compilation_outcome = row.compilation_outcome;
        stored.compilation_text = row.compilation_text.clone();
        stored.compilation_tries = row.compilation_tries;
        stored.executables = row.executables.clone();
        stored.evaluation_outcome = row.evaluation_outcome.clone();
        stored.evaluation_tries = row.evaluation_tries;
        Ok(())
    }

    fn insert_evaluation(
        &self,
        submission: SubmissionId,
        dataset: DatasetId,
        evaluation: Evaluation,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let stored = inner
            .submission_results
            .entry((submission, dataset))
            .or_insert_with(|| SubmissionResult::new(submission, dataset));
        let codename = evaluation.testcase_codename.clone();
        if stored.evaluations.contains_key(&codename) {
            return Err(StoreError::Integrity(format!(
                "evaluation for submission {} dataset {} testcase {} already present",
                submission, dataset, codename
            )));
        }
        stored.evaluations.insert(codename, evaluation);
        Ok(())
    }

    fn clear_evaluations(&self, submission: SubmissionId, dataset: DatasetId) {
        let mut inner = self.inner.lock();
        if let Some(stored) = inner.submission_results.get_mut(&(submission, dataset)) {
            stored.evaluations.clear();
        }
    }

    fn user_test_result(
        &self,
        user_test: UserTestId,
        dataset: DatasetId,
    ) -> Option<UserTestResult> {
        self.inner.lock().user_test_results.get(&(user_test, dataset)).cloned()
    }

    fn get_or_create_user_test_result(
        &self,
        user_test: UserTestId,
        dataset: DatasetId,
    ) -> UserTestResult {
        self.inner
            .lock()
            .user_test_results
            .entry((user_test, dataset))
            .or_insert_with(|| UserTestResult::new(user_test, dataset))
            .clone()
    }

    fn update_user_test_result(&self, row: &UserTestResult) -> Result<(), StoreError> {
        self.inner
            .lock()
            .user_test_results
            .insert((row.user_test_id, row.dataset_id), row.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
