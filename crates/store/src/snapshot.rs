// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON snapshot of the data model, for seeding the in-memory store.
//!
//! The CLI loads one of these in place of a live relational store; tests
//! use it to describe fixtures declaratively.

use crate::error::StoreError;
use crate::mem::MemStore;
use crate::model::{Contest, Dataset, Submission, SubmissionResult, Task, UserTest, UserTestResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contests: Vec<Contest>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub user_tests: Vec<UserTest>,
    #[serde(default)]
    pub submission_results: Vec<SubmissionResult>,
    #[serde(default)]
    pub user_test_results: Vec<UserTestResult>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Snapshot(format!("{}: {}", path.display(), e)))
    }

    /// Materialize the snapshot into a fresh in-memory store.
    pub fn into_store(self) -> MemStore {
        let store = MemStore::new();
        for contest in self.contests {
            store.add_contest(contest);
        }
        for task in self.tasks {
            store.add_task(task);
        }
        for dataset in self.datasets {
            store.add_dataset(dataset);
        }
        for submission in self.submissions {
            store.add_submission(submission);
        }
        for user_test in self.user_tests {
            store.add_user_test(user_test);
        }
        for row in self.submission_results {
            store.put_submission_result(row);
        }
        for row in self.user_test_results {
            store.put_user_test_result(row);
        }
        store
    }
}
