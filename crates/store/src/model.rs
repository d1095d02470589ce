// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rows of the contest data model, as seen by the dispatch core.
//!
//! Only the fields the core reads or mutates are modeled; everything else
//! (statements, attachments, users…) stays behind the store boundary.

use chrono::{DateTime, Utc};
use gavel_core::{ContestId, DatasetId, ParticipationId, SubmissionId, TaskId, UserTestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub contest_id: ContestId,
    pub name: String,
    /// The dataset shown to contestants; always judged.
    pub active_dataset_id: DatasetId,
}

/// One input/expected-output pair within a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testcase {
    pub codename: String,
    /// Blob digest of the input file.
    pub input: String,
    /// Blob digest of the expected output.
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub task_id: TaskId,
    pub description: String,
    /// Whether background judging covers this dataset even when inactive.
    #[serde(default)]
    pub autojudge: bool,
    pub task_type: String,
    #[serde(default)]
    pub task_type_parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    /// Grader/checker managers, filename to blob digest.
    #[serde(default)]
    pub managers: BTreeMap<String, String>,
    /// Testcases keyed by codename.
    #[serde(default)]
    pub testcases: BTreeMap<String, Testcase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub participation_id: ParticipationId,
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Source files, filename to blob digest.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTest {
    pub id: UserTestId,
    pub participation_id: ParticipationId,
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Contestant-provided managers, merged over the dataset's.
    #[serde(default)]
    pub managers: BTreeMap<String, String>,
    /// Blob digest of the contestant's input file.
    pub input: String,
}

/// Outcome of a compilation from the contestant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilationOutcome {
    Ok,
    Fail,
}

/// One evaluated testcase on a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub testcase_codename: String,
    /// Score fraction as produced by the grader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_wall_clock_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_memory: Option<u64>,
}

/// The row keyed on (submission, dataset) holding compile and evaluate
/// outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub submission_id: SubmissionId,
    pub dataset_id: DatasetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation_outcome: Option<CompilationOutcome>,
    #[serde(default)]
    pub compilation_text: Vec<String>,
    #[serde(default)]
    pub compilation_tries: i32,
    /// Compiled executables, filename to blob digest.
    #[serde(default)]
    pub executables: BTreeMap<String, String>,
    /// Evaluations keyed by testcase codename.
    #[serde(default)]
    pub evaluations: BTreeMap<String, Evaluation>,
    /// Set (to "ok") once every testcase has an evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_outcome: Option<String>,
    #[serde(default)]
    pub evaluation_tries: i32,
}

impl SubmissionResult {
    pub fn new(submission_id: SubmissionId, dataset_id: DatasetId) -> Self {
        Self {
            submission_id,
            dataset_id,
            compilation_outcome: None,
            compilation_text: Vec::new(),
            compilation_tries: 0,
            executables: BTreeMap::new(),
            evaluations: BTreeMap::new(),
            evaluation_outcome: None,
            evaluation_tries: 0,
        }
    }

    /// Whether compilation has terminated, either way.
    pub fn compiled(&self) -> bool {
        self.compilation_outcome.is_some()
    }

    pub fn compilation_succeeded(&self) -> bool {
        self.compilation_outcome == Some(CompilationOutcome::Ok)
    }

    pub fn compilation_failed(&self) -> bool {
        self.compilation_outcome == Some(CompilationOutcome::Fail)
    }

    /// Whether the evaluation outcome has been finalized.
    pub fn evaluated(&self) -> bool {
        self.evaluation_outcome.is_some()
    }

    /// Finalize the evaluation outcome once all testcases are in.
    pub fn set_evaluation_outcome(&mut self) {
        self.evaluation_outcome = Some("ok".to_string());
    }

    /// Drop every compilation artifact, which implies dropping the
    /// evaluation as well.
    pub fn invalidate_compilation(&mut self) {
        self.compilation_outcome = None;
        self.compilation_text.clear();
        self.compilation_tries = 0;
        self.executables.clear();
        self.invalidate_evaluation();
    }

    /// Drop the evaluation state, keeping the compilation.
    pub fn invalidate_evaluation(&mut self) {
        self.evaluations.clear();
        self.evaluation_outcome = None;
        self.evaluation_tries = 0;
    }
}

/// The row keyed on (user test, dataset); a user test evaluates on the
/// contestant's own input, so it carries a single evaluation inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTestResult {
    pub user_test_id: UserTestId,
    pub dataset_id: DatasetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation_outcome: Option<CompilationOutcome>,
    #[serde(default)]
    pub compilation_text: Vec<String>,
    #[serde(default)]
    pub compilation_tries: i32,
    #[serde(default)]
    pub executables: BTreeMap<String, String>,
    /// Set (to "ok") when the run on the contestant's input completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_outcome: Option<String>,
    /// Blob digest of the produced output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_memory: Option<u64>,
    #[serde(default)]
    pub evaluation_tries: i32,
}

impl UserTestResult {
    pub fn new(user_test_id: UserTestId, dataset_id: DatasetId) -> Self {
        Self {
            user_test_id,
            dataset_id,
            compilation_outcome: None,
            compilation_text: Vec::new(),
            compilation_tries: 0,
            executables: BTreeMap::new(),
            evaluation_outcome: None,
            output: None,
            execution_time: None,
            execution_memory: None,
            evaluation_tries: 0,
        }
    }

    pub fn compiled(&self) -> bool {
        self.compilation_outcome.is_some()
    }

    pub fn compilation_succeeded(&self) -> bool {
        self.compilation_outcome == Some(CompilationOutcome::Ok)
    }

    pub fn compilation_failed(&self) -> bool {
        self.compilation_outcome == Some(CompilationOutcome::Fail)
    }

    pub fn evaluated(&self) -> bool {
        self.evaluation_outcome.is_some()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
