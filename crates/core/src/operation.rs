// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The atomic unit of scheduled work: compile or evaluate one object on
//! one dataset.
//!
//! Operation identity — `(kind, object_id, dataset_id, testcase_codename)`
//! — is the primary key throughout the dispatch core: the queue, the worker
//! pool and the pending-result store all dedup on it.

use crate::ids::{DatasetId, SubmissionId, UserTestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// What a worker is asked to do with the target object.
///
/// The numeric values are the wire type tags and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OperationKind {
    CompileSubmission = 0,
    EvaluateSubmission = 1,
    CompileUserTest = 2,
    EvaluateUserTest = 3,
}

impl OperationKind {
    /// Whether this kind targets a submission (as opposed to a user test).
    pub fn for_submission(self) -> bool {
        matches!(self, OperationKind::CompileSubmission | OperationKind::EvaluateSubmission)
    }

    /// Whether this kind is an evaluation (carries a testcase codename).
    pub fn is_evaluation(self) -> bool {
        matches!(self, OperationKind::EvaluateSubmission | OperationKind::EvaluateUserTest)
    }
}

impl From<OperationKind> for u8 {
    fn from(kind: OperationKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for OperationKind {
    type Error = OperationParseError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(OperationKind::CompileSubmission),
            1 => Ok(OperationKind::EvaluateSubmission),
            2 => Ok(OperationKind::CompileUserTest),
            3 => Ok(OperationKind::EvaluateUserTest),
            other => Err(OperationParseError::UnknownKind(other)),
        }
    }
}

crate::simple_display! {
    OperationKind {
        CompileSubmission => "compile submission",
        EvaluateSubmission => "evaluate submission",
        CompileUserTest => "compile user test",
        EvaluateUserTest => "evaluate user test",
    }
}

/// Errors decoding an operation from its wire list form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationParseError {
    #[error("operation list must have 4 elements, got {0}")]
    WrongLength(usize),
    #[error("unknown operation type tag {0}")]
    UnknownKind(u8),
    #[error("operation field `{0}` has the wrong type")]
    BadField(&'static str),
}

/// One unit of work to dispatch to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Submission id or user-test id, depending on `kind`.
    pub object_id: i64,
    pub dataset_id: DatasetId,
    /// Present iff `kind` is an evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testcase_codename: Option<String>,
}

impl Operation {
    /// A compile operation for a submission on a dataset.
    pub fn compile_submission(submission: SubmissionId, dataset: DatasetId) -> Self {
        Self {
            kind: OperationKind::CompileSubmission,
            object_id: submission.as_i64(),
            dataset_id: dataset,
            testcase_codename: None,
        }
    }

    /// An evaluate operation for one testcase of a submission on a dataset.
    pub fn evaluate_submission(
        submission: SubmissionId,
        dataset: DatasetId,
        codename: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::EvaluateSubmission,
            object_id: submission.as_i64(),
            dataset_id: dataset,
            testcase_codename: Some(codename.into()),
        }
    }

    /// A compile operation for a user test on a dataset.
    pub fn compile_user_test(user_test: UserTestId, dataset: DatasetId) -> Self {
        Self {
            kind: OperationKind::CompileUserTest,
            object_id: user_test.as_i64(),
            dataset_id: dataset,
            testcase_codename: None,
        }
    }

    /// An evaluate operation for one testcase of a user test on a dataset.
    pub fn evaluate_user_test(
        user_test: UserTestId,
        dataset: DatasetId,
        codename: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::EvaluateUserTest,
            object_id: user_test.as_i64(),
            dataset_id: dataset,
            testcase_codename: Some(codename.into()),
        }
    }

    pub fn for_submission(&self) -> bool {
        self.kind.for_submission()
    }

    /// The object id as a submission id, if this operation targets one.
    pub fn submission_id(&self) -> Option<SubmissionId> {
        self.for_submission().then(|| SubmissionId::new(self.object_id))
    }

    /// The object id as a user-test id, if this operation targets one.
    pub fn user_test_id(&self) -> Option<UserTestId> {
        (!self.for_submission()).then(|| UserTestId::new(self.object_id))
    }

    /// Encode to the wire list form `[typeTag, objectId, datasetId, codename|null]`.
    pub fn to_list(&self) -> Value {
        Value::Array(vec![
            Value::from(u8::from(self.kind)),
            Value::from(self.object_id),
            Value::from(self.dataset_id.as_i64()),
            self.testcase_codename.clone().map(Value::from).unwrap_or(Value::Null),
        ])
    }

    /// Decode from the wire list form.
    pub fn from_list(list: &[Value]) -> Result<Self, OperationParseError> {
        if list.len() != 4 {
            return Err(OperationParseError::WrongLength(list.len()));
        }
        let tag = list[0]
            .as_u64()
            .and_then(|t| u8::try_from(t).ok())
            .ok_or(OperationParseError::BadField("type"))?;
        let kind = OperationKind::try_from(tag)?;
        let object_id = list[1].as_i64().ok_or(OperationParseError::BadField("object_id"))?;
        let dataset_id = list[2].as_i64().ok_or(OperationParseError::BadField("dataset_id"))?;
        let testcase_codename = match &list[3] {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            _ => return Err(OperationParseError::BadField("testcase_codename")),
        };
        if kind.is_evaluation() != testcase_codename.is_some() {
            return Err(OperationParseError::BadField("testcase_codename"));
        }
        Ok(Self { kind, object_id, dataset_id: DatasetId::new(dataset_id), testcase_codename })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.testcase_codename {
            Some(codename) => write!(
                f,
                "{} {} on dataset {} testcase {}",
                self.kind, self.object_id, self.dataset_id, codename
            ),
            None => write!(f, "{} {} on dataset {}", self.kind, self.object_id, self.dataset_id),
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
