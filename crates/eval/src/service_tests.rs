// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{FakeQueue, FakeScoring};
use chrono::TimeZone;
use gavel_core::{ExecutionStats, ParticipationId, TaskId};
use gavel_store::{Contest, MemStore, Task, Testcase};
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

struct Rig {
    store: Arc<MemStore>,
    queue: Arc<FakeQueue>,
    scoring: Arc<FakeScoring>,
    service: Arc<EvaluationService>,
}

fn rig(testcases: &[&str]) -> Rig {
    let store = Arc::new(MemStore::new());
    store.add_contest(Contest { id: ContestId::new(1), name: "ioi".to_string() });
    store.add_task(Task {
        id: TaskId::new(1),
        contest_id: ContestId::new(1),
        name: "sum".to_string(),
        active_dataset_id: DatasetId::new(2),
    });
    let mut cases = BTreeMap::new();
    for codename in testcases {
        cases.insert(
            codename.to_string(),
            Testcase {
                codename: codename.to_string(),
                input: format!("in-{}", codename),
                output: format!("out-{}", codename),
            },
        );
    }
    store.add_dataset(Dataset {
        id: DatasetId::new(2),
        task_id: TaskId::new(1),
        description: "live".to_string(),
        autojudge: false,
        task_type: "batch".to_string(),
        task_type_parameters: serde_json::Value::Null,
        managers: BTreeMap::new(),
        time_limit: Some(1.0),
        memory_limit: Some(256),
        testcases: cases,
    });
    store.add_submission(Submission {
        id: SubmissionId::new(100),
        participation_id: ParticipationId::new(1),
        task_id: TaskId::new(1),
        timestamp: Utc.timestamp_opt(1_500_000, 0).single().unwrap(),
        language: Some("cpp".to_string()),
        files: BTreeMap::new(),
    });
    store.add_user_test(UserTest {
        id: UserTestId::new(5),
        participation_id: ParticipationId::new(1),
        task_id: TaskId::new(1),
        timestamp: Utc.timestamp_opt(1_500_100, 0).single().unwrap(),
        language: Some("cpp".to_string()),
        files: BTreeMap::new(),
        managers: BTreeMap::new(),
        input: "user-in".to_string(),
    });
    let queue = FakeQueue::new();
    let scoring = FakeScoring::new();
    let service = EvaluationService::new(
        Some(ContestId::new(1)),
        store.clone(),
        queue.clone(),
        scoring.clone(),
    );
    Rig { store, queue, scoring, service }
}

fn compile_op() -> Operation {
    Operation::compile_submission(SubmissionId::new(100), DatasetId::new(2))
}

fn eval_op(codename: &str) -> Operation {
    Operation::evaluate_submission(SubmissionId::new(100), DatasetId::new(2), codename)
}

fn successful_compile_job() -> Job {
    let mut job = Job::new(compile_op(), "batch");
    job.success = Some(true);
    job.compilation_success = Some(true);
    job.text = vec!["OK".to_string()];
    job.executables.insert("sum".to_string(), "exe-digest".to_string());
    job
}

fn successful_eval_job(codename: &str) -> Job {
    let mut job = Job::new(eval_op(codename), "batch");
    job.success = Some(true);
    job.outcome = Some("1.0".to_string());
    job.plus = Some(ExecutionStats {
        execution_time: Some(0.25),
        execution_memory: Some(1024),
        ..ExecutionStats::default()
    });
    job
}

async fn settle() {
    tokio::time::sleep(StdDuration::from_millis(50)).await;
}

#[tokio::test]
async fn compile_success_persists_artifacts_and_derives_evaluations() {
    let rig = rig(&["tc_01", "tc_02", "tc_03"]);
    let (success, follow_ups) = rig.service.write_result(compile_op(), successful_compile_job());
    assert!(success);

    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(row.compilation_succeeded());
    assert_eq!(row.executables["sum"], "exe-digest");
    assert_eq!(row.compilation_tries, 0);

    // One evaluate follow-up per testcase, each with a ready job.
    assert_eq!(follow_ups.len(), 3);
    assert!(follow_ups.iter().all(|f| f.operation.kind == OperationKind::EvaluateSubmission));
    assert!(follow_ups.iter().all(|f| f
        .job
        .as_ref()
        .is_some_and(|job| job.executables.contains_key("sum"))));
    // Scoring hears nothing until the evaluation finishes.
    settle().await;
    assert!(rig.scoring.notifications().is_empty());
}

#[tokio::test]
async fn user_compilation_failure_notifies_scoring_and_stops() {
    let rig = rig(&["tc_01"]);
    let mut job = successful_compile_job();
    job.compilation_success = Some(false);
    job.text = vec!["error: expected ';'".to_string()];

    let (success, follow_ups) = rig.service.write_result(compile_op(), job);
    assert!(success);
    assert!(follow_ups.is_empty());

    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(row.compilation_failed());

    settle().await;
    assert_eq!(
        rig.scoring.notifications(),
        vec![(SubmissionId::new(100), DatasetId::new(2))]
    );
}

#[tokio::test]
async fn our_fault_compile_failure_increments_tries_and_rederives() {
    let rig = rig(&["tc_01"]);
    let mut job = Job::new(compile_op(), "batch");
    job.success = Some(false);

    let (success, follow_ups) = rig.service.write_result(compile_op(), job.clone());
    assert!(success);
    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert_eq!(row.compilation_tries, 1);
    // The compile is re-derived as a follow-up, at the retry band.
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].operation, compile_op());
    assert_eq!(follow_ups[0].priority, Priority::INVALIDATED);

    // Two more failures exhaust the budget: no further follow-ups.
    let (_, follow_ups) = rig.service.write_result(compile_op(), job.clone());
    assert_eq!(follow_ups.len(), 1);
    let (success, follow_ups) = rig.service.write_result(compile_op(), job);
    assert!(success);
    assert!(follow_ups.is_empty());
    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert_eq!(row.compilation_tries, 3);
}

#[tokio::test]
async fn last_evaluation_finalizes_and_notifies_scoring_once() {
    let rig = rig(&["tc_01", "tc_02"]);
    rig.service.write_result(compile_op(), successful_compile_job());

    let (success, follow_ups) =
        rig.service.write_result(eval_op("tc_01"), successful_eval_job("tc_01"));
    assert!(success);
    assert!(follow_ups.is_empty(), "mid-evaluation writes derive nothing new");
    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(!row.evaluated());

    let (success, follow_ups) =
        rig.service.write_result(eval_op("tc_02"), successful_eval_job("tc_02"));
    assert!(success);
    assert!(follow_ups.is_empty());

    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(row.evaluated());
    assert_eq!(row.evaluations.len(), 2);
    assert_eq!(row.evaluations["tc_01"].execution_time, Some(0.25));

    settle().await;
    assert_eq!(
        rig.scoring.notifications(),
        vec![(SubmissionId::new(100), DatasetId::new(2))]
    );
}

#[tokio::test]
async fn duplicate_evaluation_write_is_idempotent_success() {
    let rig = rig(&["tc_01", "tc_02"]);
    rig.service.write_result(compile_op(), successful_compile_job());
    rig.service.write_result(eval_op("tc_01"), successful_eval_job("tc_01"));

    // A reassigned worker delivers the same result again.
    let (success, follow_ups) =
        rig.service.write_result(eval_op("tc_01"), successful_eval_job("tc_01"));
    assert!(success);
    assert!(follow_ups.is_empty());

    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert_eq!(row.evaluations.len(), 1);
    settle().await;
    assert!(rig.scoring.notifications().is_empty());
}

#[tokio::test]
async fn tombstone_invalidates_compilation_and_returns_a_fresh_batch() {
    let rig = rig(&["tc_01", "tc_02", "tc_03"]);
    let mut compile_job = successful_compile_job();
    compile_job
        .executables
        .insert("sum".to_string(), gavel_core::TOMBSTONE_DIGEST.to_string());
    rig.service.write_result(compile_op(), compile_job);

    let mut job = Job::new(eval_op("tc_02"), "batch");
    job.success = Some(false);
    job.plus = Some(ExecutionStats { tombstone: true, ..ExecutionStats::default() });

    let (success, follow_ups) = rig.service.write_result(eval_op("tc_02"), job);
    assert!(success);

    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(!row.compiled());
    assert!(row.evaluations.is_empty());
    // The whole submission is re-derived: one compile.
    assert_eq!(follow_ups.len(), 1);
    assert_eq!(follow_ups[0].operation, compile_op());
    // The lost evaluation itself was never persisted.
    assert_eq!(row.evaluation_tries, 0);
}

#[tokio::test]
async fn tombstone_flag_without_tombstone_executable_changes_nothing() {
    let rig = rig(&["tc_01"]);
    rig.service.write_result(compile_op(), successful_compile_job());

    let mut job = Job::new(eval_op("tc_01"), "batch");
    job.success = Some(false);
    job.plus = Some(ExecutionStats { tombstone: true, ..ExecutionStats::default() });

    let (success, follow_ups) = rig.service.write_result(eval_op("tc_01"), job);
    assert!(success);
    assert!(follow_ups.is_empty());
    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(row.compilation_succeeded());
    assert_eq!(row.evaluation_tries, 0);
}

#[tokio::test]
async fn evaluation_failures_are_bounded() {
    let rig = rig(&["tc_01"]);
    rig.service.write_result(compile_op(), successful_compile_job());

    let mut job = Job::new(eval_op("tc_01"), "batch");
    job.success = Some(false);

    for expected_tries in 1..=3 {
        let (success, _) = rig.service.write_result(eval_op("tc_01"), job.clone());
        assert!(success);
        let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
        assert_eq!(row.evaluation_tries, expected_tries);
    }
    // The budget is spent: nothing further derives from this submission.
    let (_, follow_ups) = rig.service.write_result(eval_op("tc_01"), job);
    assert!(follow_ups.is_empty());
    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert_eq!(row.evaluation_tries, 4);
}

#[tokio::test]
async fn unknown_dataset_is_an_invariant_violation() {
    let rig = rig(&["tc_01"]);
    let operation = Operation::compile_submission(SubmissionId::new(100), DatasetId::new(999));
    let (success, follow_ups) =
        rig.service.write_result(operation.clone(), Job::new(operation, "batch"));
    assert!(!success);
    assert!(follow_ups.is_empty());
}

#[tokio::test]
async fn new_submission_enqueues_with_jobs_attached() {
    let rig = rig(&["tc_01"]);
    rig.service.new_submission(SubmissionId::new(100), None, None);
    settle().await;

    let calls = rig.queue.calls();
    assert_eq!(calls.len(), 1);
    let (operation, priority, timestamp, job) = &calls[0];
    assert_eq!(*operation, compile_op());
    assert_eq!(*priority, Priority::SUBMISSION);
    assert_eq!(timestamp.timestamp(), 1_500_000);
    assert!(job.is_some());
}

#[tokio::test]
async fn new_submission_honors_forced_priority() {
    let rig = rig(&["tc_01"]);
    rig.service.new_submission(SubmissionId::new(100), None, Some(Priority::SWEEP));
    settle().await;
    assert_eq!(rig.queue.calls()[0].1, Priority::SWEEP);
}

#[tokio::test]
async fn new_submission_finalizes_stranded_results() {
    let rig = rig(&["tc_01"]);
    rig.service.write_result(compile_op(), successful_compile_job());
    rig.service.write_result(eval_op("tc_01"), successful_eval_job("tc_01"));

    // Simulate the outcome commit having been lost: all evaluations are
    // present but the outcome is unset.
    let mut row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    row.evaluation_outcome = None;
    rig.store.update_submission_result(&row).unwrap();
    settle().await;
    let scoring_before = rig.scoring.notifications().len();

    rig.service.new_submission(SubmissionId::new(100), None, None);
    settle().await;

    let row = rig.store.submission_result(SubmissionId::new(100), DatasetId::new(2)).unwrap();
    assert!(row.evaluated());
    assert!(rig.queue.calls().is_empty());
    assert_eq!(rig.scoring.notifications().len(), scoring_before + 1);
}

#[tokio::test]
async fn missing_submission_is_logged_not_fatal() {
    let rig = rig(&["tc_01"]);
    rig.service.new_submission(SubmissionId::new(999), None, None);
    settle().await;
    assert!(rig.queue.calls().is_empty());
}

#[tokio::test]
async fn bulk_new_submissions_skips_unknown_ids() {
    let rig = rig(&["tc_01"]);
    rig.service.new_submissions(vec![SubmissionId::new(999), SubmissionId::new(100)]);
    settle().await;
    assert_eq!(rig.queue.operations(), vec![compile_op()]);
}

#[tokio::test]
async fn user_test_pipeline_compile_then_evaluate() {
    let rig = rig(&["tc_01"]);
    rig.service.new_user_test(UserTestId::new(5));
    settle().await;
    let compile = Operation::compile_user_test(UserTestId::new(5), DatasetId::new(2));
    assert_eq!(rig.queue.operations(), vec![compile.clone()]);
    assert_eq!(rig.queue.calls()[0].1, Priority::INTERACTION);

    let mut job = Job::new(compile.clone(), "batch");
    job.success = Some(true);
    job.compilation_success = Some(true);
    job.executables.insert("sum".to_string(), "exe".to_string());
    let (success, follow_ups) = rig.service.write_result(compile, job);
    assert!(success);
    assert_eq!(follow_ups.len(), 1);
    let evaluate = follow_ups[0].operation.clone();
    assert_eq!(evaluate.kind, OperationKind::EvaluateUserTest);

    let mut job = Job::new(evaluate.clone(), "batch");
    job.success = Some(true);
    job.user_output = Some("produced-out".to_string());
    job.plus = Some(ExecutionStats {
        execution_time: Some(0.1),
        execution_memory: Some(512),
        ..ExecutionStats::default()
    });
    let (success, follow_ups) = rig.service.write_result(evaluate, job);
    assert!(success);
    assert!(follow_ups.is_empty());

    let row = rig.store.user_test_result(UserTestId::new(5), DatasetId::new(2)).unwrap();
    assert!(row.evaluated());
    assert_eq!(row.output.as_deref(), Some("produced-out"));
    assert_eq!(row.execution_time, Some(0.1));

    settle().await;
    // User tests never reach scoring.
    assert!(rig.scoring.notifications().is_empty());
}

#[tokio::test]
async fn user_test_compile_failures_are_bounded_too() {
    let rig = rig(&["tc_01"]);
    let compile = Operation::compile_user_test(UserTestId::new(5), DatasetId::new(2));
    let mut job = Job::new(compile.clone(), "batch");
    job.success = Some(false);
    for _ in 0..3 {
        rig.service.write_result(compile.clone(), job.clone());
    }
    let (_, follow_ups) = rig.service.write_result(compile.clone(), job);
    assert!(follow_ups.is_empty());
    let row = rig.store.user_test_result(UserTestId::new(5), DatasetId::new(2)).unwrap();
    assert_eq!(row.compilation_tries, 4);
}
