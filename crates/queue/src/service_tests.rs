// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pending::StagedResult;
use crate::pool::WORKER_TIMEOUT_SECS;
use crate::test_support::{FakeEval, FakeWorker, FakeWorkerMode};
use chrono::TimeZone;
use gavel_core::{DatasetId, FakeClock, ParticipationId, SubmissionId, TaskId};
use gavel_store::{Contest, Dataset, MemStore, Submission, Task, Testcase};
use std::time::Duration as StdDuration;

fn seeded_store(testcases: &[&str]) -> Arc<MemStore> {
    let store = Arc::new(MemStore::new());
    store.add_contest(Contest { id: ContestId::new(1), name: "ioi".to_string() });
    store.add_task(Task {
        id: TaskId::new(1),
        contest_id: ContestId::new(1),
        name: "sum".to_string(),
        active_dataset_id: DatasetId::new(2),
    });
    let mut cases = std::collections::BTreeMap::new();
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
        managers: Default::default(),
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
        files: std::collections::BTreeMap::new(),
    });
    store
}

fn ts(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap()
}

fn eval_op(codename: &str) -> Operation {
    Operation::evaluate_submission(SubmissionId::new(100), DatasetId::new(2), codename)
}

fn with_job(operation: Operation) -> Option<Job> {
    Some(Job::new(operation, "batch"))
}

/// Poll until the pipeline reaches the expected state.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("pipeline did not reach the expected state in time");
}

#[tokio::test]
async fn enqueue_dedups_across_queue_and_pending() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    let op = eval_op("tc_01");
    assert!(service.enqueue(op.clone(), Priority::SUBMISSION, ts(1), with_job(op.clone())));
    assert!(!service.enqueue(op.clone(), Priority::SUBMISSION, ts(1), with_job(op.clone())));

    // An operation whose result is pending is also refused.
    let staged_op = eval_op("tc_02");
    service.pending.add(
        staged_op.clone(),
        StagedResult {
            job: Job::new(staged_op.clone(), "batch"),
            priority: Priority::SUBMISSION,
            timestamp: ts(1),
        },
    );
    assert!(!service.enqueue(staged_op.clone(), Priority::SUBMISSION, ts(1), with_job(staged_op)));
}

#[tokio::test]
async fn jobless_enqueue_is_accepted_with_a_warning() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    assert!(service.enqueue(eval_op("tc_01"), Priority::SWEEP, ts(1), None));
    assert!(service.contains_operation(&eval_op("tc_01")));
}

#[tokio::test]
async fn queue_status_collapses_evaluations_and_sorts() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    for codename in ["tc_01", "tc_02", "tc_03"] {
        let op = eval_op(codename);
        service.enqueue(op.clone(), Priority::SUBMISSION, ts(10), with_job(op));
    }
    let compile = Operation::compile_submission(SubmissionId::new(101), DatasetId::new(2));
    service.enqueue(compile.clone(), Priority::INTERACTION, ts(20), with_job(compile));

    let status = service.queue_status();
    assert_eq!(status.len(), 2);
    // Most urgent first, despite the later timestamp.
    assert_eq!(status[0].operation.object_id, 101);
    assert_eq!(status[0].multiplicity, 1);
    assert_eq!(status[1].operation.object_id, 100);
    assert_eq!(status[1].multiplicity, 3);
}

#[tokio::test]
async fn sweeper_enqueues_missing_work_and_respects_blockers() {
    let store = seeded_store(&["tc_01"]);
    let service = QueueService::new(Some(ContestId::new(1)), store, FakeClock::new());

    service.sweeper_blockers.get_and_add(1);
    assert_eq!(service.sweep_missing(), 0);

    service.sweeper_blockers.get_and_add(-1);
    // Submission 100 has no result row: its compile operation is missing.
    assert_eq!(service.sweep_missing(), 1);
    assert!(service.contains_operation(&Operation::compile_submission(
        SubmissionId::new(100),
        DatasetId::new(2)
    )));
    // Idempotent: re-running the sweep does not double-enqueue.
    assert_eq!(service.sweep_missing(), 0);
}

#[tokio::test]
async fn completed_batch_flows_to_the_evaluation_service() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    let worker = FakeWorker::new(FakeWorkerMode::Success);
    service.add_worker(Shard(0), worker).unwrap();
    let eval = FakeEval::new();
    service.add_eval_client(eval.clone());
    service.start();

    let op = Operation::compile_submission(SubmissionId::new(100), DatasetId::new(2));
    assert!(service.enqueue(op.clone(), Priority::SUBMISSION, ts(5), with_job(op.clone())));

    wait_until(|| eval.write_calls().len() == 1).await;
    let calls = eval.write_calls();
    assert_eq!(calls[0].0, op);
    assert!(calls[0].1.succeeded());

    // Fully drained: the operation is nowhere in the pipeline.
    wait_until(|| !service.contains_operation(&op)).await;
    assert_eq!(service.pending_counts(), (0, 0));
}

#[tokio::test]
async fn result_without_eval_service_is_discarded() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    let worker = FakeWorker::new(FakeWorkerMode::Success);
    service.add_worker(Shard(0), worker).unwrap();
    service.start();

    let op = eval_op("tc_01");
    service.enqueue(op.clone(), Priority::SUBMISSION, ts(5), with_job(op.clone()));
    wait_until(|| !service.contains_operation(&op)).await;
    assert_eq!(service.pending_counts(), (0, 0));
}

#[tokio::test]
async fn failed_write_requeues_at_original_scheduling_data() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    let worker = FakeWorker::new(FakeWorkerMode::Success);
    service.add_worker(Shard(0), worker).unwrap();
    let eval = FakeEval::new();
    eval.script_write(Err(gavel_wire::RpcError::Disconnected));
    service.add_eval_client(eval.clone());
    service.start();

    let op = eval_op("tc_01");
    service.enqueue(op.clone(), Priority::INTERACTION, ts(5), with_job(op.clone()));

    // First write fails; the operation is re-enqueued, re-executed and
    // written again.
    wait_until(|| eval.write_calls().len() == 2).await;
    wait_until(|| !service.contains_operation(&op)).await;
}

#[tokio::test]
async fn follow_ups_are_enqueued_and_executed() {
    let service = QueueService::new(None, seeded_store(&[]), FakeClock::new());
    let worker = FakeWorker::new(FakeWorkerMode::Success);
    service.add_worker(Shard(0), worker).unwrap();
    let eval = FakeEval::new();
    let follow_op = eval_op("tc_01");
    eval.script_write(Ok((
        true,
        vec![gavel_wire::FollowUp {
            operation: follow_op.clone(),
            priority: Priority::SUBMISSION,
            timestamp: 1_500_000.0,
            job: with_job(follow_op.clone()),
        }],
    )));
    service.add_eval_client(eval.clone());
    service.start();

    let compile = Operation::compile_submission(SubmissionId::new(100), DatasetId::new(2));
    service.enqueue(compile.clone(), Priority::SUBMISSION, ts(5), with_job(compile.clone()));

    wait_until(|| eval.write_calls().len() == 2).await;
    let written: Vec<Operation> = eval.write_calls().into_iter().map(|(op, _)| op).collect();
    assert_eq!(written, vec![compile, follow_op]);
}

#[tokio::test]
async fn timeout_path_reenqueues_with_original_side_data() {
    let clock = FakeClock::new();
    let service = QueueService::new(None, seeded_store(&[]), clock.clone());
    let hung = FakeWorker::new(FakeWorkerMode::Hang);
    service.add_worker(Shard(0), hung).unwrap();

    // Assign directly, without the executor loop, so the re-enqueued
    // entry stays observable in the queue.
    let op = eval_op("tc_01");
    {
        let mut core = service.core.lock();
        let batch = vec![crate::opqueue::QueueEntry {
            operation: op.clone(),
            priority: Priority::INTERACTION,
            timestamp: ts(42),
            job: with_job(op.clone()),
        }];
        core.pool.acquire_worker(&batch, clock.now()).unwrap();
    }
    assert_eq!(service.workers_status()["0"].operations.len(), 1);

    clock.advance(chrono::Duration::seconds(WORKER_TIMEOUT_SECS + 10));
    service.check_workers_timeout();

    let status = service.queue_status();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].operation, op);
    assert_eq!(status[0].priority, Priority::INTERACTION);
    assert_eq!(status[0].timestamp, 42.0);
    // The stale worker is disabled and out of rotation.
    assert_eq!(service.workers_status()["0"].status, crate::worker::WorkerStatus::Disabled);
}
