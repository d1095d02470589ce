// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use gavel_core::{DatasetId, SubmissionId};

fn entry(n: i64, priority: Priority, ts: i64) -> QueueEntry {
    QueueEntry {
        operation: Operation::compile_submission(SubmissionId::new(n), DatasetId::new(1)),
        priority,
        timestamp: Utc.timestamp_opt(ts, 0).single().unwrap(),
        job: None,
    }
}

#[test]
fn pops_in_priority_then_timestamp_order() {
    let mut queue = OperationQueue::new();
    queue.push(entry(1, Priority::SWEEP, 100));
    queue.push(entry(2, Priority::SUBMISSION, 200));
    queue.push(entry(3, Priority::SUBMISSION, 100));
    queue.push(entry(4, Priority::INTERACTION, 300));

    let order: Vec<i64> = std::iter::from_fn(|| queue.pop_first())
        .map(|e| e.operation.object_id)
        .collect();
    assert_eq!(order, vec![4, 3, 2, 1]);
}

#[test]
fn equal_keys_pop_in_insertion_order() {
    let mut queue = OperationQueue::new();
    queue.push(entry(10, Priority::SUBMISSION, 100));
    queue.push(entry(11, Priority::SUBMISSION, 100));
    queue.push(entry(12, Priority::SUBMISSION, 100));
    let order: Vec<i64> = std::iter::from_fn(|| queue.pop_first())
        .map(|e| e.operation.object_id)
        .collect();
    assert_eq!(order, vec![10, 11, 12]);
}

#[test]
fn duplicate_push_is_rejected() {
    let mut queue = OperationQueue::new();
    assert!(queue.push(entry(1, Priority::SUBMISSION, 100)));
    assert!(!queue.push(entry(1, Priority::INTERACTION, 50)));
    assert_eq!(queue.len(), 1);
    // The original scheduling data wins.
    assert_eq!(queue.pop_first().unwrap().priority, Priority::SUBMISSION);
}

#[test]
fn remove_targets_one_operation() {
    let mut queue = OperationQueue::new();
    queue.push(entry(1, Priority::SUBMISSION, 100));
    queue.push(entry(2, Priority::SUBMISSION, 101));
    let removed = queue.remove(&entry(1, Priority::SUBMISSION, 100).operation).unwrap();
    assert_eq!(removed.operation.object_id, 1);
    assert!(queue.remove(&removed.operation).is_none());
    assert!(!queue.contains(&removed.operation));
    assert_eq!(queue.len(), 1);
}

#[test]
fn iter_walks_in_scheduling_order() {
    let mut queue = OperationQueue::new();
    queue.push(entry(1, Priority::SWEEP, 100));
    queue.push(entry(2, Priority::INTERACTION, 100));
    let ids: Vec<i64> = queue.iter().map(|e| e.operation.object_id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(queue.len(), 2);
}
