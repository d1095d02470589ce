// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn operation_payload_accepts_list_form() {
    let payload: OperationPayload = serde_json::from_value(json!([1, 42, 7, "tc_01"])).unwrap();
    let op = payload.resolve().unwrap();
    assert_eq!(op, Operation::evaluate_submission(SubmissionId::new(42), DatasetId::new(7), "tc_01"));
}

#[test]
fn operation_payload_accepts_structured_form() {
    let payload: OperationPayload = serde_json::from_value(json!({
        "type": 0, "object_id": 42, "dataset_id": 7
    }))
    .unwrap();
    let op = payload.resolve().unwrap();
    assert_eq!(op, Operation::compile_submission(SubmissionId::new(42), DatasetId::new(7)));
}

#[test]
fn timestamp_payload_accepts_epoch_and_text() {
    let epoch: TimestampPayload = serde_json::from_value(json!(1500000.25)).unwrap();
    let from_epoch = epoch.resolve().unwrap();
    assert_eq!(from_epoch.timestamp(), 1_500_000);

    let text: TimestampPayload =
        serde_json::from_value(json!("1970-01-18T08:40:00.25Z")).unwrap();
    assert_eq!(text.resolve().unwrap(), from_epoch);
}

#[test]
fn invalidate_level_defaults_to_compilation() {
    let params: InvalidateParams = serde_json::from_value(json!({"submission_id": 3})).unwrap();
    assert_eq!(params.level, InvalidateLevel::Compilation);
    assert_eq!(params.submission_id, Some(SubmissionId::new(3)));
}

#[test]
fn unknown_invalidate_level_is_rejected() {
    let result: Result<InvalidateParams, _> =
        serde_json::from_value(json!({"level": "scoring"}));
    assert!(result.is_err());
}

#[test]
fn enqueue_params_roundtrip_with_job() {
    let op = Operation::compile_submission(SubmissionId::new(1), DatasetId::new(2));
    let params = EnqueueParams {
        operation: op.clone().into(),
        priority: Priority::SUBMISSION,
        timestamp: TimestampPayload::Epoch(1_500_000.0),
        job: Some(Job::new(op.clone(), "batch")),
    };
    let value = serde_json::to_value(&params).unwrap();
    let back: EnqueueParams = serde_json::from_value(value).unwrap();
    assert_eq!(back.operation.resolve().unwrap(), op);
    assert_eq!(back.priority, Priority::SUBMISSION);
    assert!(back.job.is_some());
}

#[test]
fn follow_up_reports_utc_timestamp() {
    let follow = FollowUp {
        operation: Operation::compile_submission(SubmissionId::new(1), DatasetId::new(2)),
        priority: Priority::INVALIDATED,
        timestamp: 1_500_000.0,
        job: None,
    };
    assert_eq!(follow.timestamp_utc().timestamp(), 1_500_000);
}

#[test]
fn response_error_shape() {
    let response = RpcResponse::failure("boom");
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value, json!({"ok": false, "error": "boom"}));
}
