// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn int_ids_serialize_transparently() {
    let id = DatasetId::new(42);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "42");
    let back: DatasetId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn int_ids_display_as_bare_numbers() {
    assert_eq!(SubmissionId::new(7).to_string(), "7");
    assert_eq!(Shard(3).to_string(), "3");
}

#[test]
fn int_ids_order_like_raw_integers() {
    assert!(SubmissionId::new(1) < SubmissionId::new(2));
    assert!(Shard(0) < Shard(10));
}
