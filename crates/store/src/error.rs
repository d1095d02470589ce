// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store boundary errors.

use thiserror::Error;

/// Errors crossing the datastore boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A concurrent writer already inserted the same row. Callers treat
    /// this as idempotent success for result commits.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The snapshot on disk could not be read or parsed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}
