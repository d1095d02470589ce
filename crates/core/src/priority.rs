// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling priority bands. Lower is more urgent; ties are broken by
//! timestamp, older first.

use serde::{Deserialize, Serialize};

/// Priority of a queued operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    /// User-test round trips: a contestant is actively waiting.
    pub const INTERACTION: Priority = Priority(10);
    /// Freshly arrived submissions.
    pub const SUBMISSION: Priority = Priority(20);
    /// Work re-derived after an invalidation or a failed attempt.
    pub const INVALIDATED: Priority = Priority(30);
    /// Background reconciliation by the sweeper.
    pub const SWEEP: Priority = Priority(40);
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_order_most_urgent_first() {
        assert!(Priority::INTERACTION < Priority::SUBMISSION);
        assert!(Priority::SUBMISSION < Priority::INVALIDATED);
        assert!(Priority::INVALIDATED < Priority::SWEEP);
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Priority::SUBMISSION).unwrap(), "20");
    }
}
