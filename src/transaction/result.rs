//! Commit outcome reporting.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Overall outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Every buffered operation was applied.
    Success,
    /// At least one buffered operation was rejected; the rest were applied.
    Failure,
    /// A pre-commit observer vetoed the commit; nothing was applied.
    Cancel,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Success => write!(f, "SUCCESS"),
            TransactionStatus::Failure => write!(f, "FAILURE"),
            TransactionStatus::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// Per-commit tally. Per-item rejections are recorded here rather than
/// raised, so successes already applied stay visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub success_count: usize,
    pub failure_count: usize,
    /// Rejection reason per feature id.
    pub failure_reasons: BTreeMap<String, String>,
    status: TransactionStatus,
}

impl Default for TransactionResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionResult {
    /// Empty successful result; record items into it as they are applied.
    pub fn new() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            failure_reasons: BTreeMap::new(),
            status: TransactionStatus::Success,
        }
    }

    /// Result of a vetoed commit.
    pub fn cancelled() -> Self {
        Self {
            status: TransactionStatus::Cancel,
            ..Self::new()
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    /// Record a rejected item. Status becomes `Failure`.
    pub fn record_failure(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failure_count += 1;
        self.failure_reasons.insert(id.into(), reason.into());
        self.status = TransactionStatus::Failure;
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Total number of operations processed.
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_status_follows_count() {
        let mut r = TransactionResult::new();
        r.record_success();
        assert_eq!(r.status(), TransactionStatus::Success);
        r.record_failure("x", "missing");
        assert_eq!(r.status(), TransactionStatus::Failure);
        assert_eq!(r.total(), 2);
        assert_eq!(r.failure_reasons["x"], "missing");
    }

    #[test]
    fn test_cancelled_is_empty() {
        let r = TransactionResult::cancelled();
        assert_eq!(r.status(), TransactionStatus::Cancel);
        assert_eq!(r.total(), 0);
    }

    #[test]
    fn test_serializes_status() {
        let json = serde_json::to_value(TransactionResult::cancelled()).unwrap();
        assert_eq!(json["status"], "cancel");
    }
}
