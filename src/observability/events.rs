//! Observable engine events
//!
//! Every lifecycle, transaction and store event the engine logs is named
//! here. Events are explicit and typed.

use std::fmt;

/// Observable events in geoquery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Engine lifecycle
    /// Engine opened its backend
    EngineOpen,
    /// Engine closed its backend
    EngineClose,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Transactions
    /// Transaction started
    TransactionBegin,
    /// Transaction committed (possibly with per-item failures)
    TransactionCommit,
    /// Pre-commit observer vetoed the commit
    TransactionCancelled,
    /// Transaction rolled back
    TransactionRollback,
    /// Backend rejected one buffered item
    CommitItemFailed,
    /// Backend failed the whole commit
    CommitFailed,

    // Queries
    /// Query rejected before reaching the backend
    QueryRejected,
    /// Nearest search hit its iteration bound
    NearestSearchExhausted,
    /// Caller stopped a progress-reporting scan
    ScanCancelled,

    // Stores
    /// Store document loaded and indexed
    StoreLoaded,
    /// Store document written
    StoreSaved,
    /// Store document failed verification
    StoreCorrupted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::EngineOpen => "ENGINE_OPEN",
            Event::EngineClose => "ENGINE_CLOSE",

            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::TransactionBegin => "TRANSACTION_BEGIN",
            Event::TransactionCommit => "TRANSACTION_COMMIT",
            Event::TransactionCancelled => "TRANSACTION_CANCELLED",
            Event::TransactionRollback => "TRANSACTION_ROLLBACK",
            Event::CommitItemFailed => "COMMIT_ITEM_FAILED",
            Event::CommitFailed => "COMMIT_FAILED",

            Event::QueryRejected => "QUERY_REJECTED",
            Event::NearestSearchExhausted => "NEAREST_SEARCH_EXHAUSTED",
            Event::ScanCancelled => "SCAN_CANCELLED",

            Event::StoreLoaded => "STORE_LOADED",
            Event::StoreSaved => "STORE_SAVED",
            Event::StoreCorrupted => "STORE_CORRUPTED",
        }
    }

    /// Events logged at WARN rather than INFO.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::CommitItemFailed | Event::NearestSearchExhausted | Event::QueryRejected
        )
    }

    /// Events logged at ERROR.
    pub fn is_error(&self) -> bool {
        matches!(self, Event::CommitFailed | Event::StoreCorrupted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::EngineOpen,
            Event::EngineClose,
            Event::ConfigLoaded,
            Event::TransactionBegin,
            Event::TransactionCommit,
            Event::TransactionCancelled,
            Event::TransactionRollback,
            Event::CommitItemFailed,
            Event::CommitFailed,
            Event::QueryRejected,
            Event::NearestSearchExhausted,
            Event::ScanCancelled,
            Event::StoreLoaded,
            Event::StoreSaved,
            Event::StoreCorrupted,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_severity_classes() {
        assert!(Event::CommitItemFailed.is_warning());
        assert!(Event::StoreCorrupted.is_error());
        assert!(!Event::EngineOpen.is_warning());
        assert!(!Event::EngineOpen.is_error());
    }
}
