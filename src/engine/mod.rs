//! Query engine
//!
//! Orchestrates lifecycle, buffered transactions, column projection with
//! virtual and combinator columns, the live-transaction overlay, spatial
//! predicate dispatch and nearest/within-distance search over any
//! [`FeatureStore`](crate::store::FeatureStore).
//!
//! Guarantees:
//! - Invalid (geometry-less) and excluded features never appear in a result
//! - A live transaction's reads look as if the buffer were committed
//! - Commit and rollback always end the transaction and clear the buffer,
//!   except a commit vetoed by a pre-commit observer
//! - Per-item commit rejections are reported, never raised

mod cache;
mod columns;
mod config;
#[allow(clippy::module_inception)]
mod engine;
mod errors;
mod hooks;
mod overlay;
mod projection;
mod query;
mod spatial;

pub use cache::CacheStats;
pub use columns::{combinator_references, evaluate_combinator, ColumnPlan};
pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use errors::{EngineError, EngineErrorCode, EngineResult, Severity};
pub use hooks::{EngineHooks, ScanProgress};
pub use projection::{OffsetProjection, Projection};
pub use query::ScanOutcome;
