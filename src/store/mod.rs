//! Storage backends
//!
//! - [`FeatureStore`]: the contract the engine queries and commits through
//! - [`MemoryFeatureStore`]: lock-protected in-process store
//! - [`FileFeatureStore`]: checksummed single-file store with a
//!   bounding-box index built on open
//! - [`search`]: default nearest and within-distance algorithms

mod contract;
mod errors;
mod file;
mod memory;
pub mod search;
mod table;

pub use contract::FeatureStore;
pub use errors::{StoreError, StoreResult};
pub use file::{FileFeatureStore, FORMAT_VERSION, MAX_INDEX_WORKERS};
pub use memory::MemoryFeatureStore;
pub use search::{NearestOptions, NearestOutcome};
