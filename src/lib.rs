//! geoquery - transactional spatial-feature queries over pluggable stores
//!
//! A `QueryEngine` sits in front of any `FeatureStore` backend and adds
//! buffered transactions, a live overlay of uncommitted edits, virtual and
//! combinator columns, id exclusion, projections and lifecycle hooks.

pub mod cli;
pub mod engine;
pub mod feature;
pub mod geometry;
pub mod observability;
pub mod store;
pub mod transaction;
