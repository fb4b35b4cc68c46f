//! Geometry collaborator
//!
//! The engine never implements geometry math. It talks to a
//! [`GeometryEngine`]; [`WktGeometry`] is the default implementation over
//! WKT blobs backed by the `geo` crate.

mod engine;
mod errors;
mod predicate;
pub mod wkt_blob;

pub use engine::GeometryEngine;
pub use errors::{GeometryError, GeometryResult};
pub use predicate::SpatialPredicate;
pub use wkt_blob::WktGeometry;
