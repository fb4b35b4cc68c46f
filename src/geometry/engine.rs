//! The geometry collaborator seam.

use crate::feature::BoundingBox;

use super::errors::GeometryResult;
use super::predicate::SpatialPredicate;

/// Geometry math the query engine delegates to.
///
/// The engine only orchestrates: it asks for bounding boxes to prefilter,
/// then for exact predicate or distance answers to refine. Implementations
/// decide the blob encoding.
pub trait GeometryEngine: Send + Sync {
    /// Bounding box of a geometry blob.
    fn bounding_box(&self, geometry: &[u8]) -> GeometryResult<BoundingBox>;

    /// Evaluate `candidate <predicate> target` exactly.
    fn evaluate(
        &self,
        predicate: SpatialPredicate,
        candidate: &[u8],
        target: &[u8],
    ) -> GeometryResult<bool>;

    /// Minimum distance between two geometries, zero when they intersect.
    fn distance(&self, a: &[u8], b: &[u8]) -> GeometryResult<f64>;

    /// Check that a blob decodes to a geometry with an extent.
    fn validate(&self, geometry: &[u8]) -> GeometryResult<()> {
        self.bounding_box(geometry).map(|_| ())
    }
}
