//! Coordinate conversion at the engine boundary.
//!
//! Callers speak external coordinates; the backend stores internal ones.
//! Geometry arguments are converted to internal on the way in, result
//! geometries to external on the way out.

use geo::Translate;
use wkt::ToWkt;

use crate::feature::BoundingBox;
use crate::geometry::wkt_blob::parse_wkt;
use crate::geometry::{GeometryError, GeometryResult};

use super::errors::EngineResult;

/// External/internal coordinate adapter.
pub trait Projection: Send + Sync {
    fn open(&self) -> EngineResult<()> {
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        Ok(())
    }

    fn to_internal(&self, geometry: &[u8]) -> GeometryResult<Vec<u8>>;

    fn to_external(&self, geometry: &[u8]) -> GeometryResult<Vec<u8>>;

    fn box_to_internal(&self, bbox: &BoundingBox) -> GeometryResult<BoundingBox>;

    fn box_to_external(&self, bbox: &BoundingBox) -> GeometryResult<BoundingBox>;
}

/// Projection where internal coordinates are external ones shifted by a
/// fixed offset. Works on WKT blobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetProjection {
    pub dx: f64,
    pub dy: f64,
}

impl OffsetProjection {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    fn shift(&self, geometry: &[u8], dx: f64, dy: f64) -> GeometryResult<Vec<u8>> {
        let text = std::str::from_utf8(geometry)
            .map_err(|e| GeometryError::Projection(e.to_string()))?;
        let shifted = parse_wkt(text)?.translate(dx, dy);
        Ok(shifted.wkt_string().into_bytes())
    }

    fn shift_box(bbox: &BoundingBox, dx: f64, dy: f64) -> BoundingBox {
        BoundingBox::new(bbox.min_x + dx, bbox.min_y + dy, bbox.max_x + dx, bbox.max_y + dy)
    }
}

impl Projection for OffsetProjection {
    fn to_internal(&self, geometry: &[u8]) -> GeometryResult<Vec<u8>> {
        self.shift(geometry, self.dx, self.dy)
    }

    fn to_external(&self, geometry: &[u8]) -> GeometryResult<Vec<u8>> {
        self.shift(geometry, -self.dx, -self.dy)
    }

    fn box_to_internal(&self, bbox: &BoundingBox) -> GeometryResult<BoundingBox> {
        Ok(Self::shift_box(bbox, self.dx, self.dy))
    }

    fn box_to_external(&self, bbox: &BoundingBox) -> GeometryResult<BoundingBox> {
        Ok(Self::shift_box(bbox, -self.dx, -self.dy))
    }
}
