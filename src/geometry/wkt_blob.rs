//! WKT-encoded geometry blobs evaluated with the `geo` crate.
//!
//! Blobs are UTF-8 WKT text (`POINT(1 2)`, `POLYGON((...))`). Predicates use
//! the DE-9IM relate matrix so every predicate kind comes from one
//! computation; distances are planar Euclidean.

use std::str::FromStr;

use geo::{BoundingRect, Distance, Euclidean, Relate};
use geo_types::Geometry;

use crate::feature::BoundingBox;

use super::engine::GeometryEngine;
use super::errors::{GeometryError, GeometryResult};
use super::predicate::SpatialPredicate;

/// [`GeometryEngine`] over WKT blobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WktGeometry;

impl WktGeometry {
    pub fn new() -> Self {
        Self
    }

    /// Decode a blob into a `geo-types` geometry.
    pub fn parse(&self, blob: &[u8]) -> GeometryResult<Geometry<f64>> {
        if blob.is_empty() {
            return Err(GeometryError::Empty);
        }
        let text = std::str::from_utf8(blob)
            .map_err(|e| GeometryError::Malformed(format!("not UTF-8 WKT: {}", e)))?;
        parse_wkt(text)
    }
}

/// Parse WKT text into a geometry.
pub fn parse_wkt(text: &str) -> GeometryResult<Geometry<f64>> {
    ::wkt::Wkt::<f64>::from_str(text)
        .map_err(|e| GeometryError::Malformed(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: ::wkt::conversion::Error| GeometryError::Malformed(format!("{:?}", e)))
        })
}

/// WKT blob for a point.
pub fn point(x: f64, y: f64) -> Vec<u8> {
    format!("POINT({} {})", x, y).into_bytes()
}

/// WKT blob for the polygon covering a box.
pub fn rectangle(bbox: &BoundingBox) -> Vec<u8> {
    format!(
        "POLYGON(({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))",
        min_x = bbox.min_x,
        min_y = bbox.min_y,
        max_x = bbox.max_x,
        max_y = bbox.max_y
    )
    .into_bytes()
}

impl GeometryEngine for WktGeometry {
    fn bounding_box(&self, geometry: &[u8]) -> GeometryResult<BoundingBox> {
        let geom = self.parse(geometry)?;
        let rect = geom.bounding_rect().ok_or(GeometryError::NoExtent)?;
        Ok(BoundingBox::new(
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
        ))
    }

    fn evaluate(
        &self,
        predicate: SpatialPredicate,
        candidate: &[u8],
        target: &[u8],
    ) -> GeometryResult<bool> {
        let a = self.parse(candidate)?;
        let b = self.parse(target)?;
        let matrix = a.relate(&b);
        Ok(match predicate {
            SpatialPredicate::Contains => matrix.is_contains(),
            SpatialPredicate::Crosses => matrix.is_crosses(),
            SpatialPredicate::Disjoint => matrix.is_disjoint(),
            SpatialPredicate::Intersects => matrix.is_intersects(),
            SpatialPredicate::Touches => matrix.is_touches(),
            SpatialPredicate::Overlaps => matrix.is_overlaps(),
            SpatialPredicate::Within => matrix.is_within(),
            SpatialPredicate::TopologicalEqual => matrix.is_equal_topo(),
        })
    }

    fn distance(&self, a: &[u8], b: &[u8]) -> GeometryResult<f64> {
        let a = self.parse(a)?;
        let b = self.parse(b)?;
        Ok(Euclidean::distance(&a, &b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))";

    #[test]
    fn test_bounding_box_of_polygon() {
        let bbox = WktGeometry.bounding_box(SQUARE.as_bytes()).unwrap();
        assert_eq!(bbox, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_malformed_and_empty_rejected() {
        assert!(matches!(
            WktGeometry.bounding_box(b""),
            Err(GeometryError::Empty)
        ));
        assert!(matches!(
            WktGeometry.bounding_box(b"POINT(1"),
            Err(GeometryError::Malformed(_))
        ));
        assert!(WktGeometry.validate(b"not wkt at all").is_err());
    }

    #[test]
    fn test_predicates_point_in_square() {
        let p = point(5.0, 5.0);
        let sq = SQUARE.as_bytes();
        let g = WktGeometry;
        assert!(g.evaluate(SpatialPredicate::Within, &p, sq).unwrap());
        assert!(g.evaluate(SpatialPredicate::Intersects, &p, sq).unwrap());
        assert!(!g.evaluate(SpatialPredicate::Disjoint, &p, sq).unwrap());
        assert!(g.evaluate(SpatialPredicate::Contains, sq, &p).unwrap());
    }

    #[test]
    fn test_touches_and_equal() {
        let g = WktGeometry;
        let edge = point(10.0, 5.0);
        assert!(g
            .evaluate(SpatialPredicate::Touches, &edge, SQUARE.as_bytes())
            .unwrap());
        let same = rectangle(&BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(g
            .evaluate(SpatialPredicate::TopologicalEqual, &same, SQUARE.as_bytes())
            .unwrap());
    }

    #[test]
    fn test_crossing_line() {
        let g = WktGeometry;
        let line = b"LINESTRING(-5 5, 15 5)";
        assert!(g
            .evaluate(SpatialPredicate::Crosses, line, SQUARE.as_bytes())
            .unwrap());
    }

    #[test]
    fn test_distance() {
        let g = WktGeometry;
        let d = g.distance(&point(0.0, 0.0), &point(3.0, 4.0)).unwrap();
        assert!((d - 5.0).abs() < 1e-9);
        assert_eq!(g.distance(&point(5.0, 5.0), SQUARE.as_bytes()).unwrap(), 0.0);
        let outside = g.distance(&point(13.0, 5.0), SQUARE.as_bytes()).unwrap();
        assert!((outside - 3.0).abs() < 1e-9);
    }
}
