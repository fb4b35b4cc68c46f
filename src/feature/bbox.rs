//! Axis-aligned bounding boxes used as the cheap prefilter for every spatial read.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in the store's internal coordinate space.
///
/// Boxes are closed: a point on the edge is inside, and two boxes sharing only
/// an edge intersect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a box from two corners. Corners are normalized so that
    /// `min_* <= max_*` regardless of argument order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Degenerate box covering a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// All four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Check if this box intersects another (edges count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if this box fully contains another.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the box outward by `distance` on every side.
    ///
    /// This is the bounding box of the target box buffered by `distance`, so
    /// any geometry closer than `distance` to the original box intersects it.
    pub fn expand(&self, distance: f64) -> Self {
        Self {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }

    /// Pad any zero-width or zero-height dimension by `epsilon` on both sides so
    /// the box remains a valid rectangle. At magnitudes where `epsilon` is
    /// below the float spacing the pad grows to a few ulps instead.
    pub fn pad_degenerate(&self, epsilon: f64) -> Self {
        let mut padded = *self;
        if self.width() <= 0.0 {
            let pad = pad_for(epsilon, self.min_x, self.max_x);
            padded.min_x -= pad;
            padded.max_x += pad;
        }
        if self.height() <= 0.0 {
            let pad = pad_for(epsilon, self.min_y, self.max_y);
            padded.min_y -= pad;
            padded.max_y += pad;
        }
        padded
    }

    /// Scale the box about its center.
    pub fn scale(&self, factor: f64) -> Self {
        let (cx, cy) = self.center();
        let half_w = self.width() / 2.0 * factor;
        let half_h = self.height() / 2.0 * factor;
        Self {
            min_x: cx - half_w,
            min_y: cy - half_h,
            max_x: cx + half_w,
            max_y: cy + half_h,
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Union of an iterator of boxes, `None` when empty.
    pub fn union_all<I>(boxes: I) -> Option<Self>
    where
        I: IntoIterator<Item = BoundingBox>,
    {
        boxes.into_iter().reduce(|acc, b| acc.union(&b))
    }
}

fn pad_for(epsilon: f64, lo: f64, hi: f64) -> f64 {
    let magnitude = lo.abs().max(hi.abs());
    epsilon.max(magnitude * f64::EPSILON * 2.0)
}
