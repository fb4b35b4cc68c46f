//! Spatial predicate kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::GeometryError;

/// Exact topological predicate evaluated between a candidate feature and a
/// query target. Always read as `candidate <predicate> target`: `Within`
/// keeps features lying within the target, `Contains` keeps features that
/// contain it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialPredicate {
    Contains,
    Crosses,
    Disjoint,
    Intersects,
    Touches,
    Overlaps,
    Within,
    TopologicalEqual,
}

impl SpatialPredicate {
    pub const ALL: [SpatialPredicate; 8] = [
        SpatialPredicate::Contains,
        SpatialPredicate::Crosses,
        SpatialPredicate::Disjoint,
        SpatialPredicate::Intersects,
        SpatialPredicate::Touches,
        SpatialPredicate::Overlaps,
        SpatialPredicate::Within,
        SpatialPredicate::TopologicalEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialPredicate::Contains => "contains",
            SpatialPredicate::Crosses => "crosses",
            SpatialPredicate::Disjoint => "disjoint",
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Touches => "touches",
            SpatialPredicate::Overlaps => "overlaps",
            SpatialPredicate::Within => "within",
            SpatialPredicate::TopologicalEqual => "topological_equal",
        }
    }

    /// Whether a candidate satisfying this predicate must have a bounding box
    /// intersecting the target's. Only `Disjoint` can hold for candidates
    /// outside the intersects prefilter.
    pub fn requires_intersecting_box(&self) -> bool {
        !matches!(self, SpatialPredicate::Disjoint)
    }
}

impl fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SpatialPredicate {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        if normalized == "topologicalequal" {
            normalized = "topological_equal".to_string();
        }
        SpatialPredicate::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| GeometryError::UnknownPredicate(s.to_string()))
    }
}
