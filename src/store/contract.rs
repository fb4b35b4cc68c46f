//! The backend contract.
//!
//! A backend implements three fetch primitives (all, inside-box, by-ids) plus
//! lifecycle, column declaration and commit. Every other read has a default
//! built on those primitives; backends override any of them with an
//! index-accelerated version without changing semantics.

use crate::feature::{BoundingBox, Feature, FeatureSourceColumn};
use crate::geometry::GeometryEngine;
use crate::transaction::{TransactionBuffer, TransactionResult};

use super::errors::{StoreError, StoreResult};
use super::search::{self, NearestOptions, NearestOutcome};

/// Storage backend queried and edited by the engine.
///
/// Fetch methods receive only native column names and return features
/// carrying at most those columns. Methods take `&self`; backends that mutate
/// on commit hold their own lock so concurrent readers never observe a
/// partially applied commit.
pub trait FeatureStore: Send + Sync {
    /// Geometry collaborator used for this store's blobs.
    fn geometry(&self) -> &dyn GeometryEngine;

    fn open(&self) -> StoreResult<()>;

    fn close(&self) -> StoreResult<()>;

    /// Whether the backend accepts commits.
    fn is_editable(&self) -> bool {
        false
    }

    /// Columns this backend stores natively.
    fn get_columns(&self) -> StoreResult<Vec<FeatureSourceColumn>>;

    fn get_all_features(&self, columns: &[String]) -> StoreResult<Vec<Feature>>;

    /// Features whose bounding box intersects `bbox`. May over-select.
    fn get_features_inside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>>;

    /// Features with the given ids; unknown ids are skipped.
    fn get_features_by_ids(&self, ids: &[String], columns: &[String])
        -> StoreResult<Vec<Feature>>;

    /// Apply a buffer. Per-item rejections are recorded in the result and do
    /// not stop the remaining items.
    fn commit_transaction(&self, _buffer: &TransactionBuffer) -> StoreResult<TransactionResult> {
        Err(StoreError::NotSupported(
            "commit on a read-only store".to_string(),
        ))
    }

    /// Number of features with a geometry.
    fn get_count(&self) -> StoreResult<usize> {
        Ok(self
            .get_all_features(&[])?
            .iter()
            .filter(|f| f.is_valid())
            .count())
    }

    /// Features whose bounding box does not intersect `bbox`.
    fn get_features_outside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        let geometry = self.geometry();
        let mut outside = Vec::new();
        for feature in self.get_all_features(columns)? {
            let keep = match feature.geometry() {
                Some(g) => !geometry.bounding_box(g)?.intersects(bbox),
                None => false,
            };
            if keep {
                outside.push(feature);
            }
        }
        Ok(outside)
    }

    /// The `k` features nearest to `target`, ascending by distance.
    fn get_features_nearest_to(
        &self,
        target: &[u8],
        k: usize,
        columns: &[String],
        options: &NearestOptions,
    ) -> StoreResult<NearestOutcome> {
        search::nearest_by_box_growth(self, target, k, columns, options)
    }

    /// Features strictly closer than `distance` to `target`.
    fn get_features_within_distance_of(
        &self,
        target: &[u8],
        distance: f64,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        search::within_distance_by_box(self, target, distance, columns)
    }

    /// Union of every valid feature's bounding box.
    fn get_bounding_box(&self) -> StoreResult<Option<BoundingBox>> {
        let geometry = self.geometry();
        let mut boxes = Vec::new();
        for feature in self.get_all_features(&[])? {
            if let Some(g) = feature.geometry() {
                boxes.push(geometry.bounding_box(g)?);
            }
        }
        Ok(BoundingBox::union_all(boxes))
    }

    /// Features whose `column` equals `value` exactly.
    fn get_features_by_column_value(
        &self,
        column: &str,
        value: &str,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        let mut fetch = columns.to_vec();
        if !fetch.iter().any(|c| c == column) {
            fetch.push(column.to_string());
        }
        Ok(self
            .get_all_features(&fetch)?
            .into_iter()
            .filter(|f| f.column(column) == Some(value))
            .map(|f| f.projected(columns))
            .collect())
    }
}
