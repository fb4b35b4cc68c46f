//! Ordered id → feature table with precomputed bounding boxes, shared by the
//! in-process backends.

use indexmap::IndexMap;

use crate::feature::{BoundingBox, Feature};
use crate::geometry::GeometryEngine;
use crate::transaction::{TransactionBuffer, TransactionResult};

/// A stored feature and its bounding box (`None` when the feature has no
/// geometry).
#[derive(Debug, Clone)]
pub(crate) struct TableEntry {
    pub feature: Feature,
    pub bbox: Option<BoundingBox>,
}

/// Features in insertion order. Edits keep their position; deletes shift later
/// rows up.
#[derive(Debug, Clone, Default)]
pub(crate) struct FeatureTable {
    rows: IndexMap<String, TableEntry>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TableEntry>) -> Self {
        let mut rows = IndexMap::with_capacity(entries.len());
        for entry in entries {
            rows.insert(entry.feature.id().to_string(), entry);
        }
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows with a decodable geometry.
    pub fn valid_len(&self) -> usize {
        self.rows.values().filter(|e| e.bbox.is_some()).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    pub fn insert(&mut self, entry: TableEntry) {
        self.rows.insert(entry.feature.id().to_string(), entry);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        self.rows.values()
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.rows.values().map(|e| &e.feature)
    }

    pub fn all(&self, columns: &[String]) -> Vec<Feature> {
        self.features().map(|f| f.projected(columns)).collect()
    }

    pub fn inside(&self, bbox: &BoundingBox, columns: &[String]) -> Vec<Feature> {
        self.entries()
            .filter(|e| e.bbox.is_some_and(|b| b.intersects(bbox)))
            .map(|e| e.feature.projected(columns))
            .collect()
    }

    pub fn outside(&self, bbox: &BoundingBox, columns: &[String]) -> Vec<Feature> {
        self.entries()
            .filter(|e| e.bbox.is_some_and(|b| !b.intersects(bbox)))
            .map(|e| e.feature.projected(columns))
            .collect()
    }

    pub fn by_ids(&self, ids: &[String], columns: &[String]) -> Vec<Feature> {
        ids.iter()
            .filter_map(|id| self.rows.get(id))
            .map(|e| e.feature.projected(columns))
            .collect()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::union_all(self.entries().filter_map(|e| e.bbox))
    }

    /// Apply a buffer: adds, then edits, then deletes, each in buffered order.
    ///
    /// Rejections (duplicate id on add, unknown id on edit or delete,
    /// undecodable geometry) are recorded and processing continues.
    pub fn apply(
        &mut self,
        buffer: &TransactionBuffer,
        geometry: &dyn GeometryEngine,
    ) -> TransactionResult {
        let mut result = TransactionResult::new();

        for feature in buffer.adds() {
            if feature.id().is_empty() {
                result.record_failure(feature.id(), "feature id is empty");
                continue;
            }
            if self.rows.contains_key(feature.id()) {
                result.record_failure(feature.id(), "feature id already exists");
                continue;
            }
            match entry_for(feature, geometry) {
                Ok(entry) => {
                    self.rows.insert(feature.id().to_string(), entry);
                    result.record_success();
                }
                Err(reason) => result.record_failure(feature.id(), reason),
            }
        }

        for feature in buffer.edits() {
            let Some(slot) = self.rows.get_mut(feature.id()) else {
                result.record_failure(feature.id(), "feature not found");
                continue;
            };
            match entry_for(feature, geometry) {
                Ok(entry) => {
                    *slot = entry;
                    result.record_success();
                }
                Err(reason) => result.record_failure(feature.id(), reason),
            }
        }

        for id in buffer.deletes() {
            if self.rows.shift_remove(id).is_some() {
                result.record_success();
            } else {
                result.record_failure(id, "feature not found");
            }
        }

        result
    }
}

/// Build a table row, computing the bounding box when geometry is present.
pub(crate) fn entry_for(
    feature: &Feature,
    geometry: &dyn GeometryEngine,
) -> Result<TableEntry, String> {
    let bbox = match feature.geometry() {
        Some(g) => Some(
            geometry
                .bounding_box(g)
                .map_err(|e| format!("invalid geometry: {}", e))?,
        ),
        None => None,
    };
    Ok(TableEntry {
        feature: feature.clone(),
        bbox,
    })
}
