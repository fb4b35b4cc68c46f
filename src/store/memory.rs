//! In-memory backend.
//!
//! The table sits behind a `RwLock`. Commits take the write lock for the whole
//! apply, so a reader either sees the table before the commit or after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::feature::{BoundingBox, Feature, FeatureSourceColumn};
use crate::geometry::{GeometryEngine, WktGeometry};
use crate::transaction::{TransactionBuffer, TransactionResult};

use super::contract::FeatureStore;
use super::errors::{StoreError, StoreResult};
use super::table::{entry_for, FeatureTable};

/// Editable in-memory feature store.
pub struct MemoryFeatureStore {
    columns: Vec<FeatureSourceColumn>,
    table: RwLock<FeatureTable>,
    geometry: Arc<dyn GeometryEngine>,
    open: AtomicBool,
    editable: bool,
}

impl MemoryFeatureStore {
    /// Empty editable store declaring `columns`, using WKT geometry.
    pub fn new(columns: Vec<FeatureSourceColumn>) -> Self {
        Self {
            columns,
            table: RwLock::new(FeatureTable::new()),
            geometry: Arc::new(WktGeometry),
            open: AtomicBool::new(false),
            editable: true,
        }
    }

    pub fn with_geometry_engine(mut self, geometry: Arc<dyn GeometryEngine>) -> Self {
        self.geometry = geometry;
        self
    }

    /// Reject commits.
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Load a feature directly, bypassing transactions.
    pub fn insert(&self, feature: Feature) -> StoreResult<()> {
        let entry = entry_for(&feature, self.geometry.as_ref()).map_err(StoreError::Corrupted)?;
        let mut table = self.table.write()?;
        if table.contains(feature.id()) {
            return Err(StoreError::Corrupted(format!(
                "duplicate feature id '{}'",
                feature.id()
            )));
        }
        table.insert(entry);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of stored rows, including invalid ones.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.table.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn geometry(&self) -> &dyn GeometryEngine {
        self.geometry.as_ref()
    }

    fn open(&self) -> StoreResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_editable(&self) -> bool {
        self.editable
    }

    fn get_columns(&self) -> StoreResult<Vec<FeatureSourceColumn>> {
        Ok(self.columns.clone())
    }

    fn get_all_features(&self, columns: &[String]) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.all(columns))
    }

    fn get_features_inside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.inside(bbox, columns))
    }

    fn get_features_by_ids(
        &self,
        ids: &[String],
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.by_ids(ids, columns))
    }

    fn commit_transaction(&self, buffer: &TransactionBuffer) -> StoreResult<TransactionResult> {
        self.ensure_open()?;
        if !self.editable {
            return Err(StoreError::NotSupported(
                "commit on a read-only store".to_string(),
            ));
        }
        let mut table = self.table.write()?;
        Ok(table.apply(buffer, self.geometry.as_ref()))
    }

    fn get_count(&self) -> StoreResult<usize> {
        self.ensure_open()?;
        Ok(self.table.read()?.valid_len())
    }

    fn get_features_outside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.outside(bbox, columns))
    }

    fn get_bounding_box(&self) -> StoreResult<Option<BoundingBox>> {
        self.ensure_open()?;
        Ok(self.table.read()?.bounding_box())
    }
}
