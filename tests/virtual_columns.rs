//! Column Projection Tests
//!
//! Requested columns split into native columns, which the store fetches,
//! and virtual columns, which the engine resolves through the custom column
//! hook. A recording store checks what actually reaches the backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use geoquery::engine::QueryEngine;
use geoquery::feature::{BoundingBox, Feature, FeatureSourceColumn};
use geoquery::geometry::wkt_blob::point;
use geoquery::geometry::GeometryEngine;
use geoquery::store::{FeatureStore, MemoryFeatureStore, StoreResult};
use geoquery::transaction::{TransactionBuffer, TransactionResult};

/// Delegates to a memory store and records every column list it is asked for.
struct RecordingStore {
    inner: MemoryFeatureStore,
    requested: Mutex<Vec<Vec<String>>>,
}

impl RecordingStore {
    fn new(inner: MemoryFeatureStore) -> Self {
        Self {
            inner,
            requested: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, columns: &[String]) {
        self.requested.lock().unwrap().push(columns.to_vec());
    }

    fn requested(&self) -> Vec<Vec<String>> {
        self.requested.lock().unwrap().clone()
    }
}

impl FeatureStore for RecordingStore {
    fn geometry(&self) -> &dyn GeometryEngine {
        self.inner.geometry()
    }

    fn open(&self) -> StoreResult<()> {
        self.inner.open()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    fn is_editable(&self) -> bool {
        self.inner.is_editable()
    }

    fn get_columns(&self) -> StoreResult<Vec<FeatureSourceColumn>> {
        self.inner.get_columns()
    }

    fn get_all_features(&self, columns: &[String]) -> StoreResult<Vec<Feature>> {
        self.record(columns);
        self.inner.get_all_features(columns)
    }

    fn get_features_inside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.record(columns);
        self.inner.get_features_inside_bounding_box(bbox, columns)
    }

    fn get_features_by_ids(&self, ids: &[String], columns: &[String]) -> StoreResult<Vec<Feature>> {
        self.record(columns);
        self.inner.get_features_by_ids(ids, columns)
    }

    fn commit_transaction(&self, buffer: &TransactionBuffer) -> StoreResult<TransactionResult> {
        self.inner.commit_transaction(buffer)
    }
}

fn engine_with_counter() -> (QueryEngine<RecordingStore>, Arc<AtomicUsize>) {
    let inner = MemoryFeatureStore::new(vec![
        FeatureSourceColumn::string("Name"),
        FeatureSourceColumn::string("Kind"),
    ]);
    inner
        .insert(Feature::new("A", point(0.0, 0.0)).with_column("Name", "alpha").with_column("Kind", "x"))
        .unwrap();
    inner
        .insert(Feature::new("B", point(10.0, 0.0)).with_column("Name", "beta").with_column("Kind", "y"))
        .unwrap();
    inner
        .insert(Feature::new("C", point(100.0, 100.0)).with_column("Name", "gamma"))
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut engine = QueryEngine::new(RecordingStore::new(inner));
    engine.hooks_mut().on_custom_column_fetch(move |column, id| {
        counter.fetch_add(1, Ordering::SeqCst);
        (column == "ComputedArea").then(|| format!("area-of-{}", id))
    });
    engine.open().unwrap();
    (engine, calls)
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Native / Virtual Split
// =============================================================================

/// The store sees only native names; the hook fires once per feature.
#[test]
fn test_backend_receives_only_native_columns() {
    let (engine, calls) = engine_with_counter();

    let features = engine
        .get_all_features(&columns(&["Name", "ComputedArea"]))
        .unwrap();

    assert_eq!(engine.store().requested(), vec![columns(&["Name"])]);
    assert_eq!(calls.load(Ordering::SeqCst), features.len());
    assert_eq!(features.len(), 3);
    for feature in &features {
        assert_eq!(
            feature.column("ComputedArea"),
            Some(format!("area-of-{}", feature.id()).as_str())
        );
        assert!(feature.column("Name").is_some());
        // Kind was not requested
        assert!(feature.column("Kind").is_none());
    }
}

/// Box queries split columns the same way.
#[test]
fn test_box_query_splits_columns() {
    let (engine, calls) = engine_with_counter();

    let features = engine
        .get_features_inside_bounding_box(
            &BoundingBox::new(-1.0, -1.0, 11.0, 1.0),
            &columns(&["ComputedArea", "Kind"]),
        )
        .unwrap();

    assert_eq!(features.len(), 2);
    assert_eq!(engine.store().requested(), vec![columns(&["Kind"])]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A resolver that answers nothing leaves the column absent.
#[test]
fn test_unresolved_virtual_column_is_absent() {
    let (engine, calls) = engine_with_counter();

    let features = engine
        .get_features_by_ids(&columns(&["A"]), &columns(&["Unknown"]))
        .unwrap();

    assert_eq!(features.len(), 1);
    assert!(features[0].column("Unknown").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.store().requested(), vec![Vec::<String>::new()]);
}

// =============================================================================
// Combinator Columns
// =============================================================================

/// Combinator references are fetched natively and joined per feature.
#[test]
fn test_combinator_column_joins_references() {
    let (engine, calls) = engine_with_counter();

    let features = engine
        .get_all_features(&columns(&["[Name] ([Kind])"]))
        .unwrap();

    let requested = engine.store().requested();
    assert_eq!(requested.len(), 1);
    let mut fetched = requested[0].clone();
    fetched.sort();
    assert_eq!(fetched, columns(&["Kind", "Name"]));

    let values: Vec<&str> = features
        .iter()
        .map(|f| f.column("[Name] ([Kind])").unwrap())
        .collect();
    assert_eq!(values, vec!["alpha (x)", "beta (y)", "gamma ()"]);

    // Referenced columns are not part of the output
    assert!(features.iter().all(|f| f.column("Name").is_none()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
