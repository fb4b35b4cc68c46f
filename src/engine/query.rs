//! Read path: column planning, backend fetch, overlay, finishing.
//!
//! Every read runs the same pipeline:
//! fetch native columns → combinators → live overlay → drop invalid and
//! excluded features → resolve virtual columns → convert to external
//! coordinates.

use std::collections::HashMap;
use std::sync::PoisonError;

use crate::feature::{BoundingBox, Feature};
use crate::observability::{log_event_with_fields, Event};
use crate::store::{FeatureStore, StoreResult};

use super::cache::FeatureCacheKey;
use super::columns::ColumnPlan;
use super::engine::QueryEngine;
use super::errors::{EngineError, EngineErrorCode, EngineResult};
use super::hooks::ScanProgress;
use super::overlay;

/// Result of a progress-reporting scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub features: Vec<Feature>,
    /// A progress observer stopped the scan before the last feature.
    pub cancelled: bool,
}

impl<S: FeatureStore> QueryEngine<S> {
    /// Every visible feature.
    pub fn get_all_features(&self, columns: &[String]) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            let plan = self.plan(columns)?;
            let features =
                self.fetch_merged(&plan, |fetch| self.store.get_all_features(fetch), |_| Ok(true))?;
            self.finish(features, &plan)
        })
    }

    /// Like [`get_all_features`](Self::get_all_features), reporting progress
    /// every `progress_interval` features. Observers may stop the scan; the
    /// features finished so far are returned.
    pub fn get_all_features_with_progress(&self, columns: &[String]) -> EngineResult<ScanOutcome> {
        self.track(|| {
            let plan = self.plan(columns)?;
            let features =
                self.fetch_merged(&plan, |fetch| self.store.get_all_features(fetch), |_| Ok(true))?;
            let visible: Vec<Feature> = features.into_iter().filter(|f| self.visible(f)).collect();

            let total = visible.len();
            let interval = self.config.progress_interval.max(1);
            let mut outcome = ScanOutcome::default();
            for (index, feature) in visible.into_iter().enumerate() {
                outcome.features.push(self.finish_one(feature, &plan)?);
                let done = index + 1;
                if done % interval != 0 {
                    continue;
                }
                let progress = ScanProgress {
                    percent_done: (done * 100 / total) as u8,
                    remaining: total - done,
                    done,
                };
                if self.hooks.fire_progress(&progress) && done < total {
                    outcome.cancelled = true;
                    let done = done.to_string();
                    let total = total.to_string();
                    log_event_with_fields(
                        Event::ScanCancelled,
                        &[("done", done.as_str()), ("total", total.as_str())],
                    );
                    break;
                }
            }
            Ok(outcome)
        })
    }

    /// Features whose bounding box intersects `bbox`.
    pub fn get_features_inside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            let bbox = self.query_box(bbox)?;
            let plan = self.plan(columns)?;
            let features = self.fetch_merged(
                &plan,
                |fetch| self.store.get_features_inside_bounding_box(&bbox, fetch),
                |f| Ok(self.feature_box(f)?.is_some_and(|b| b.intersects(&bbox))),
            )?;
            self.finish(features, &plan)
        })
    }

    /// Features whose bounding box does not intersect `bbox`.
    pub fn get_features_outside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            let bbox = self.query_box(bbox)?;
            let plan = self.plan(columns)?;
            let features = self.fetch_merged(
                &plan,
                |fetch| self.store.get_features_outside_bounding_box(&bbox, fetch),
                |f| Ok(self.feature_box(f)?.is_some_and(|b| !b.intersects(&bbox))),
            )?;
            self.finish(features, &plan)
        })
    }

    /// Features with the given ids, in requested order. Unknown ids are
    /// skipped and repeated ids collapse.
    pub fn get_features_by_ids(&self, ids: &[String], columns: &[String]) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            if ids.iter().any(|id| id.is_empty()) {
                return Err(EngineError::validation("feature ids must not be empty"));
            }
            let plan = self.plan(columns)?;
            let features = if self.overlay_active() || self.cache.is_none() {
                self.fetch_merged(
                    &plan,
                    |fetch| self.store.get_features_by_ids(ids, fetch),
                    |f| Ok(ids.iter().any(|id| id == f.id())),
                )?
            } else {
                self.fetch_by_ids_cached(ids, &plan)?
            };
            self.finish(order_by_ids(features, ids), &plan)
        })
    }

    /// Features whose native `column` equals `value` exactly.
    pub fn get_features_by_column_value(
        &self,
        column: &str,
        value: &str,
        columns: &[String],
    ) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            if column.is_empty() {
                return Err(EngineError::validation("column name is required"));
            }
            let native = self.get_columns()?;
            if !native.iter().any(|c| c.name == column) {
                return Err(EngineError::validation(format!(
                    "column '{}' is not stored by the backend",
                    column
                )));
            }
            let plan = ColumnPlan::new(columns, &native);
            let features = self.fetch_merged(
                &plan,
                |fetch| self.store.get_features_by_column_value(column, value, fetch),
                |f| Ok(f.column(column) == Some(value)),
            )?;
            self.finish(features, &plan)
        })
    }

    /// Number of visible features.
    pub fn get_count(&self) -> EngineResult<usize> {
        self.track(|| {
            if !self.overlay_active() && self.excluded_ids.is_empty() {
                return Ok(self.store.get_count()?);
            }
            let features = self.visible_unprojected()?;
            Ok(features.len())
        })
    }

    /// Union of every visible feature's bounding box, `None` when empty.
    pub fn get_bounding_box(&self) -> EngineResult<Option<BoundingBox>> {
        self.track(|| {
            let bbox = if !self.overlay_active() && self.excluded_ids.is_empty() {
                self.store.get_bounding_box()?
            } else {
                let mut boxes = Vec::new();
                for feature in self.visible_unprojected()? {
                    boxes.extend(self.feature_box(&feature)?);
                }
                BoundingBox::union_all(boxes)
            };
            bbox.map(|b| self.box_to_external(&b)).transpose()
        })
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Count successful reads and log rejected ones.
    pub(super) fn track<T>(&self, read: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
        let result = self.ensure_open().and_then(|_| read());
        match &result {
            Ok(_) => self.metrics.increment_queries_executed(),
            Err(e)
                if matches!(
                    e.code(),
                    EngineErrorCode::PreconditionViolation | EngineErrorCode::ValidationFailed
                ) =>
            {
                self.metrics.increment_queries_rejected();
                log_event_with_fields(
                    Event::QueryRejected,
                    &[("code", e.code().code()), ("message", e.message())],
                );
            }
            Err(_) => {}
        }
        result
    }

    pub(super) fn plan(&self, columns: &[String]) -> EngineResult<ColumnPlan> {
        if columns.iter().any(|c| c.is_empty()) {
            return Err(EngineError::validation("column names must not be empty"));
        }
        Ok(ColumnPlan::new(columns, &self.get_columns()?))
    }

    /// Backend fetch with combinators, overlaid with the pending buffer when
    /// a live transaction is active.
    pub(super) fn fetch_merged<F, M>(
        &self,
        plan: &ColumnPlan,
        fetch: F,
        matches: M,
    ) -> EngineResult<Vec<Feature>>
    where
        F: FnOnce(&[String]) -> StoreResult<Vec<Feature>>,
        M: FnMut(&Feature) -> EngineResult<bool>,
    {
        let mut features = fetch(plan.fetch())?;
        plan.apply_combinators(&mut features);
        if self.overlay_active() {
            features = overlay::merge(features, &self.buffer, matches, |f| plan.prepare_buffered(f))?;
        }
        Ok(features)
    }

    pub(super) fn visible(&self, feature: &Feature) -> bool {
        feature.is_valid() && !self.excluded_ids.contains(feature.id())
    }

    /// Drop invisible features and finish the rest.
    pub(super) fn finish(&self, features: Vec<Feature>, plan: &ColumnPlan) -> EngineResult<Vec<Feature>> {
        features
            .into_iter()
            .filter(|f| self.visible(f))
            .map(|f| self.finish_one(f, plan))
            .collect()
    }

    fn finish_one(&self, mut feature: Feature, plan: &ColumnPlan) -> EngineResult<Feature> {
        feature.retain_columns(plan.output());
        self.resolve_virtual_columns(&mut feature, plan);
        self.feature_to_external(feature)
    }

    /// One callback round per virtual column; a value the feature already
    /// carries is kept.
    fn resolve_virtual_columns(&self, feature: &mut Feature, plan: &ColumnPlan) {
        if plan.virtual_columns().is_empty() || !self.hooks.has_custom_column_resolver() {
            return;
        }
        for column in plan.virtual_columns() {
            self.metrics.add_virtual_column_fetches(1);
            let value = self.hooks.fetch_custom_column(column, feature.id());
            if let Some(value) = value {
                feature.set_column_if_absent(column, value);
            }
        }
    }

    fn fetch_by_ids_cached(&self, ids: &[String], plan: &ColumnPlan) -> EngineResult<Vec<Feature>> {
        let Some(cache) = &self.cache else {
            return self.fetch_merged(
                plan,
                |fetch| self.store.get_features_by_ids(ids, fetch),
                |_| Ok(true),
            );
        };

        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            for id in ids {
                match cache.get(&FeatureCacheKey::new(id.as_str(), plan.fetch())) {
                    Some(feature) => {
                        self.metrics.increment_cache_hits();
                        found.push(feature.clone());
                    }
                    None => {
                        self.metrics.increment_cache_misses();
                        missing.push(id.clone());
                    }
                }
            }
        }

        if !missing.is_empty() {
            let fetched = self.store.get_features_by_ids(&missing, plan.fetch())?;
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            for feature in &fetched {
                cache.insert(FeatureCacheKey::new(feature.id(), plan.fetch()), feature.clone());
            }
            found.extend(fetched);
        }

        plan.apply_combinators(&mut found);
        Ok(found)
    }

    /// Visible features without columns, still in internal coordinates.
    fn visible_unprojected(&self) -> EngineResult<Vec<Feature>> {
        let plan = ColumnPlan::default();
        let mut features =
            self.fetch_merged(&plan, |fetch| self.store.get_all_features(fetch), |_| Ok(true))?;
        features.retain(|f| self.visible(f));
        Ok(features)
    }

    // =========================================================================
    // Geometry helpers
    // =========================================================================

    pub(super) fn feature_box(&self, feature: &Feature) -> EngineResult<Option<BoundingBox>> {
        match feature.geometry() {
            Some(g) => Ok(Some(self.store.geometry().bounding_box(g)?)),
            None => Ok(None),
        }
    }

    /// Validate a caller-supplied box and convert it to internal coordinates.
    fn query_box(&self, bbox: &BoundingBox) -> EngineResult<BoundingBox> {
        if !bbox.is_finite() {
            return Err(EngineError::validation("bounding box must be finite"));
        }
        match &self.projection {
            Some(projection) => projection
                .box_to_internal(bbox)
                .map_err(|e| EngineError::validation(e.to_string())),
            None => Ok(*bbox),
        }
    }

    /// Validate a caller-supplied geometry and convert it to internal
    /// coordinates.
    pub(super) fn query_target(&self, target: &[u8]) -> EngineResult<Vec<u8>> {
        if target.is_empty() {
            return Err(EngineError::validation("target geometry is required"));
        }
        let internal = self.geometry_to_internal(target)?;
        self.store
            .geometry()
            .validate(&internal)
            .map_err(|e| EngineError::validation(e.to_string()))?;
        Ok(internal)
    }

    fn box_to_external(&self, bbox: &BoundingBox) -> EngineResult<BoundingBox> {
        match &self.projection {
            Some(projection) => Ok(projection.box_to_external(bbox)?),
            None => Ok(*bbox),
        }
    }

    fn feature_to_external(&self, feature: Feature) -> EngineResult<Feature> {
        let (Some(projection), Some(geometry)) = (&self.projection, feature.geometry()) else {
            return Ok(feature);
        };
        let external = projection.to_external(geometry)?;
        Ok(feature.with_geometry(external))
    }
}

/// Reorder `features` to follow `ids`; ids without a feature are skipped.
fn order_by_ids(features: Vec<Feature>, ids: &[String]) -> Vec<Feature> {
    let mut by_id: HashMap<String, Feature> = HashMap::with_capacity(features.len());
    for feature in features {
        by_id.entry(feature.id().to_string()).or_insert(feature);
    }
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, OffsetProjection};
    use crate::feature::FeatureSourceColumn;
    use crate::geometry::wkt_blob::point;
    use crate::store::MemoryFeatureStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ids(features: &[Feature]) -> Vec<&str> {
        features.iter().map(|f| f.id()).collect()
    }

    fn engine_with(config: EngineConfig) -> QueryEngine<MemoryFeatureStore> {
        let store = MemoryFeatureStore::new(vec![
            FeatureSourceColumn::string("Name"),
            FeatureSourceColumn::string("Kind"),
        ]);
        for (id, x, y, kind) in [
            ("A", 0.0, 0.0, "tree"),
            ("B", 10.0, 0.0, "rock"),
            ("C", 100.0, 100.0, "tree"),
        ] {
            store
                .insert(
                    Feature::new(id, point(x, y))
                        .with_column("Name", id.to_lowercase())
                        .with_column("Kind", kind),
                )
                .unwrap();
        }
        store.insert(Feature::without_geometry("EMPTY")).unwrap();
        let mut engine = QueryEngine::new(store).with_config(config);
        engine.open().unwrap();
        engine
    }

    fn engine() -> QueryEngine<MemoryFeatureStore> {
        engine_with(EngineConfig::default())
    }

    #[test]
    fn test_reads_require_open() {
        let mut engine = engine();
        engine.close().unwrap();
        let err = engine.get_all_features(&[]).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::PreconditionViolation);
        assert_eq!(engine.metrics().snapshot().queries_rejected, 1);
    }

    #[test]
    fn test_invalid_features_never_returned() {
        let engine = engine();
        assert_eq!(ids(&engine.get_all_features(&[]).unwrap()), vec!["A", "B", "C"]);
        let by_id = engine.get_features_by_ids(&cols(&["EMPTY", "A"]), &[]).unwrap();
        assert_eq!(ids(&by_id), vec!["A"]);
    }

    #[test]
    fn test_only_requested_columns_returned() {
        let engine = engine();
        let features = engine.get_all_features(&cols(&["Name"])).unwrap();
        assert_eq!(features[0].column("Name"), Some("a"));
        assert_eq!(features[0].column("Kind"), None);
    }

    #[test]
    fn test_inside_and_outside_box() {
        let engine = engine();
        let bbox = BoundingBox::new(-1.0, -1.0, 20.0, 1.0);
        let inside = engine.get_features_inside_bounding_box(&bbox, &[]).unwrap();
        let outside = engine.get_features_outside_bounding_box(&bbox, &[]).unwrap();
        assert_eq!(ids(&inside), vec!["A", "B"]);
        assert_eq!(ids(&outside), vec!["C"]);
    }

    #[test]
    fn test_non_finite_box_rejected() {
        let engine = engine();
        let bbox = BoundingBox::new(0.0, 0.0, f64::INFINITY, 1.0);
        let err = engine.get_features_inside_bounding_box(&bbox, &[]).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::ValidationFailed);
    }

    #[test]
    fn test_by_ids_follow_requested_order() {
        let engine = engine();
        let features = engine
            .get_features_by_ids(&cols(&["C", "missing", "A", "C"]), &[])
            .unwrap();
        assert_eq!(ids(&features), vec!["C", "A"]);
    }

    #[test]
    fn test_by_column_value() {
        let engine = engine();
        let trees = engine
            .get_features_by_column_value("Kind", "tree", &cols(&["Name"]))
            .unwrap();
        assert_eq!(ids(&trees), vec!["A", "C"]);
        assert_eq!(trees[0].column("Kind"), None);

        let err = engine
            .get_features_by_column_value("Nope", "x", &[])
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::ValidationFailed);
    }

    #[test]
    fn test_excluded_ids_hidden_everywhere() {
        let mut engine = engine();
        engine.exclude_ids(["B"]);
        assert_eq!(ids(&engine.get_all_features(&[]).unwrap()), vec!["A", "C"]);
        assert!(engine.get_features_by_ids(&cols(&["B"]), &[]).unwrap().is_empty());
        assert_eq!(engine.get_count().unwrap(), 2);
        engine.clear_excluded_ids();
        assert_eq!(engine.get_count().unwrap(), 3);
    }

    #[test]
    fn test_bounding_box() {
        let engine = engine();
        assert_eq!(
            engine.get_bounding_box().unwrap(),
            Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0))
        );
    }

    #[test]
    fn test_live_count_and_box_see_buffer() {
        let mut engine = engine_with(EngineConfig::live());
        engine.begin_transaction().unwrap();
        engine.delete_feature("C").unwrap();
        engine.add_feature(Feature::new("D", point(-5.0, 3.0))).unwrap();
        assert_eq!(engine.get_count().unwrap(), 3);
        assert_eq!(
            engine.get_bounding_box().unwrap(),
            Some(BoundingBox::new(-5.0, 0.0, 10.0, 3.0))
        );
    }

    #[test]
    fn test_virtual_column_resolved_once_per_feature() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = engine();
        let counter = Arc::clone(&calls);
        engine.hooks_mut().on_custom_column_fetch(move |column, id| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(format!("{}-{}", column, id))
        });
        let features = engine.get_all_features(&cols(&["Name", "Label"])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(features[1].column("Label"), Some("Label-B"));
        assert_eq!(engine.metrics().snapshot().virtual_column_fetches, 3);
    }

    #[test]
    fn test_unresolved_virtual_column_left_absent() {
        let engine = engine();
        let features = engine.get_all_features(&cols(&["Label"])).unwrap();
        assert!(features.iter().all(|f| f.column("Label").is_none()));
    }

    #[test]
    fn test_combinator_column() {
        let engine = engine();
        let features = engine.get_all_features(&cols(&["[Name]/[Kind]"])).unwrap();
        assert_eq!(features[0].column("[Name]/[Kind]"), Some("a/tree"));
        assert_eq!(features[0].column("Name"), None);
    }

    #[test]
    fn test_cache_hits_after_first_fetch() {
        let engine = engine_with(EngineConfig {
            read_cache_enabled: true,
            ..EngineConfig::default()
        });
        let wanted = cols(&["A", "B"]);
        engine.get_features_by_ids(&wanted, &cols(&["Name"])).unwrap();
        let again = engine.get_features_by_ids(&wanted, &cols(&["Name"])).unwrap();
        assert_eq!(ids(&again), vec!["A", "B"]);
        let stats = engine.cache_stats().unwrap();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn test_cache_cleared_on_commit() {
        let mut engine = engine_with(EngineConfig {
            read_cache_enabled: true,
            ..EngineConfig::default()
        });
        let wanted = cols(&["A"]);
        engine.get_features_by_ids(&wanted, &[]).unwrap();
        engine.begin_transaction().unwrap();
        engine.update_feature(Feature::new("A", point(7.0, 7.0))).unwrap();
        engine.commit_transaction().unwrap();
        let after = engine.get_features_by_ids(&wanted, &[]).unwrap();
        assert_eq!(after[0].geometry(), Some(point(7.0, 7.0).as_slice()));
    }

    #[test]
    fn test_progress_reported_and_cancellable() {
        let store = MemoryFeatureStore::new(vec![]);
        for i in 0..500 {
            store
                .insert(Feature::new(format!("f{}", i), point(i as f64, 0.0)))
                .unwrap();
        }
        let mut engine = QueryEngine::new(store);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        engine.hooks_mut().on_progress_changed(move |p| {
            log.lock().unwrap().push(*p);
            false
        });
        engine.open().unwrap();
        let outcome = engine.get_all_features_with_progress(&[]).unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.features.len(), 500);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ScanProgress { percent_done: 40, remaining: 300, done: 200 });

        engine.hooks_mut().on_progress_changed(|_| true);
        let outcome = engine.get_all_features_with_progress(&[]).unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.features.len(), 200);
    }

    #[test]
    fn test_projection_round_trip() {
        let store = MemoryFeatureStore::new(vec![]);
        store.insert(Feature::new("P", point(101.0, 1.0))).unwrap();
        let mut engine =
            QueryEngine::new(store).with_projection(Box::new(OffsetProjection::new(100.0, 0.0)));
        engine.open().unwrap();

        let features = engine
            .get_features_inside_bounding_box(&BoundingBox::new(0.0, 0.0, 2.0, 2.0), &[])
            .unwrap();
        assert_eq!(ids(&features), vec!["P"]);
        let bbox = engine.store().geometry().bounding_box(features[0].geometry().unwrap()).unwrap();
        assert_eq!(bbox, BoundingBox::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(
            engine.get_bounding_box().unwrap(),
            Some(BoundingBox::new(1.0, 1.0, 1.0, 1.0))
        );
    }
}
