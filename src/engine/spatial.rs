//! Spatial predicate, nearest-neighbor and within-distance queries.

use std::collections::HashSet;

use crate::feature::Feature;
use crate::geometry::SpatialPredicate;
use crate::store::search::rank_by_distance;
use crate::store::FeatureStore;

use super::engine::QueryEngine;
use super::errors::{EngineError, EngineResult};

impl<S: FeatureStore> QueryEngine<S> {
    /// Features where `feature <predicate> target` holds.
    ///
    /// Candidates come from the bounding-box prefilter and are refined
    /// exactly. `Disjoint` also scans the features outside the target box,
    /// since an intersects prefilter cannot find them.
    pub fn spatial_query(
        &self,
        target: &[u8],
        predicate: SpatialPredicate,
        columns: &[String],
    ) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            let target = self.query_target(target)?;
            let plan = self.plan(columns)?;
            let geometry = self.store.geometry();
            let target_box = geometry.bounding_box(&target)?;

            let features = self.fetch_merged(
                &plan,
                |fetch| {
                    let mut candidates =
                        self.store.get_features_inside_bounding_box(&target_box, fetch)?;
                    if !predicate.requires_intersecting_box() {
                        let mut seen: HashSet<String> =
                            candidates.iter().map(|f| f.id().to_string()).collect();
                        for feature in self.store.get_features_outside_bounding_box(&target_box, fetch)? {
                            if seen.insert(feature.id().to_string()) {
                                candidates.push(feature);
                            }
                        }
                    }
                    let mut refined = Vec::with_capacity(candidates.len());
                    for feature in candidates {
                        let keep = match feature.geometry() {
                            Some(g) => geometry.evaluate(predicate, g, &target)?,
                            None => false,
                        };
                        if keep {
                            refined.push(feature);
                        }
                    }
                    Ok(refined)
                },
                |f| match f.geometry() {
                    Some(g) => Ok(geometry.evaluate(predicate, g, &target)?),
                    None => Ok(false),
                },
            )?;
            self.finish(features, &plan)
        })
    }

    /// The `k` visible features nearest to `target`, ascending by distance,
    /// ties in encounter order.
    ///
    /// The store is asked for `k` plus one extra candidate for every pending
    /// edit or delete and every excluded id, so after those are removed or
    /// displaced at least `k` true candidates remain. Pending adds and edits
    /// always join the candidate set before re-ranking.
    pub fn get_features_nearest_to(
        &self,
        target: &[u8],
        k: usize,
        columns: &[String],
    ) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            let target = self.query_target(target)?;
            let plan = self.plan(columns)?;
            if k == 0 {
                return Ok(Vec::new());
            }

            let mut margin = self.excluded_ids.len();
            if self.overlay_active() {
                margin += self.buffer.displacing_len();
            }
            let options = self.config.nearest_options();
            let mut iterations = 0;
            let mut features = self.fetch_merged(
                &plan,
                |fetch| {
                    let outcome = self.store.get_features_nearest_to(
                        &target,
                        k.saturating_add(margin),
                        fetch,
                        &options,
                    )?;
                    iterations = outcome.iterations;
                    Ok(outcome.features)
                },
                |_| Ok(true),
            )?;
            self.metrics.add_nearest_iterations(u64::from(iterations));

            features.retain(|f| self.visible(f));
            let nearest = rank_by_distance(self.store.geometry(), &target, features)?
                .into_iter()
                .take(k)
                .map(|(f, _)| f)
                .collect();
            self.finish(nearest, &plan)
        })
    }

    /// Features strictly closer than `distance` to `target`.
    pub fn get_features_within_distance_of(
        &self,
        target: &[u8],
        distance: f64,
        columns: &[String],
    ) -> EngineResult<Vec<Feature>> {
        self.track(|| {
            if !distance.is_finite() || distance < 0.0 {
                return Err(EngineError::validation(format!(
                    "distance must be finite and non-negative, got {}",
                    distance
                )));
            }
            let target = self.query_target(target)?;
            let plan = self.plan(columns)?;
            let geometry = self.store.geometry();

            let features = self.fetch_merged(
                &plan,
                |fetch| self.store.get_features_within_distance_of(&target, distance, fetch),
                |f| match f.geometry() {
                    Some(g) => Ok(geometry.distance(g, &target)? < distance),
                    None => Ok(false),
                },
            )?;
            self.finish(features, &plan)
        })
    }
}
