//! Nearest-neighbor and within-distance search over the three mandatory store
//! primitives.
//!
//! Nearest search grows a box around the target until it holds enough
//! candidates, then widens once more to the k-th candidate's distance so a
//! feature just outside the box corner cannot be missed.

use serde::{Deserialize, Serialize};

use crate::feature::Feature;
use crate::geometry::GeometryEngine;
use crate::observability::{log_event_with_fields, Event};

use super::contract::FeatureStore;
use super::errors::StoreResult;

/// Tuning for the adaptive nearest-neighbor box search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestOptions {
    /// Factor the search box grows by per iteration.
    pub growth_factor: f64,
    /// Upper bound on search iterations.
    pub max_iterations: u32,
    /// Padding applied to zero-width or zero-height target boxes.
    pub epsilon: f64,
}

impl Default for NearestOptions {
    fn default() -> Self {
        Self {
            growth_factor: 200.0,
            max_iterations: 100,
            epsilon: 1e-6,
        }
    }
}

/// Outcome of a box-growth search, for callers that track metrics.
#[derive(Debug, Clone, Default)]
pub struct NearestOutcome {
    pub features: Vec<Feature>,
    /// Number of inside-box queries issued.
    pub iterations: u32,
    /// The iteration bound was reached before `k` candidates were found.
    pub exhausted: bool,
}

/// Pair each valid feature with its distance to `target` and sort ascending.
/// The sort is stable, so ties keep encounter order. Invalid features are
/// dropped.
pub fn rank_by_distance(
    geometry: &dyn GeometryEngine,
    target: &[u8],
    features: Vec<Feature>,
) -> StoreResult<Vec<(Feature, f64)>> {
    let mut ranked = Vec::with_capacity(features.len());
    for feature in features {
        let distance = match feature.geometry() {
            Some(g) => geometry.distance(g, target)?,
            None => continue,
        };
        ranked.push((feature, distance));
    }
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    Ok(ranked)
}

/// Default nearest-neighbor search.
pub fn nearest_by_box_growth<S: FeatureStore + ?Sized>(
    store: &S,
    target: &[u8],
    k: usize,
    columns: &[String],
    options: &NearestOptions,
) -> StoreResult<NearestOutcome> {
    let mut outcome = NearestOutcome::default();
    if k == 0 {
        return Ok(outcome);
    }

    let geometry = store.geometry();
    let total = store.get_count()?;

    let candidates = if k >= total {
        store.get_all_features(columns)?
    } else {
        let target_box = geometry.bounding_box(target)?;
        let mut search_box = target_box.pad_degenerate(options.epsilon);
        let mut found = store.get_features_inside_bounding_box(&search_box, columns)?;
        outcome.iterations = 1;

        while valid_count(&found) < k && outcome.iterations < options.max_iterations {
            search_box = search_box
                .scale(options.growth_factor)
                .pad_degenerate(options.epsilon);
            found = store.get_features_inside_bounding_box(&search_box, columns)?;
            outcome.iterations += 1;
        }

        if valid_count(&found) < k {
            outcome.exhausted = true;
            let found_count = valid_count(&found).to_string();
            let iterations = outcome.iterations.to_string();
            let wanted = k.to_string();
            log_event_with_fields(
                Event::NearestSearchExhausted,
                &[
                    ("found", found_count.as_str()),
                    ("iterations", iterations.as_str()),
                    ("k", wanted.as_str()),
                ],
            );
            found
        } else {
            let ranked = rank_by_distance(geometry, target, found)?;
            let reach = target_box.expand(ranked[k - 1].1);
            if search_box.contains(&reach) {
                ranked.into_iter().map(|(f, _)| f).collect()
            } else {
                outcome.iterations += 1;
                store.get_features_inside_bounding_box(&reach, columns)?
            }
        }
    };

    outcome.features = rank_by_distance(geometry, target, candidates)?
        .into_iter()
        .take(k)
        .map(|(f, _)| f)
        .collect();
    Ok(outcome)
}

/// Default within-distance search: prefilter by the target box buffered by
/// `distance`, keep exact distances strictly below it.
pub fn within_distance_by_box<S: FeatureStore + ?Sized>(
    store: &S,
    target: &[u8],
    distance: f64,
    columns: &[String],
) -> StoreResult<Vec<Feature>> {
    let geometry = store.geometry();
    let prefilter = geometry.bounding_box(target)?.expand(distance);
    let candidates = store.get_features_inside_bounding_box(&prefilter, columns)?;

    let mut kept = Vec::new();
    for feature in candidates {
        let within = match feature.geometry() {
            Some(g) => geometry.distance(g, target)? < distance,
            None => false,
        };
        if within {
            kept.push(feature);
        }
    }
    Ok(kept)
}

fn valid_count(features: &[Feature]) -> usize {
    features.iter().filter(|f| f.is_valid()).count()
}
