//! Spatial Query Properties
//!
//! - Disjoint and Intersects partition the full feature set
//! - Nearest-neighbor search agrees with a brute-force ranking
//! - Within-distance search agrees with a brute-force filter

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use geoquery::engine::{EngineConfig, QueryEngine};
use geoquery::feature::{BoundingBox, Feature};
use geoquery::geometry::wkt_blob::{point, rectangle};
use geoquery::geometry::{GeometryEngine, SpatialPredicate, WktGeometry};
use geoquery::store::MemoryFeatureStore;

fn random_feature(rng: &mut StdRng, id: String) -> Feature {
    let x = rng.gen_range(-50.0..50.0);
    let y = rng.gen_range(-50.0..50.0);
    if rng.gen_bool(0.5) {
        Feature::new(id, point(x, y))
    } else {
        let w = rng.gen_range(0.5..8.0);
        let h = rng.gen_range(0.5..8.0);
        Feature::new(id, rectangle(&BoundingBox::new(x, y, x + w, y + h)))
    }
}

fn random_engine(seed: u64, count: usize) -> QueryEngine<MemoryFeatureStore> {
    let mut rng = StdRng::seed_from_u64(seed);
    let store = MemoryFeatureStore::new(vec![]);
    for i in 0..count {
        store.insert(random_feature(&mut rng, format!("f{}", i))).unwrap();
    }
    let mut engine = QueryEngine::new(store);
    engine.open().unwrap();
    engine
}

fn id_set(features: &[Feature]) -> BTreeSet<String> {
    features.iter().map(|f| f.id().to_string()).collect()
}

fn brute_force_distances(features: &[Feature], target: &[u8]) -> Vec<f64> {
    let geometry = WktGeometry::new();
    let mut distances: Vec<f64> = features
        .iter()
        .map(|f| geometry.distance(f.geometry().unwrap(), target).unwrap())
        .collect();
    distances.sort_by(|a, b| a.total_cmp(b));
    distances
}

// =============================================================================
// Predicate Partition
// =============================================================================

/// Every feature is either disjoint from or intersects the query shape.
#[test]
fn test_disjoint_and_intersects_partition_all_features() {
    let engine = random_engine(1, 80);
    let all = id_set(&engine.get_all_features(&[]).unwrap());
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..15 {
        let x = rng.gen_range(-40.0..40.0);
        let y = rng.gen_range(-40.0..40.0);
        let size = rng.gen_range(1.0..30.0);
        let shape = rectangle(&BoundingBox::new(x, y, x + size, y + size));

        let disjoint = id_set(
            &engine
                .spatial_query(&shape, SpatialPredicate::Disjoint, &[])
                .unwrap(),
        );
        let intersects = id_set(
            &engine
                .spatial_query(&shape, SpatialPredicate::Intersects, &[])
                .unwrap(),
        );

        assert!(disjoint.is_disjoint(&intersects));
        let union: BTreeSet<String> = disjoint.union(&intersects).cloned().collect();
        assert_eq!(union, all);
    }
}

/// Exact refinement drops bounding-box false positives.
#[test]
fn test_intersects_refines_box_candidates() {
    let store = MemoryFeatureStore::new(vec![]);
    // Diagonal line whose box covers the query point but whose geometry misses it
    store
        .insert(Feature::new("diag", "LINESTRING(0 0, 10 10)"))
        .unwrap();
    store.insert(Feature::new("hit", point(2.0, 8.0))).unwrap();
    let mut engine = QueryEngine::new(store);
    engine.open().unwrap();

    let target = rectangle(&BoundingBox::new(1.0, 7.0, 3.0, 9.0));
    let inside_box = engine
        .get_features_inside_bounding_box(&BoundingBox::new(1.0, 7.0, 3.0, 9.0), &[])
        .unwrap();
    assert_eq!(inside_box.len(), 2);

    let exact = engine
        .spatial_query(&target, SpatialPredicate::Intersects, &[])
        .unwrap();
    assert_eq!(id_set(&exact), BTreeSet::from(["hit".to_string()]));
}

// =============================================================================
// Nearest Neighbor
// =============================================================================

/// The reference scenario from three points.
#[test]
fn test_nearest_two_of_three() {
    let store = MemoryFeatureStore::new(vec![]);
    store.insert(Feature::new("A", point(0.0, 0.0))).unwrap();
    store.insert(Feature::new("B", point(10.0, 0.0))).unwrap();
    store.insert(Feature::new("C", point(100.0, 100.0))).unwrap();
    let mut engine = QueryEngine::new(store);
    engine.open().unwrap();

    let nearest = engine
        .get_features_nearest_to(&point(0.0, 0.0), 2, &[])
        .unwrap();
    let ids: Vec<&str> = nearest.iter().map(|f| f.id()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

/// Points one unit apart stay reachable far from the origin.
#[test]
fn test_nearest_far_from_origin() {
    for (dx, dy) in [(1.0, 0.0), (0.0, 1.0)] {
        let base = 1e12;
        let store = MemoryFeatureStore::new(vec![]);
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            let step = (i + 1) as f64;
            let (x, y) = if dx > 0.0 { (base + step, 0.0) } else { (0.0, base + step) };
            store.insert(Feature::new(*id, point(x, y))).unwrap();
        }
        let mut engine = QueryEngine::new(store);
        engine.open().unwrap();

        let target = if dx > 0.0 { point(base, 0.0) } else { point(0.0, base) };
        let nearest = engine.get_features_nearest_to(&target, 2, &[]).unwrap();
        let ids: Vec<&str> = nearest.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["A", "B"], "offset ({}, {})", dx, dy);
    }
}

/// Nearest returns min(k, total) features ranked like a brute-force scan.
#[test]
fn test_nearest_matches_brute_force() {
    let engine = random_engine(5, 120);
    let all = engine.get_all_features(&[]).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    for k in [1usize, 3, 10, 50, 119, 120, 500] {
        let target = point(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0));
        let nearest = engine.get_features_nearest_to(&target, k, &[]).unwrap();
        assert_eq!(nearest.len(), k.min(all.len()), "k = {}", k);

        let expected = brute_force_distances(&all, &target);
        let actual = brute_force_distances(&nearest, &target);
        for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
            assert!((a - e).abs() < 1e-9, "k = {} rank {}: {} != {}", k, i, a, e);
        }

        // Returned in ascending distance order
        let geometry = WktGeometry::new();
        let in_order: Vec<f64> = nearest
            .iter()
            .map(|f| geometry.distance(f.geometry().unwrap(), &target).unwrap())
            .collect();
        assert!(in_order.windows(2).all(|w| w[0] <= w[1]));
    }
}

/// A small growth factor needs more iterations but finds the same answer.
#[test]
fn test_nearest_independent_of_growth_factor() {
    let mut rng = StdRng::seed_from_u64(3);
    let store = MemoryFeatureStore::new(vec![]);
    for i in 0..40 {
        store.insert(random_feature(&mut rng, format!("f{}", i))).unwrap();
    }
    let config = EngineConfig {
        nearest_growth_factor: 2.0,
        ..EngineConfig::default()
    };
    let mut slow = QueryEngine::new(store).with_config(config);
    slow.open().unwrap();
    let fast = random_engine(3, 40);

    let target = point(7.5, -3.25);
    let a = id_set(&slow.get_features_nearest_to(&target, 5, &[]).unwrap());
    let b = id_set(&fast.get_features_nearest_to(&target, 5, &[]).unwrap());
    assert_eq!(a, b);
}

// =============================================================================
// Within Distance
// =============================================================================

/// Within-distance keeps exactly the features strictly closer than `d`.
#[test]
fn test_within_distance_matches_brute_force() {
    let engine = random_engine(11, 100);
    let all = engine.get_all_features(&[]).unwrap();
    let geometry = WktGeometry::new();
    let mut rng = StdRng::seed_from_u64(23);

    for _ in 0..10 {
        let target = point(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
        let distance = rng.gen_range(0.5..25.0);

        let expected: BTreeSet<String> = all
            .iter()
            .filter(|f| geometry.distance(f.geometry().unwrap(), &target).unwrap() < distance)
            .map(|f| f.id().to_string())
            .collect();
        let actual = engine
            .get_features_within_distance_of(&target, distance, &[])
            .unwrap();
        assert_eq!(id_set(&actual), expected);
    }
}
