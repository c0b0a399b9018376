//! End-to-end tests for the full scoring pipeline.
//!
//! Each test exercises: grid -> accessibility -> rent join -> smoothing ->
//! budget filter -> match score -> grouping, through `Pipeline::run()` or
//! the public stage types.

use std::sync::Arc;

use livability::config::Deadline;
use livability::{
    AccessibilityCache, AccessibilityScorer, BudgetIntegrator, Category, CategoryConfig, CategoryMap,
    CategoryTable, CellId, Error, GridGenerator, Grouping, HexCell, LatLon, LruAccessibilityCache, Mobility,
    Pipeline, PoiRecord, PoiTable, RentSample, RunLimits, RunParams, ScoringConfig,
};
use pretty_assertions::assert_eq;

const ATLANTA: LatLon = LatLon { lat: 33.749, lon: -84.388 };

fn city_pois() -> PoiTable {
    PoiTable::new(vec![
        PoiRecord::new("park", 33.752, -84.391).with_name("Woodruff Park"),
        PoiRecord::new("park", 33.760, -84.380),
        PoiRecord::new("grocery_store", 33.746, -84.384),
        PoiRecord::new("school", 33.741, -84.395),
        PoiRecord::new("marta_stop", 33.754, -84.389),
        PoiRecord::new("hospital", 33.770, -84.390),
        PoiRecord::new("park", 33.790, -84.388).with_name("Piedmont Park"),
        PoiRecord::new("crime_incident", 33.750, -84.388),
        PoiRecord::new("crime_incident", 33.743, -84.381),
    ])
}

fn city_rents() -> Vec<RentSample> {
    vec![
        RentSample::new(33.749, -84.388, 1100.0),
        RentSample::new(33.758, -84.385, 1600.0),
        RentSample::new(33.740, -84.395, 800.0),
        RentSample::new(33.752, -84.375, 950.0),
    ]
}

fn params() -> RunParams {
    RunParams {
        center: ATLANTA,
        radius_km: 1.5,
        max_budget: 1500.0,
        ..RunParams::default()
    }
    .with_rank(Category::Park, 1)
    .with_rank(Category::GroceryStore, 2)
    .with_rank(Category::TransitStop, 3)
    .with_rank(Category::CrimeIncident, 2)
}

// ============================================================================
// 1. Full run
// ============================================================================

#[test]
fn test_full_run_produces_ranked_cells() {
    let pipeline = Pipeline::new(city_pois(), city_rents());
    let out = pipeline.run(&params()).unwrap();

    assert!(!out.cells.is_empty());
    assert!(out.cells.windows(2).all(|w| w[0].id < w[1].id));
    for cell in &out.cells {
        assert!(cell.avg_rent.unwrap() <= 1500.0);
        let score = cell.match_score.unwrap();
        assert!((0.0..=1.0 + 1e-9).contains(&score));
        assert_eq!(cell.normalized.len(), 4);
        assert_eq!(cell.accessibility.len(), Category::COUNT);
    }
    assert_eq!(
        out.stats.cells_returned + out.stats.over_budget + out.stats.dropped_without_rent,
        out.stats.cells_scored
    );
}

#[test]
fn test_identical_runs_identical_output() {
    let a = Pipeline::new(city_pois(), city_rents()).run(&params()).unwrap();
    let b = Pipeline::new(city_pois(), city_rents()).run(&params()).unwrap();
    assert_eq!(a.cells, b.cells);
    assert_eq!(a.thresholds, b.thresholds);
}

#[test]
fn test_tiers_are_monotone_in_score() {
    let out = Pipeline::new(city_pois(), city_rents())
        .run(&RunParams { grouping: Grouping::tiers(3), ..params() })
        .unwrap();

    let mut ranked: Vec<(f64, usize)> = out
        .cells
        .iter()
        .map(|c| (c.match_score.unwrap(), c.classification.as_ref().unwrap().tier().unwrap()))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    assert!(ranked.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(ranked.iter().all(|(_, t)| *t < 3));
}

#[test]
fn test_score_clusters_cover_all_cells() {
    let out = Pipeline::new(city_pois(), city_rents())
        .run(&RunParams { grouping: Grouping::score_clusters(), ..params() })
        .unwrap();
    let total: usize = out.clusters.iter().map(|s| s.count).sum();
    assert_eq!(total, out.cells.len());
    assert!(out.cells.iter().all(|c| c.classification.as_ref().unwrap().cluster().is_some()));
}

// ============================================================================
// 2. Accessibility
// ============================================================================

#[test]
fn test_single_park_at_centroid_scores_exactly_one() {
    let cells = GridGenerator::new(8).unwrap().generate(ATLANTA, 2.0).unwrap();
    assert!(cells.len() > 3);
    let target = cells[cells.len() / 2];
    let c = target.centroid();

    let pois = PoiTable::new(vec![PoiRecord::new("park", c.lat, c.lon)]);
    let mut entries = CategoryMap::new();
    entries.insert(Category::Park, CategoryConfig::new(&["park"], 1.0, 0.0));
    let table = CategoryTable::new(entries).unwrap();

    let config = ScoringConfig::default();
    let cache = LruAccessibilityCache::new(0);
    let scored = AccessibilityScorer::new(&pois, &config, &cache)
        .score_with_table(&cells, Mobility::Walking, &table, &Deadline::unbounded())
        .unwrap();

    for cell in &scored.cells {
        let park = *cell.accessibility.get(Category::Park).unwrap();
        if cell.id == target {
            assert_eq!(park, 1.0);
        } else {
            assert_eq!(park, 0.0);
        }
    }
}

#[test]
fn test_cache_shared_between_pipelines_keeps_inputs_apart() {
    let shared = Arc::new(LruAccessibilityCache::new(8));
    let a = Pipeline::new(city_pois(), city_rents()).with_cache(Arc::clone(&shared));
    let b = Pipeline::new(PoiTable::new(vec![PoiRecord::new("park", 33.749, -84.388)]), city_rents())
        .with_cache(Arc::clone(&shared));

    let first = a.run(&params()).unwrap();
    let second = b.run(&params()).unwrap();
    assert!(!first.stats.cache_hit);
    assert!(!second.stats.cache_hit);
    assert_eq!(shared.len(), 2);

    assert!(a.run(&params()).unwrap().stats.cache_hit);
}

#[test]
fn test_mobility_changes_cache_key_and_scores() {
    let pipeline = Pipeline::new(city_pois(), city_rents());
    let walk = pipeline.run(&RunParams { mobility: Mobility::Walking, ..params() }).unwrap();
    let drive = pipeline.run(&RunParams { mobility: Mobility::Vehicle, ..params() }).unwrap();
    assert!(!drive.stats.cache_hit);
    assert_ne!(
        walk.cells.iter().map(|c| c.accessibility.clone()).collect::<Vec<_>>(),
        drive.cells.iter().map(|c| c.accessibility.clone()).collect::<Vec<_>>()
    );
}

// ============================================================================
// 3. Budget
// ============================================================================

#[test]
fn test_budget_filter_keeps_first_two_of_four() {
    let origin = CellId::containing(ATLANTA, h3o::Resolution::Eight).unwrap();
    let ring: Vec<CellId> = origin.neighbors().into_iter().take(4).collect();
    let samples: Vec<RentSample> = ring
        .iter()
        .zip([800.0, 1200.0, 2000.0, 2600.0])
        .map(|(id, rent)| {
            let c = id.centroid();
            RentSample::new(c.lat, c.lon, rent)
        })
        .collect();

    let integrator = BudgetIntegrator::new(h3o::Resolution::Eight, 1).unwrap();
    let table = integrator.rent_table(&ring, &samples, &Deadline::unbounded()).unwrap();
    assert_eq!(table.direct, 4);

    let merged = BudgetIntegrator::merge(ring.iter().map(|id| HexCell::new(*id)).collect(), &table);
    let kept = BudgetIntegrator::filter_by_budget(merged.cells, 1500.0);

    assert_eq!(kept.iter().map(|c| c.id).collect::<Vec<_>>(), ring[..2].to_vec());
    assert_eq!(kept.iter().map(|c| c.avg_rent.unwrap()).collect::<Vec<_>>(), vec![800.0, 1200.0]);
}

#[test]
fn test_no_rent_data_empties_output_without_error() {
    let out = Pipeline::new(city_pois(), Vec::new()).run(&params()).unwrap();
    assert!(out.cells.is_empty());
    assert_eq!(out.stats.dropped_without_rent, out.stats.cells_scored);
}

// ============================================================================
// 4. Errors
// ============================================================================

#[test]
fn test_client_errors() {
    let pipeline = Pipeline::new(city_pois(), city_rents());

    let no_prefs = RunParams { ranks: [(Category::Park, 0)].into_iter().collect(), ..params() };
    let err = pipeline.run(&no_prefs).unwrap_err();
    assert!(matches!(err, Error::NoPreferences));
    assert!(err.is_client_error());

    let err = pipeline.run(&RunParams { radius_km: -1.0, ..params() }).unwrap_err();
    assert!(err.is_client_error());

    let err = RunParams::from_json(r#"{"ranks": {"park": "high"}}"#).unwrap_err();
    assert!(err.is_client_error());

    let tight = RunParams {
        limits: RunLimits { max_cell_poi_pairs: Some(10), timeout_ms: None },
        ..params()
    };
    assert!(matches!(pipeline.run(&tight), Err(Error::WorkLimitExceeded { .. })));
}

#[test]
fn test_internal_errors() {
    let err = "not-a-cell".parse::<CellId>().unwrap_err();
    assert!(matches!(err, Error::InvalidCell(_)));
    assert!(!err.is_client_error());

    let expired = RunParams {
        limits: RunLimits { max_cell_poi_pairs: None, timeout_ms: Some(0) },
        ..params()
    };
    match Pipeline::new(city_pois(), city_rents()).run(&expired) {
        Err(err @ Error::Timeout { .. }) => assert!(!err.is_client_error()),
        other => panic!("expected timeout, got {other:?}"),
    }
}
