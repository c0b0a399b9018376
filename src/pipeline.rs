//! # Pipeline
//!
//! End-to-end orchestration of one scoring run:
//!
//! ```text
//! RunParams ─ validate ─ weights
//!   → GridGenerator → AccessibilityScorer (cache) → BudgetIntegrator (rent join)
//!   → SpatialSmoother → budget filter → PreferenceWeighter → tiers | clusters
//! ```
//!
//! Everything a run needs is validated before the grid is generated. The
//! work bound is checked before scoring; the deadline between stages and
//! inside the per-cell loops.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::budget::BudgetIntegrator;
use crate::config::{Deadline, Grouping, RunParams, ScoringConfig};
use crate::grid::GridGenerator;
use crate::model::{HexCell, PoiTable, RentSample};
use crate::scoring::cache::DEFAULT_CACHE_CAPACITY;
use crate::scoring::{AccessibilityCache, AccessibilityScorer, LruAccessibilityCache};
use crate::smoothing::SpatialSmoother;
use crate::tiering::{ClusterSummary, QuantileTiering, dbscan};
use crate::weighting::{PreferenceWeighter, WeightVector};
use crate::{Error, Result};

/// Counters collected along one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub cells_generated: usize,
    pub cells_scored: usize,
    pub cache_hit: bool,
    pub rent_direct: usize,
    pub rent_imputed: usize,
    pub dropped_without_rent: usize,
    pub over_budget: usize,
    pub cells_returned: usize,
    pub rent_samples_skipped: usize,
    pub elapsed_ms: u64,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Surviving cells, sorted by cell id, fully enriched.
    pub cells: Vec<HexCell>,
    pub weights: WeightVector,
    /// Tier thresholds, best first. Empty for clustering runs.
    pub thresholds: Vec<f64>,
    /// Cluster summaries, noise first. Empty for tier runs.
    pub clusters: Vec<ClusterSummary>,
    pub stats: RunStats,
}

/// Owns the reference inputs and the accessibility cache.
///
/// One `Pipeline` serves many runs; only the cache changes between them.
pub struct Pipeline<C: AccessibilityCache = LruAccessibilityCache> {
    pois: PoiTable,
    rents: Vec<RentSample>,
    scoring: ScoringConfig,
    cache: C,
}

impl Pipeline {
    /// Built-in category tables and a default-sized LRU cache.
    pub fn new(pois: PoiTable, rents: Vec<RentSample>) -> Self {
        Self {
            pois,
            rents,
            scoring: ScoringConfig::default(),
            cache: LruAccessibilityCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }
}

impl<C: AccessibilityCache> Pipeline<C> {
    /// Swap in another cache implementation.
    pub fn with_cache<D: AccessibilityCache>(self, cache: D) -> Pipeline<D> {
        Pipeline { pois: self.pois, rents: self.rents, scoring: self.scoring, cache }
    }

    pub fn with_scoring_config(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn pois(&self) -> &PoiTable {
        &self.pois
    }

    pub fn rents(&self) -> &[RentSample] {
        &self.rents
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Execute one run.
    ///
    /// Client-input failures ([`Error::is_client_error`]) are raised before
    /// any cell is scored. An empty working set after the budget filter is
    /// not an error: the output simply has no cells.
    pub fn run(&self, params: &RunParams) -> Result<RunOutput> {
        params.validate()?;
        let deadline = Deadline::start(params.limits.timeout());
        let mut stats = RunStats::default();

        // Phase 1: preferences
        let weighter = PreferenceWeighter::new(params.normalization, params.scale_factor)?;
        let weights = weighter.weights(&params.ranks)?;
        let table = self.scoring.for_mobility(params.mobility);
        if let Some(missing) = weights.categories().find(|c| !table.contains(*c)) {
            return Err(Error::MissingCategory(missing));
        }

        // Phase 2: grid
        let grid = GridGenerator::new(params.resolution)?;
        let cells = grid.generate(params.center, params.radius_km)?;
        stats.cells_generated = cells.len();
        params.limits.check_work(cells.len(), self.pois.len())?;

        // Phase 3: accessibility
        let scorer = AccessibilityScorer::new(&self.pois, &self.scoring, &self.cache);
        let scored = scorer.score(&cells, params.mobility, &deadline)?;
        stats.cells_scored = scored.cells.len();
        stats.cache_hit = scored.cache_hit;

        // Phase 4: rent
        deadline.check()?;
        let integrator = BudgetIntegrator::new(grid.resolution(), params.rent_neighbors)?;
        let rents = integrator.rent_table(&cells, &self.rents, &deadline)?;
        stats.rent_direct = rents.direct;
        stats.rent_imputed = rents.imputed;
        stats.rent_samples_skipped = rents.skipped_samples;
        let merged = BudgetIntegrator::merge(scored.cells, &rents);
        stats.dropped_without_rent = merged.dropped;

        // Phase 5: smoothing
        deadline.check()?;
        let smoothed = SpatialSmoother::new(params.neighbor_weight)?.smooth(&merged.cells, &deadline)?;

        // Phase 6: budget
        let before = smoothed.len();
        let mut working = BudgetIntegrator::filter_by_budget(smoothed, params.max_budget);
        stats.over_budget = before - working.len();

        // Phase 7: match score
        deadline.check()?;
        if working.is_empty() {
            warn!(max_budget = params.max_budget, "no cells left after budget filter");
        } else {
            weighter.apply(&mut working, &weights)?;
        }

        // Phase 8: grouping
        deadline.check()?;
        let (thresholds, clusters) = match params.grouping {
            Grouping::Tiers { n_tiers } => (QuantileTiering::new(n_tiers)?.assign(&mut working), Vec::new()),
            Grouping::ScoreClusters { eps, min_samples } => {
                (Vec::new(), dbscan::cluster_by_score(&mut working, eps, min_samples))
            }
            Grouping::SpatialClusters { eps, min_samples, spatial_weight } => {
                (Vec::new(), dbscan::cluster_spatially(&mut working, eps, min_samples, spatial_weight))
            }
        };

        deadline.check()?;
        stats.cells_returned = working.len();
        stats.elapsed_ms = deadline.elapsed().as_millis() as u64;
        info!(?stats, "run complete");

        Ok(RunOutput { cells: working, weights, thresholds, clusters, stats })
    }
}
