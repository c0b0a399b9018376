//! # Accessibility Scoring
//!
//! Per cell and per category, sums an inverse power-law contribution for
//! every matching POI within the category's reach:
//!
//! ```text
//! contribution = 1 / (1 + d_km) ^ decay_rate        (d_km <= max_distance_km)
//!              = 0                                  (otherwise)
//! ```
//!
//! `d_km` is the planar approximation from [`crate::model::geo`]. Inverted
//! categories subtract their contributions.
//!
//! Each cell's row depends only on the immutable POI table, so rows are
//! independent of iteration order.

pub mod cache;

use tracing::{debug, info};

use crate::config::{CategoryConfig, CategoryTable, Deadline, Mobility, ScoringConfig};
use crate::model::{CellId, HexCell, LatLon, PoiTable, planar_distance_km};
use crate::Result;

pub use cache::{AccessibilityCache, CacheKey, LruAccessibilityCache};

/// Contribution of one POI at `distance_km`.
pub fn distance_decay(distance_km: f64, decay_rate: f64) -> f64 {
    1.0 / (1.0 + distance_km).powf(decay_rate)
}

/// Score of one category at `center` over the given POI positions.
pub fn category_score<I>(center: LatLon, positions: I, config: &CategoryConfig) -> f64
where
    I: IntoIterator<Item = LatLon>,
{
    let mut score = 0.0;
    for poi in positions {
        let distance_km = planar_distance_km(center, poi);
        if distance_km <= config.max_distance_km {
            let contribution = distance_decay(distance_km, config.decay_rate);
            if config.invert {
                score -= contribution;
            } else {
                score += contribution;
            }
        }
    }
    score
}

/// Result of one scoring call.
#[derive(Debug, Clone)]
pub struct ScoredCells {
    pub cells: Vec<HexCell>,
    pub cache_hit: bool,
}

/// Scores cell sets against a POI table, consulting an injected cache.
pub struct AccessibilityScorer<'a, C: AccessibilityCache + ?Sized> {
    pois: &'a PoiTable,
    config: &'a ScoringConfig,
    cache: &'a C,
}

impl<'a, C: AccessibilityCache + ?Sized> AccessibilityScorer<'a, C> {
    pub fn new(pois: &'a PoiTable, config: &'a ScoringConfig, cache: &'a C) -> Self {
        Self { pois, config, cache }
    }

    /// Score `cells` with the built-in table for `mobility`.
    pub fn score(&self, cells: &[CellId], mobility: Mobility, deadline: &Deadline) -> Result<ScoredCells> {
        self.score_with_table(cells, mobility, self.config.for_mobility(mobility), deadline)
    }

    /// Score `cells` with an explicit table.
    ///
    /// Output rows follow the order of `cells`. A cached table is reordered
    /// to match, so the caller sees the same rows whatever order it asked in.
    pub fn score_with_table(
        &self,
        cells: &[CellId],
        mobility: Mobility,
        table: &CategoryTable,
        deadline: &Deadline,
    ) -> Result<ScoredCells> {
        let key = CacheKey::new(cells, mobility, table.fingerprint(), self.pois.fingerprint());

        if let Some(cached) = self.cache.get(&key) {
            info!(cells = cells.len(), ?mobility, "using cached accessibility scores");
            return Ok(ScoredCells { cells: reorder(cached, cells), cache_hit: true });
        }

        // Resolve each category's POI subset once, not once per cell.
        let subsets: Vec<(crate::model::Category, &CategoryConfig, Vec<LatLon>)> = table
            .iter()
            .map(|(category, config)| (category, config, self.pois.positions_of(&config.poi_types).collect()))
            .collect();

        info!(cells = cells.len(), categories = subsets.len(), ?mobility, "calculating accessibility scores");

        let mut scored = Vec::with_capacity(cells.len());
        for (i, &id) in cells.iter().enumerate() {
            deadline.check()?;
            if i % 250 == 0 {
                debug!(done = i, total = cells.len(), "scoring cells");
            }
            let mut cell = HexCell::new(id);
            for (category, config, positions) in &subsets {
                let score = category_score(cell.centroid, positions.iter().copied(), config);
                cell.accessibility.insert(*category, score);
            }
            scored.push(cell);
        }

        self.cache.insert(key, scored.clone());
        Ok(ScoredCells { cells: scored, cache_hit: false })
    }
}

/// Order cached rows like `cells`. Cached tables hold exactly the key's
/// cell set, so every id is found.
fn reorder(cached: Vec<HexCell>, cells: &[CellId]) -> Vec<HexCell> {
    let mut by_id: hashbrown::HashMap<CellId, HexCell> = cached.into_iter().map(|c| (c.id, c)).collect();
    cells.iter().filter_map(|id| by_id.remove(id)).collect()
}
