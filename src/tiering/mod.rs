//! # Tiering
//!
//! Ordinal suitability tiers from match-score quantiles. For `n` tiers the
//! thresholds are the score quantiles at `1 − i/n` for `i = 1..n`, which
//! are non-increasing; a cell takes the index of the first threshold its
//! score reaches, else `n − 1`. Tier 0 is the best.
//!
//! Density clustering lives in [`dbscan`]; its ids carry no rank.

pub mod dbscan;

use tracing::info;

use crate::model::{Classification, HexCell};
use crate::{Error, Result};

pub use dbscan::{ClusterSummary, Dbscan};

/// Labels used when exactly three tiers are requested.
pub const THREE_TIER_LABELS: [&str; 3] = ["Most Suitable", "Okay", "Less Suitable"];

/// Linear-interpolated quantile of sorted data, `p` in `[0, 1]`.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let t = h - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    let diff = b - a;
    // Interpolate from the nearer end to keep endpoints exact.
    Some(if t >= 0.5 { b - diff * (1.0 - t) } else { a + diff * t })
}

/// Index of the first threshold `score` reaches, else `thresholds.len()`.
pub fn classify(score: f64, thresholds: &[f64]) -> usize {
    thresholds.iter().position(|t| score >= *t).unwrap_or(thresholds.len())
}

pub fn tier_label(index: usize, n_tiers: usize) -> String {
    if n_tiers == THREE_TIER_LABELS.len() {
        THREE_TIER_LABELS[index].to_string()
    } else {
        format!("Tier {}", index + 1)
    }
}

/// Quantile tiering over match scores.
#[derive(Debug, Clone, Copy)]
pub struct QuantileTiering {
    n_tiers: usize,
}

impl QuantileTiering {
    pub fn new(n_tiers: usize) -> Result<Self> {
        if n_tiers == 0 {
            return Err(Error::InvalidParameter("n_tiers must be >= 1".into()));
        }
        Ok(Self { n_tiers })
    }

    /// Thresholds for the given scores, best tier first.
    pub fn thresholds(&self, scores: &[f64]) -> Vec<f64> {
        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);
        (1..self.n_tiers)
            .filter_map(|i| quantile(&sorted, 1.0 - i as f64 / self.n_tiers as f64))
            .collect()
    }

    /// Classify every cell; returns the thresholds used.
    pub fn assign(&self, cells: &mut [HexCell]) -> Vec<f64> {
        let scores: Vec<f64> = cells.iter().map(|c| c.match_score.unwrap_or(0.0)).collect();
        let thresholds = self.thresholds(&scores);

        let mut counts = vec![0usize; self.n_tiers];
        for (cell, score) in cells.iter_mut().zip(&scores) {
            let index = classify(*score, &thresholds);
            counts[index] += 1;
            cell.classification = Some(Classification::Tier {
                index,
                label: tier_label(index, self.n_tiers),
            });
        }

        info!(n_tiers = self.n_tiers, ?thresholds, ?counts, "classified cells into tiers");
        thresholds
    }
}
