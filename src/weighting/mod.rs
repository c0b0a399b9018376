//! # Preference Weighting
//!
//! Turns raw importance ranks into a convex weight vector, min-max
//! normalizes each weighted category over the current cell set, and
//! combines them into one match score per cell.
//!
//! Two rank normalizations:
//!
//! | method | weight |
//! |--------|--------|
//! | `linear` | `rank / Σ rank` |
//! | `exponential` | `scale ^ (max_rank − rank)`, then normalized |
//!
//! Under `exponential` rank 1 is the top priority and receives the largest
//! weight; the gap to lower priorities grows with `scale`. Terms are
//! evaluated relative to the largest one, so every power stays in `(0, 1]`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Category, CategoryMap, HexCell};
use crate::{Error, Result};

/// Rank-to-weight normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    Linear,
    #[default]
    Exponential,
}

/// Category weights in `[0, 1]` summing to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(CategoryMap<f64>);

impl WeightVector {
    pub fn get(&self, category: Category) -> Option<f64> {
        self.0.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(c, w)| (c, *w))
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }
}

/// Computes weights and match scores.
#[derive(Debug, Clone, Copy)]
pub struct PreferenceWeighter {
    method: NormalizationMethod,
    scale_factor: f64,
}

impl Default for PreferenceWeighter {
    fn default() -> Self {
        Self { method: NormalizationMethod::Exponential, scale_factor: 2.0 }
    }
}

impl PreferenceWeighter {
    pub fn new(method: NormalizationMethod, scale_factor: f64) -> Result<Self> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(Error::InvalidParameter(format!("scale_factor must be > 0, got {scale_factor}")));
        }
        Ok(Self { method, scale_factor })
    }

    /// Drop ranks <= 0 and normalize the rest.
    pub fn weights(&self, ranks: &CategoryMap<i32>) -> Result<WeightVector> {
        let selected: Vec<(Category, i32)> = ranks.iter().filter(|(_, r)| **r > 0).map(|(c, r)| (c, *r)).collect();
        if selected.is_empty() {
            return Err(Error::NoPreferences);
        }

        let weights: CategoryMap<f64> = match self.method {
            NormalizationMethod::Linear => {
                let total: f64 = selected.iter().map(|(_, r)| f64::from(*r)).sum();
                selected.iter().map(|(c, r)| (*c, f64::from(*r) / total)).collect()
            }
            NormalizationMethod::Exponential => {
                // Same ratios as scale^(max_rank - r), anchored at the largest term.
                let anchor = if self.scale_factor >= 1.0 {
                    selected.iter().map(|(_, r)| *r).min()
                } else {
                    selected.iter().map(|(_, r)| *r).max()
                }
                .unwrap_or(0);
                let raw: Vec<(Category, f64)> = selected
                    .iter()
                    .map(|(c, r)| (*c, self.scale_factor.powf(f64::from(anchor - r))))
                    .collect();
                let total: f64 = raw.iter().map(|(_, w)| w).sum();
                raw.into_iter().map(|(c, w)| (c, w / total)).collect()
            }
        };

        debug!(method = ?self.method, ?weights, "normalized preference weights");
        Ok(WeightVector(weights))
    }

    /// Fill `normalized` and `match_score` on every cell.
    ///
    /// Normalization is relative to `cells` only. A weighted category
    /// missing from any cell's accessibility scores is a validation error.
    pub fn apply(&self, cells: &mut [HexCell], weights: &WeightVector) -> Result<()> {
        for category in weights.categories() {
            if cells.iter().any(|c| !c.accessibility.contains(category)) {
                return Err(Error::MissingCategory(category));
            }
        }

        for category in weights.categories() {
            let raw: Vec<f64> = cells
                .iter()
                .filter_map(|c| c.accessibility.get(category).copied())
                .collect();
            for (cell, norm) in cells.iter_mut().zip(min_max_normalize(&raw)) {
                cell.normalized.insert(category, norm);
            }
        }

        for cell in cells.iter_mut() {
            let mut score = 0.0;
            for (category, weight) in weights.iter() {
                if let Some(norm) = cell.normalized.get(category) {
                    score += norm * weight;
                }
            }
            cell.match_score = Some(score);
        }

        if let (Some(lo), Some(hi)) = (
            cells.iter().filter_map(|c| c.match_score).reduce(f64::min),
            cells.iter().filter_map(|c| c.match_score).reduce(f64::max),
        ) {
            info!(cells = cells.len(), min = lo, max = hi, "computed match scores");
        }
        Ok(())
    }
}

/// Scale `values` to `[0, 1]` as `x × s − min × s` with `s = 1 / (max − min)`.
///
/// A constant column maps to all zeros.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f64::max);
    let range = max - min;
    let scale = if range == 0.0 { 1.0 } else { 1.0 / range };
    let offset = 0.0 - min * scale;
    values.iter().map(|x| x * scale + offset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellId, LatLon};
    use h3o::Resolution;
    use pretty_assertions::assert_eq;

    fn ranks(pairs: &[(Category, i32)]) -> CategoryMap<i32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_linear_weights() {
        let w = PreferenceWeighter::new(NormalizationMethod::Linear, 2.0)
            .unwrap()
            .weights(&ranks(&[(Category::Park, 1), (Category::School, 3), (Category::Hospital, 0)]))
            .unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.get(Category::Park), Some(0.25));
        assert_eq!(w.get(Category::School), Some(0.75));
        assert_eq!(w.get(Category::Hospital), None);
    }

    #[test]
    fn test_exponential_weights() {
        let w = PreferenceWeighter::default()
            .weights(&ranks(&[(Category::Park, 1), (Category::School, 3)]))
            .unwrap();
        // 2^(3-1) = 4 and 2^0 = 1
        assert_eq!(w.get(Category::Park), Some(0.8));
        assert_eq!(w.get(Category::School), Some(0.2));
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_weights_stay_finite_at_extremes() {
        let cases = [
            (1e200, ranks(&[(Category::Park, 1), (Category::School, 3)]), Category::Park),
            (2.0, ranks(&[(Category::Park, 1), (Category::School, 5000)]), Category::Park),
            (1e-200, ranks(&[(Category::Park, 1), (Category::School, 3)]), Category::School),
        ];
        for (scale, ranks, dominant) in cases {
            let w = PreferenceWeighter::new(NormalizationMethod::Exponential, scale).unwrap().weights(&ranks).unwrap();
            assert!(w.iter().all(|(_, x)| x.is_finite() && (0.0..=1.0).contains(&x)), "scale {scale}: {w:?}");
            assert!((w.sum() - 1.0).abs() < 1e-6);
            assert_eq!(w.get(dominant), Some(1.0));
        }
    }

    #[test]
    fn test_non_positive_ranks_rejected() {
        let weighter = PreferenceWeighter::default();
        let err = weighter.weights(&ranks(&[(Category::Park, 0), (Category::School, -2)])).unwrap_err();
        assert!(matches!(err, Error::NoPreferences));
        assert!(err.is_client_error());
        assert!(weighter.weights(&CategoryMap::new()).is_err());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max_normalize(&[2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(min_max_normalize(&[-3.0, -1.0]), vec![0.0, 1.0]);
        assert_eq!(min_max_normalize(&[5.0, 5.0]), vec![0.0, 0.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    fn cells() -> Vec<HexCell> {
        let origin = CellId::containing(LatLon::new(33.749, -84.388), Resolution::Eight).unwrap();
        origin
            .neighbors()
            .into_iter()
            .take(3)
            .zip([(0.0, 10.0), (1.0, 5.0), (2.0, 0.0)])
            .map(|(id, (park, school))| {
                HexCell::new(id)
                    .with_accessibility(Category::Park, park)
                    .with_accessibility(Category::School, school)
            })
            .collect()
    }

    #[test]
    fn test_apply_scores_cells() {
        let mut cells = cells();
        let weighter = PreferenceWeighter::new(NormalizationMethod::Linear, 2.0).unwrap();
        let w = weighter.weights(&ranks(&[(Category::Park, 3), (Category::School, 1)])).unwrap();
        weighter.apply(&mut cells, &w).unwrap();

        let scores: Vec<f64> = cells.iter().map(|c| c.match_score.unwrap()).collect();
        assert!((scores[0] - 0.25).abs() < 1e-12);
        assert!((scores[1] - 0.5).abs() < 1e-12);
        assert!((scores[2] - 0.75).abs() < 1e-12);
        assert_eq!(cells[2].normalized.get(Category::Park), Some(&1.0));
    }

    #[test]
    fn test_missing_category_is_validation_error() {
        let mut cells = cells();
        let weighter = PreferenceWeighter::default();
        let w = weighter.weights(&ranks(&[(Category::Hospital, 1)])).unwrap();
        let err = weighter.apply(&mut cells, &w).unwrap_err();
        assert!(matches!(err, Error::MissingCategory(Category::Hospital)));
        assert!(err.is_client_error());
    }
}
