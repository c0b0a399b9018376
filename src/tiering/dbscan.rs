//! Density-based clustering (DBSCAN) for exploratory grouping.
//!
//! Two feature spaces:
//! - score only: the match score, min-max scaled to `[0, 1]`;
//! - score + space: (score, lat, lon) standardized to zero mean and unit
//!   population variance, then score scaled by `1 − spatial_weight` and
//!   the coordinates by `spatial_weight`.
//!
//! Cluster ids are assigned in order of discovery and say nothing about
//! quality. Points that are neither core nor reachable from a core point
//! are [`ClusterLabel::Noise`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Classification, ClusterLabel, HexCell, KM_PER_DEGREE};
use crate::weighting::min_max_normalize;

pub const NOISE_LABEL: &str = "Noise/Uncertain";

/// Classic DBSCAN with Euclidean distance.
///
/// `min_samples` counts the point itself; neighborhoods are inclusive of
/// `eps`.
#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    pub eps: f64,
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn fit<const D: usize>(&self, points: &[[f64; D]]) -> Vec<ClusterLabel> {
        let n = points.len();
        let neighborhoods: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| euclidean(&points[i], &points[j]) <= self.eps)
                    .collect()
            })
            .collect();
        let is_core: Vec<bool> = neighborhoods.iter().map(|nb| nb.len() >= self.min_samples).collect();

        let mut labels: Vec<Option<u32>> = vec![None; n];
        let mut next_id = 0u32;
        let mut stack = Vec::new();

        for start in 0..n {
            if labels[start].is_some() || !is_core[start] {
                continue;
            }
            let mut i = start;
            loop {
                if labels[i].is_none() {
                    labels[i] = Some(next_id);
                    if is_core[i] {
                        stack.extend(neighborhoods[i].iter().copied().filter(|&v| labels[v].is_none()));
                    }
                }
                match stack.pop() {
                    Some(v) => i = v,
                    None => break,
                }
            }
            next_id += 1;
        }

        labels
            .into_iter()
            .map(|l| l.map_or(ClusterLabel::Noise, ClusterLabel::Cluster))
            .collect()
    }
}

fn euclidean<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

// ============================================================================
// Cell clustering
// ============================================================================

/// Per-cluster statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub label: ClusterLabel,
    pub name: String,
    pub count: usize,
    pub avg_score: f64,
    /// Planar diagonal of the member bounding box (spatial mode only, 0 for noise).
    pub spatial_extent_km: Option<f64>,
}

/// Cluster on the match score alone.
pub fn cluster_by_score(cells: &mut [HexCell], eps: f64, min_samples: usize) -> Vec<ClusterSummary> {
    let scores: Vec<f64> = cells.iter().map(score_of).collect();
    let points: Vec<[f64; 1]> = min_max_normalize(&scores).into_iter().map(|s| [s]).collect();
    let labels = Dbscan::new(eps, min_samples).fit(&points);
    label_cells(cells, &labels, "Cluster", false)
}

/// Cluster on score and centroid position jointly.
pub fn cluster_spatially(
    cells: &mut [HexCell],
    eps: f64,
    min_samples: usize,
    spatial_weight: f64,
) -> Vec<ClusterSummary> {
    let score = standardize(&cells.iter().map(score_of).collect::<Vec<_>>());
    let lat = standardize(&cells.iter().map(|c| c.centroid.lat).collect::<Vec<_>>());
    let lon = standardize(&cells.iter().map(|c| c.centroid.lon).collect::<Vec<_>>());

    let points: Vec<[f64; 3]> = (0..cells.len())
        .map(|i| {
            [
                score[i] * (1.0 - spatial_weight),
                lat[i] * spatial_weight,
                lon[i] * spatial_weight,
            ]
        })
        .collect();
    let labels = Dbscan::new(eps, min_samples).fit(&points);
    label_cells(cells, &labels, "Region", true)
}

fn score_of(cell: &HexCell) -> f64 {
    cell.match_score.unwrap_or(0.0)
}

/// Zero mean, unit population variance; a constant column only gets centered.
fn standardize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = if var == 0.0 { 1.0 } else { var.sqrt() };
    values.iter().map(|v| (v - mean) / std).collect()
}

fn label_cells(cells: &mut [HexCell], labels: &[ClusterLabel], prefix: &str, spatial: bool) -> Vec<ClusterSummary> {
    let name_of = |label: ClusterLabel| match label {
        ClusterLabel::Noise => NOISE_LABEL.to_string(),
        ClusterLabel::Cluster(id) => format!("{prefix} {id}"),
    };

    let mut members: BTreeMap<ClusterLabel, Vec<usize>> = BTreeMap::new();
    for (i, (cell, label)) in cells.iter_mut().zip(labels).enumerate() {
        cell.classification = Some(Classification::Cluster { label: *label, name: name_of(*label) });
        members.entry(*label).or_default().push(i);
    }

    let summaries: Vec<ClusterSummary> = members
        .into_iter()
        .map(|(label, idx)| {
            let avg_score = idx.iter().map(|&i| score_of(&cells[i])).sum::<f64>() / idx.len() as f64;
            let spatial_extent_km = spatial.then(|| match label {
                ClusterLabel::Noise => 0.0,
                ClusterLabel::Cluster(_) => extent_km(idx.iter().map(|&i| &cells[i])),
            });
            ClusterSummary { label, name: name_of(label), count: idx.len(), avg_score, spatial_extent_km }
        })
        .collect();

    let noise = summaries.iter().find(|s| s.label == ClusterLabel::Noise).map_or(0, |s| s.count);
    info!(
        clusters = summaries.len() - usize::from(noise > 0),
        noise,
        spatial,
        "density clustering complete"
    );
    summaries
}

fn extent_km<'a>(cells: impl Iterator<Item = &'a HexCell>) -> f64 {
    let (mut lat_lo, mut lat_hi, mut lon_lo, mut lon_hi) =
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for c in cells {
        lat_lo = lat_lo.min(c.centroid.lat);
        lat_hi = lat_hi.max(c.centroid.lat);
        lon_lo = lon_lo.min(c.centroid.lon);
        lon_hi = lon_hi.max(c.centroid.lon);
    }
    let (dlat, dlon) = (lat_hi - lat_lo, lon_hi - lon_lo);
    (dlat * dlat + dlon * dlon).sqrt() * KM_PER_DEGREE
}
