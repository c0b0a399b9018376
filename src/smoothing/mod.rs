//! Spatial smoothing across ring-1 grid neighbors.
//!
//! ```text
//! smoothed = (1 - w) × own + w × mean(present neighbors)
//! ```
//!
//! Neighbor values always come from the input snapshot, never from rows
//! already smoothed in the same pass. A cell with no neighbor present in
//! the input is returned unchanged.

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::config::Deadline;
use crate::model::{Category, CellId, HexCell};
use crate::{Error, Result};

/// Blends each cell's accessibility scores with its neighbors'.
#[derive(Debug, Clone)]
pub struct SpatialSmoother {
    neighbor_weight: f64,
    /// `None` smooths every accessibility column a cell has.
    columns: Option<Vec<Category>>,
}

impl SpatialSmoother {
    pub fn new(neighbor_weight: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&neighbor_weight) {
            return Err(Error::InvalidParameter(format!(
                "neighbor_weight must be in [0, 1], got {neighbor_weight}"
            )));
        }
        Ok(Self { neighbor_weight, columns: None })
    }

    /// Restrict smoothing to the given categories.
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = Category>) -> Self {
        self.columns = Some(columns.into_iter().collect());
        self
    }

    pub fn neighbor_weight(&self) -> f64 {
        self.neighbor_weight
    }

    pub fn smooth(&self, cells: &[HexCell], deadline: &Deadline) -> Result<Vec<HexCell>> {
        let index: HashMap<CellId, usize> = cells.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
        let w = self.neighbor_weight;

        info!(cells = cells.len(), neighbor_weight = w, "applying spatial smoothing");

        let mut smoothed = Vec::with_capacity(cells.len());
        let mut isolated = 0usize;
        for cell in cells {
            deadline.check()?;

            let neighbors: Vec<&HexCell> = cell
                .id
                .neighbors()
                .into_iter()
                .filter_map(|n| index.get(&n).map(|&i| &cells[i]))
                .collect();

            let mut out = cell.clone();
            if neighbors.is_empty() {
                isolated += 1;
                smoothed.push(out);
                continue;
            }

            let columns: Vec<Category> = match &self.columns {
                Some(cols) => cols.clone(),
                None => cell.accessibility.keys().collect(),
            };
            for category in columns {
                let Some(&own) = cell.accessibility.get(category) else { continue };
                let values: Vec<f64> = neighbors
                    .iter()
                    .filter_map(|n| n.accessibility.get(category).copied())
                    .collect();
                if values.is_empty() {
                    continue;
                }
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                out.accessibility.insert(category, (1.0 - w) * own + w * mean);
            }
            smoothed.push(out);
        }

        debug!(isolated, "cells without present neighbors left unchanged");
        Ok(smoothed)
    }
}
