//! # Rent Integration
//!
//! 1. Aggregate point rent samples to cells (mean per cell).
//! 2. Impute rent for grid cells without a sample: median rent of the K
//!    known cells nearest in hop count on the hexagonal grid.
//! 3. Inner-join rents onto the scored cells. Cells that end up without a
//!    rent are dropped with a warning.
//! 4. Keep only cells with `rent <= max_budget`.
//!
//! Surviving cells keep their rent value untouched by the filter.

use std::collections::BTreeMap;

use h3o::Resolution;
use tracing::{debug, info, warn};

use crate::config::Deadline;
use crate::model::{CellId, HexCell, RentSample};
use crate::{Error, Result};

/// Cell-level rents for the working grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RentTable {
    pub rents: BTreeMap<CellId, f64>,
    /// Grid cells covered by at least one sample.
    pub direct: usize,
    /// Grid cells filled in by nearest-neighbor imputation.
    pub imputed: usize,
    /// Samples ignored because a field was missing.
    pub skipped_samples: usize,
}

/// Outcome of joining rents onto scored cells.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub cells: Vec<HexCell>,
    /// Scored cells that had no rent after imputation.
    pub dropped: usize,
}

/// Aggregates, imputes, merges and filters rents.
#[derive(Debug, Clone, Copy)]
pub struct BudgetIntegrator {
    resolution: Resolution,
    neighbors: usize,
}

impl BudgetIntegrator {
    /// `neighbors` is K in the K-nearest median imputation.
    pub fn new(resolution: Resolution, neighbors: usize) -> Result<Self> {
        if neighbors == 0 {
            return Err(Error::InvalidParameter("rent imputation needs K >= 1".into()));
        }
        Ok(Self { resolution, neighbors })
    }

    /// Mean rent per cell over all usable samples.
    pub fn aggregate(&self, samples: &[RentSample]) -> Result<(BTreeMap<CellId, f64>, usize)> {
        let mut sums: BTreeMap<CellId, (f64, usize)> = BTreeMap::new();
        let mut skipped = 0;
        for sample in samples {
            if !sample.is_usable() {
                skipped += 1;
                continue;
            }
            let cell = CellId::containing(sample.position(), self.resolution)?;
            let entry = sums.entry(cell).or_insert((0.0, 0));
            entry.0 += sample.avg_rent_est;
            entry.1 += 1;
        }
        if skipped > 0 {
            debug!(skipped, "ignored rent samples with missing fields");
        }
        let means = sums.into_iter().map(|(cell, (sum, n))| (cell, sum / n as f64)).collect();
        Ok((means, skipped))
    }

    /// Median rent of the K known cells nearest to `target` by grid hops.
    ///
    /// Known cells H3 cannot measure a hop count to are skipped. Ties in
    /// distance are broken by cell id. Returns `None` when nothing is
    /// reachable.
    pub fn impute(&self, target: CellId, known: &BTreeMap<CellId, f64>) -> Option<f64> {
        let mut by_distance: Vec<(u32, f64)> = known
            .iter()
            .filter_map(|(cell, rent)| target.grid_distance(*cell).map(|d| (d, *rent)))
            .collect();
        // Stable: equal distances keep cell-id order from the BTreeMap.
        by_distance.sort_by_key(|(d, _)| *d);

        let mut nearest: Vec<f64> = by_distance.into_iter().take(self.neighbors).map(|(_, r)| r).collect();
        median(&mut nearest)
    }

    /// Rent for every grid cell: direct mean where sampled, imputed elsewhere.
    ///
    /// The deadline is checked once per grid cell.
    pub fn rent_table(&self, grid: &[CellId], samples: &[RentSample], deadline: &Deadline) -> Result<RentTable> {
        let (known, skipped_samples) = self.aggregate(samples)?;
        let mut table = RentTable { skipped_samples, ..RentTable::default() };

        for &cell in grid {
            deadline.check()?;
            if let Some(rent) = known.get(&cell) {
                table.rents.insert(cell, *rent);
                table.direct += 1;
            } else if let Some(rent) = self.impute(cell, &known) {
                table.rents.insert(cell, rent);
                table.imputed += 1;
            }
        }

        info!(
            grid = grid.len(),
            known_cells = known.len(),
            direct = table.direct,
            imputed = table.imputed,
            "built cell rent table"
        );
        Ok(table)
    }

    /// Inner join of rents onto scored cells.
    pub fn merge(cells: Vec<HexCell>, rents: &RentTable) -> MergeOutcome {
        let before = cells.len();
        let merged: Vec<HexCell> = cells
            .into_iter()
            .filter_map(|cell| rents.rents.get(&cell.id).map(|rent| cell.with_rent(*rent)))
            .collect();
        let dropped = before - merged.len();

        if dropped > 0 {
            warn!(dropped, kept = merged.len(), "rent merge dropped cells without rent coverage");
        } else {
            debug!(cells = merged.len(), "every scored cell has rent data");
        }
        MergeOutcome { cells: merged, dropped }
    }

    /// Keep cells with `avg_rent <= max_budget`. Cells without rent are removed.
    pub fn filter_by_budget(cells: Vec<HexCell>, max_budget: f64) -> Vec<HexCell> {
        let before = cells.len();
        let kept: Vec<HexCell> = cells
            .into_iter()
            .filter(|cell| cell.avg_rent.is_some_and(|rent| rent <= max_budget))
            .collect();
        info!(before, after = kept.len(), max_budget, "filtered cells by budget");
        kept
    }
}

/// Median, averaging the middle pair for even lengths. Sorts in place.
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
