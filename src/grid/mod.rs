//! Hexagonal grid generation over an approximate search disk.
//!
//! The bounding box of the disk is sampled on a fixed 50×50 lattice, each
//! sample is mapped to its H3 cell, and the deduplicated cells are kept
//! when their centroid lies within the planar radius of the center.
//!
//! The lattice density does not adapt to radius or resolution: very large
//! disks at fine resolutions are under-covered, small ones over-sampled.

use std::collections::BTreeSet;

use h3o::Resolution;
use tracing::{debug, info};

use crate::model::{BoundingBox, CellId, LatLon, planar_distance_km};
use crate::model::geo::linspace;
use crate::{Error, Result};

/// Samples per bounding-box axis.
pub const SAMPLES_PER_AXIS: usize = 50;

/// Builds the working set of cells for one run.
#[derive(Debug, Clone, Copy)]
pub struct GridGenerator {
    resolution: Resolution,
}

impl GridGenerator {
    pub fn new(resolution: u8) -> Result<Self> {
        let resolution = Resolution::try_from(resolution)
            .map_err(|e| Error::InvalidParameter(format!("grid resolution {resolution}: {e}")))?;
        Ok(Self { resolution })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Cells whose centroid is within `radius_km` (planar) of `center`.
    ///
    /// The result is sorted by cell id and free of duplicates; identical
    /// inputs always give an identical vector.
    pub fn generate(&self, center: LatLon, radius_km: f64) -> Result<Vec<CellId>> {
        let bbox = BoundingBox::around(center, radius_km);

        let mut sampled = BTreeSet::new();
        for lat in linspace(bbox.lat_min, bbox.lat_max, SAMPLES_PER_AXIS) {
            for lon in linspace(bbox.lon_min, bbox.lon_max, SAMPLES_PER_AXIS) {
                sampled.insert(CellId::containing(LatLon::new(lat, lon), self.resolution)?);
            }
        }
        debug!(
            cells = sampled.len(),
            resolution = u8::from(self.resolution),
            "sampled bounding box"
        );

        let cells: Vec<CellId> = sampled
            .into_iter()
            .filter(|cell| planar_distance_km(cell.centroid(), center) <= radius_km)
            .collect();

        info!(
            cells = cells.len(),
            radius_km,
            lat = center.lat,
            lon = center.lon,
            "generated hex grid"
        );
        Ok(cells)
    }
}
