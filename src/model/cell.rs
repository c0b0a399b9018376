//! Hexagonal grid cells and the per-cell record enriched by each stage.

use std::fmt;
use std::str::FromStr;

use h3o::{CellIndex, LatLng, Resolution};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{CategoryMap, LatLon};
use crate::{Error, Result};

// ============================================================================
// CellId
// ============================================================================

/// Opaque hexagonal cell identifier (an H3 index).
///
/// Ordering follows the numeric index, which matches the lexical order of
/// the canonical hex string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(CellIndex);

impl CellId {
    /// The cell containing `point` at `resolution`.
    pub fn containing(point: LatLon, resolution: Resolution) -> Result<Self> {
        let ll = LatLng::new(point.lat, point.lon)
            .map_err(|e| Error::InvalidParameter(format!("coordinate ({}, {}): {e}", point.lat, point.lon)))?;
        Ok(Self(ll.to_cell(resolution)))
    }

    pub fn index(self) -> CellIndex {
        self.0
    }

    pub fn resolution(self) -> Resolution {
        self.0.resolution()
    }

    pub fn centroid(self) -> LatLon {
        let ll = LatLng::from(self.0);
        LatLon::new(ll.lat(), ll.lng())
    }

    /// Ring-1 neighbors, excluding the cell itself (five for pentagons).
    pub fn neighbors(self) -> SmallVec<[CellId; 6]> {
        self.0
            .grid_disk::<Vec<_>>(1)
            .into_iter()
            .filter(|c| *c != self.0)
            .map(CellId)
            .collect()
    }

    /// Hop count along hexagonal adjacency, or `None` when H3 cannot
    /// compute one (different resolutions, pentagon distortion, too far).
    pub fn grid_distance(self, other: CellId) -> Option<u32> {
        self.0
            .grid_distance(other.0)
            .ok()
            .and_then(|d| u32::try_from(d).ok())
    }
}

impl From<CellIndex> for CellId {
    fn from(index: CellIndex) -> Self {
        Self(index)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<CellIndex>()
            .map(CellId)
            .map_err(|e| Error::InvalidCell(format!("'{s}': {e}")))
    }
}

impl Serialize for CellId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Density-cluster membership. Carries no rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLabel {
    /// Did not meet the density criteria.
    Noise,
    Cluster(u32),
}

/// Final bucket attached to a cell: an ordinal tier or a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// Tier 0 is the best.
    Tier { index: usize, label: String },
    Cluster { label: ClusterLabel, name: String },
}

impl Classification {
    pub fn tier(&self) -> Option<usize> {
        match self {
            Classification::Tier { index, .. } => Some(*index),
            Classification::Cluster { .. } => None,
        }
    }

    pub fn cluster(&self) -> Option<ClusterLabel> {
        match self {
            Classification::Cluster { label, .. } => Some(*label),
            Classification::Tier { .. } => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Classification::Tier { label, .. } => label,
            Classification::Cluster { name, .. } => name,
        }
    }
}

// ============================================================================
// HexCell
// ============================================================================

/// One analysis unit. Created with only `id` and `centroid`; each stage
/// fills in its own fields. The same type is the pipeline's output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexCell {
    #[serde(rename = "cell_id")]
    pub id: CellId,
    #[serde(flatten)]
    pub centroid: LatLon,
    /// Raw distance-decay score per configured category.
    pub accessibility: CategoryMap<f64>,
    /// Min-max normalized score per weighted category.
    pub normalized: CategoryMap<f64>,
    pub avg_rent: Option<f64>,
    pub match_score: Option<f64>,
    pub classification: Option<Classification>,
}

impl HexCell {
    pub fn new(id: CellId) -> Self {
        Self {
            id,
            centroid: id.centroid(),
            accessibility: CategoryMap::new(),
            normalized: CategoryMap::new(),
            avg_rent: None,
            match_score: None,
            classification: None,
        }
    }

    pub fn with_accessibility(mut self, category: super::Category, score: f64) -> Self {
        self.accessibility.insert(category, score);
        self
    }

    pub fn with_rent(mut self, rent: f64) -> Self {
        self.avg_rent = Some(rent);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlanta() -> CellId {
        CellId::containing(LatLon::new(33.749, -84.388), Resolution::Eight).unwrap()
    }

    #[test]
    fn test_cell_string_round_trip() {
        let cell = atlanta();
        let s = cell.to_string();
        assert_eq!(s.parse::<CellId>().unwrap(), cell);
        assert!("not-a-cell".parse::<CellId>().is_err());
    }

    #[test]
    fn test_neighbors_exclude_self() {
        let cell = atlanta();
        let ring = cell.neighbors();
        assert_eq!(ring.len(), 6);
        assert!(!ring.contains(&cell));
        for n in &ring {
            assert_eq!(cell.grid_distance(*n), Some(1));
        }
        assert_eq!(cell.grid_distance(cell), Some(0));
    }

    #[test]
    fn test_centroid_maps_back_to_cell() {
        let cell = atlanta();
        let again = CellId::containing(cell.centroid(), Resolution::Eight).unwrap();
        assert_eq!(again, cell);
    }

    #[test]
    fn test_hex_cell_json_shape() {
        let cell = HexCell::new(atlanta()).with_rent(1200.0);
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json["cell_id"], serde_json::Value::String(atlanta().to_string()));
        assert!(json["lat"].is_number());
        assert_eq!(json["avg_rent"], serde_json::json!(1200.0));
    }
}
