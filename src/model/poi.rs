//! Points of interest and rent samples supplied by the caller.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

use super::LatLon;

/// A point of interest. Read-only for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    /// Free-form type tag matched against a category's `poi_types`.
    #[serde(rename = "type")]
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

impl PoiRecord {
    pub fn new(kind: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            kind: kind.into(),
            lat,
            lon,
            name: String::new(),
            attributes: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}

/// A point rent observation. Many samples may land in one cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RentSample {
    pub lat: f64,
    pub lon: f64,
    pub avg_rent_est: f64,
}

impl RentSample {
    pub fn new(lat: f64, lon: f64, avg_rent_est: f64) -> Self {
        Self { lat, lon, avg_rent_est }
    }

    /// Rows with any missing (non-finite) field are ignored.
    pub fn is_usable(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.avg_rent_est.is_finite()
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }
}

// ============================================================================
// PoiTable
// ============================================================================

/// POI records plus a content fingerprint.
///
/// Built once per pipeline. Category lookups return positions only, in
/// input row order, so accumulation order is stable across runs.
#[derive(Debug, Clone, Default)]
pub struct PoiTable {
    records: Vec<PoiRecord>,
    fingerprint: u64,
}

impl PoiTable {
    pub fn new(records: Vec<PoiRecord>) -> Self {
        let mut hasher = Xxh3::new();
        for poi in &records {
            hasher.update(poi.kind.as_bytes());
            hasher.update(&[0]);
            hasher.update(&poi.lat.to_bits().to_le_bytes());
            hasher.update(&poi.lon.to_bits().to_le_bytes());
        }
        Self {
            records,
            fingerprint: hasher.digest(),
        }
    }

    pub fn records(&self) -> &[PoiRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Digest of every record's type and position.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Positions of all POIs whose type tag is one of `kinds`, in row order.
    ///
    /// Each record is yielded at most once, however often its kind is listed.
    pub fn positions_of<'a>(&'a self, kinds: &'a [String]) -> impl Iterator<Item = LatLon> + 'a {
        self.records
            .iter()
            .filter(move |poi| kinds.contains(&poi.kind))
            .map(PoiRecord::position)
    }
}

impl From<Vec<PoiRecord>> for PoiTable {
    fn from(records: Vec<PoiRecord>) -> Self {
        Self::new(records)
    }
}
