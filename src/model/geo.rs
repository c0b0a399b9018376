//! Planar geometry used by every stage.
//!
//! Distances are NOT great-circle distances. One degree of latitude and one
//! degree of longitude are both taken as [`KM_PER_DEGREE`] kilometres when
//! measuring, and only the bounding box corrects longitude by `cos(lat)`.
//! All numeric outputs of the pipeline depend on this exact approximation.

use serde::{Deserialize, Serialize};

/// Kilometres per degree in the planar approximation.
pub const KM_PER_DEGREE: f64 = 111.0;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// `√(Δlat² + Δlon²) × 111`.
pub fn planar_distance_km(a: LatLon, b: LatLon) -> f64 {
    let lat_diff = (a.lat - b.lat).abs();
    let lon_diff = (a.lon - b.lon).abs();
    (lat_diff * lat_diff + lon_diff * lon_diff).sqrt() * KM_PER_DEGREE
}

// ============================================================================
// Bounding box
// ============================================================================

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Box enclosing a disk of `radius_km` around `center`.
    ///
    /// Latitude extent is `radius / 111`; longitude extent is
    /// `radius / (111 × cos(lat))`.
    pub fn around(center: LatLon, radius_km: f64) -> Self {
        let lat_radius = radius_km / KM_PER_DEGREE;
        let lon_radius = radius_km / (KM_PER_DEGREE * center.lat.to_radians().cos());
        Self {
            lat_min: center.lat - lat_radius,
            lat_max: center.lat + lat_radius,
            lon_min: center.lon - lon_radius,
            lon_max: center.lon + lon_radius,
        }
    }

    pub fn contains(&self, p: LatLon) -> bool {
        (self.lat_min..=self.lat_max).contains(&p.lat) && (self.lon_min..=self.lon_max).contains(&p.lon)
    }
}

/// `n` evenly spaced samples over `[start, stop]`, both ends included.
///
/// Samples are `start + i × step`; the final sample is pinned to `stop`
/// so rounding never pushes it past the interval.
pub fn linspace(start: f64, stop: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 { (stop - start) / (n - 1) as f64 } else { 0.0 };
    (0..n).map(move |i| {
        if n > 1 && i == n - 1 {
            stop
        } else {
            i as f64 * step + start
        }
    })
}
