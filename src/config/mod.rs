//! # Run Configuration
//!
//! Everything a caller can tune for one pipeline run, plus the
//! per-category scoring tables in [`category`].
//!
//! All types deserialize from JSON and are validated before any grid or
//! score is computed. Validation failures are client errors
//! ([`Error::is_client_error`]).

pub mod category;

use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{CategoryMap, LatLon};
use crate::weighting::NormalizationMethod;
use crate::{Error, Result};

pub use category::{CategoryConfig, CategoryTable, ScoringConfig};

/// Largest accepted preference rank.
pub const MAX_RANK: i32 = 10;

/// Default work bound: cells × POIs evaluated by the scorer.
pub const DEFAULT_MAX_CELL_POI_PAIRS: u64 = 50_000_000;

// ============================================================================
// Mobility
// ============================================================================

/// Selects the built-in category table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mobility {
    Walking,
    #[default]
    Vehicle,
}

impl Mobility {
    pub fn has_vehicle(self) -> bool {
        matches!(self, Mobility::Vehicle)
    }
}

impl From<bool> for Mobility {
    fn from(has_vehicle: bool) -> Self {
        if has_vehicle { Mobility::Vehicle } else { Mobility::Walking }
    }
}

/// Accepts `"walking"`/`"vehicle"` or a `has_car`-style boolean.
fn deserialize_mobility<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Mobility, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Flag(bool),
        Named(Mobility),
    }
    Ok(match Repr::deserialize(d)? {
        Repr::Flag(b) => Mobility::from(b),
        Repr::Named(m) => m,
    })
}

/// Accepts `[lat, lon]` or `{"lat": .., "lon": ..}`.
fn deserialize_center<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<LatLon, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Pair([f64; 2]),
        Point(LatLon),
    }
    Ok(match Repr::deserialize(d)? {
        Repr::Pair([lat, lon]) => LatLon::new(lat, lon),
        Repr::Point(p) => p,
    })
}

// ============================================================================
// Grouping
// ============================================================================

/// How scored cells are bucketed at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Grouping {
    /// Ordinal quantile tiers, tier 0 best.
    Tiers { n_tiers: usize },
    /// DBSCAN on the min-max scaled match score.
    ScoreClusters { eps: f64, min_samples: usize },
    /// DBSCAN on standardized (score, lat, lon).
    SpatialClusters { eps: f64, min_samples: usize, spatial_weight: f64 },
}

impl Default for Grouping {
    fn default() -> Self {
        Grouping::Tiers { n_tiers: 10 }
    }
}

impl Grouping {
    pub fn tiers(n_tiers: usize) -> Self {
        Grouping::Tiers { n_tiers }
    }

    pub fn score_clusters() -> Self {
        Grouping::ScoreClusters { eps: 0.1, min_samples: 3 }
    }

    pub fn spatial_clusters() -> Self {
        Grouping::SpatialClusters { eps: 0.5, min_samples: 3, spatial_weight: 0.5 }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Grouping::Tiers { n_tiers } if n_tiers == 0 => {
                Err(Error::InvalidParameter("n_tiers must be >= 1".into()))
            }
            Grouping::Tiers { .. } => Ok(()),
            Grouping::ScoreClusters { eps, min_samples } => validate_dbscan(eps, min_samples),
            Grouping::SpatialClusters { eps, min_samples, spatial_weight } => {
                validate_dbscan(eps, min_samples)?;
                validate_unit("spatial_weight", spatial_weight)
            }
        }
    }
}

fn validate_dbscan(eps: f64, min_samples: usize) -> Result<()> {
    if !eps.is_finite() || eps <= 0.0 {
        return Err(Error::InvalidParameter(format!("eps must be finite and > 0, got {eps}")));
    }
    if min_samples == 0 {
        return Err(Error::InvalidParameter("min_samples must be >= 1".into()));
    }
    Ok(())
}

fn validate_unit(name: &str, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(Error::InvalidParameter(format!("{name} must be in [0, 1], got {v}")));
    }
    Ok(())
}

// ============================================================================
// Limits
// ============================================================================

/// Bounds on the cost of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Upper bound on grid cells × POI records.
    pub max_cell_poi_pairs: Option<u64>,
    /// Wall-clock budget for the whole run.
    pub timeout_ms: Option<u64>,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_cell_poi_pairs: Some(DEFAULT_MAX_CELL_POI_PAIRS),
            timeout_ms: None,
        }
    }
}

impl RunLimits {
    pub fn unbounded() -> Self {
        Self { max_cell_poi_pairs: None, timeout_ms: None }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Fails when `cells × pois` exceeds the configured bound.
    pub fn check_work(&self, cells: usize, pois: usize) -> Result<()> {
        let pairs = (cells as u64).saturating_mul(pois as u64);
        match self.max_cell_poi_pairs {
            Some(limit) if pairs > limit => Err(Error::WorkLimitExceeded { pairs, limit }),
            _ => Ok(()),
        }
    }
}

/// Wall-clock deadline checked between stages and inside per-cell loops.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn start(limit: Option<Duration>) -> Self {
        Self { started: Instant::now(), limit }
    }

    pub fn unbounded() -> Self {
        Self::start(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn check(&self) -> Result<()> {
        match self.limit {
            Some(limit) if self.started.elapsed() > limit => Err(Error::Timeout {
                elapsed_ms: self.started.elapsed().as_millis() as u64,
                limit_ms: limit.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// RunParams
// ============================================================================

/// Parameters of one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    #[serde(deserialize_with = "deserialize_center")]
    pub center: LatLon,
    pub radius_km: f64,
    /// Inclusive rent ceiling.
    #[serde(alias = "budget")]
    pub max_budget: f64,
    #[serde(alias = "has_car", deserialize_with = "deserialize_mobility")]
    pub mobility: Mobility,
    /// H3 resolution, 0..=15.
    pub resolution: u8,
    /// Raw importance rank per category. Ranks <= 0 drop the category.
    #[serde(alias = "user_weights")]
    pub ranks: CategoryMap<i32>,
    pub normalization: NormalizationMethod,
    /// Base of the exponential rank normalization.
    pub scale_factor: f64,
    /// Share of the neighbor mean in spatial smoothing.
    pub neighbor_weight: f64,
    /// K nearest known-rent cells used to impute a missing rent.
    pub rent_neighbors: usize,
    pub grouping: Grouping,
    pub limits: RunLimits,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            center: LatLon::new(33.749, -84.388),
            radius_km: 5.0,
            max_budget: 1000.0,
            mobility: Mobility::Vehicle,
            resolution: 8,
            ranks: CategoryMap::new(),
            normalization: NormalizationMethod::Exponential,
            scale_factor: 2.0,
            neighbor_weight: 0.3,
            rent_neighbors: 1,
            grouping: Grouping::default(),
            limits: RunLimits::default(),
        }
    }
}

impl RunParams {
    /// Parse a JSON request body. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: RunParams = serde_json::from_str(json)
            .map_err(|e| Error::InvalidParameter(format!("run parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_rank(mut self, category: crate::model::Category, rank: i32) -> Self {
        self.ranks.insert(category, rank);
        self
    }

    /// Reject malformed parameters before any computation starts.
    pub fn validate(&self) -> Result<()> {
        let c = self.center;
        if !c.is_finite() || c.lat <= -90.0 || c.lat >= 90.0 || !(-180.0..=180.0).contains(&c.lon) {
            return Err(Error::InvalidParameter(format!("center ({}, {}) out of range", c.lat, c.lon)));
        }
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            return Err(Error::InvalidParameter(format!("radius_km must be > 0, got {}", self.radius_km)));
        }
        if !self.max_budget.is_finite() || self.max_budget < 0.0 {
            return Err(Error::InvalidParameter(format!("max_budget must be >= 0, got {}", self.max_budget)));
        }
        if self.resolution > 15 {
            return Err(Error::InvalidParameter(format!("resolution must be 0..=15, got {}", self.resolution)));
        }
        if let Some((category, rank)) = self.ranks.iter().find(|(_, r)| **r > MAX_RANK) {
            return Err(Error::InvalidParameter(format!("rank for {category} is {rank}, max is {MAX_RANK}")));
        }
        if !self.ranks.values().any(|r| *r > 0) {
            return Err(Error::NoPreferences);
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(Error::InvalidParameter(format!("scale_factor must be > 0, got {}", self.scale_factor)));
        }
        validate_unit("neighbor_weight", self.neighbor_weight)?;
        if self.rent_neighbors == 0 {
            return Err(Error::InvalidParameter("rent_neighbors must be >= 1".into()));
        }
        self.grouping.validate()
    }
}
