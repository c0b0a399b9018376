//! # livability: Hexagonal-Grid Livability Scoring
//!
//! Scores the hexagonal cells around a point against a user's ranked
//! preferences over POI categories, a rent ceiling and a mobility mode,
//! then buckets the surviving cells into ordinal tiers or density clusters.
//!
//! ## Design Principles
//!
//! 1. **Plain DTOs**: `HexCell`, `PoiRecord`, `RentSample` cross every stage boundary
//! 2. **Validated up front**: run parameters and category tables fail before any work
//! 3. **Injected state**: the accessibility cache is a type parameter the caller supplies
//! 4. **Planar distance everywhere**: `√(Δlat² + Δlon²) × 111` km, never great-circle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livability::{Category, Pipeline, PoiRecord, PoiTable, RentSample, RunParams};
//!
//! # fn example() -> livability::Result<()> {
//! let pois = PoiTable::new(vec![
//!     PoiRecord::new("park", 33.750, -84.390),
//!     PoiRecord::new("grocery_store", 33.745, -84.385),
//! ]);
//! let rents = vec![RentSample::new(33.749, -84.388, 950.0)];
//! let pipeline = Pipeline::new(pois, rents);
//!
//! let params = RunParams { radius_km: 2.0, max_budget: 1200.0, ..RunParams::default() }
//!     .with_rank(Category::Park, 1)
//!     .with_rank(Category::GroceryStore, 2);
//!
//! let output = pipeline.run(&params)?;
//! for cell in &output.cells {
//!     println!("{} {:?} {:?}", cell.id, cell.match_score, cell.classification);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Groupings
//!
//! | Grouping | Features | Output |
//! |----------|----------|--------|
//! | `tiers` (default) | match score | ordinal tier, 0 best |
//! | `score_clusters` | min-max scaled score | DBSCAN cluster or noise |
//! | `spatial_clusters` | standardized score, lat, lon | DBSCAN region or noise |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod grid;
pub mod scoring;
pub mod budget;
pub mod smoothing;
pub mod weighting;
pub mod tiering;
pub mod pipeline;
pub mod profile;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Category, CategoryMap, CellId, ClusterLabel, Classification,
    HexCell, LatLon, PoiRecord, PoiTable, RentSample,
};

// ============================================================================
// Re-exports: Configuration
// ============================================================================

pub use config::{
    CategoryConfig, CategoryTable, Grouping, Mobility,
    RunLimits, RunParams, ScoringConfig,
};

// ============================================================================
// Re-exports: Stages
// ============================================================================

pub use grid::GridGenerator;
pub use scoring::{AccessibilityCache, AccessibilityScorer, LruAccessibilityCache};
pub use budget::BudgetIntegrator;
pub use smoothing::SpatialSmoother;
pub use weighting::{NormalizationMethod, PreferenceWeighter, WeightVector};
pub use tiering::{ClusterSummary, QuantileTiering};

// ============================================================================
// Re-exports: Entry points
// ============================================================================

pub use pipeline::{Pipeline, RunOutput, RunStats};
pub use profile::{MemoryProfileStore, ProfileStore, Recommendation, UserProfile};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing accessibility column for weighted category '{0}'")]
    MissingCategory(Category),

    #[error("No preference rank > 0; select at least one category")]
    NoPreferences,

    #[error("Work limit exceeded: {pairs} cell-POI pairs > {limit}")]
    WorkLimitExceeded { pairs: u64, limit: u64 },

    #[error("Invalid cell identifier: {0}")]
    InvalidCell(String),

    #[error("Run exceeded its time budget: {elapsed_ms} ms > {limit_ms} ms")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures caused by caller input (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter(_)
                | Error::MissingCategory(_)
                | Error::NoPreferences
                | Error::WorkLimitExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_split() {
        assert!(Error::NoPreferences.is_client_error());
        assert!(Error::MissingCategory(Category::Park).is_client_error());
        assert!(Error::WorkLimitExceeded { pairs: 2, limit: 1 }.is_client_error());
        assert!(!Error::InvalidCell("zz".into()).is_client_error());
        assert!(!Error::Timeout { elapsed_ms: 5, limit_ms: 1 }.is_client_error());
        let io = std::io::Error::other("disk");
        assert!(!Error::from(io).is_client_error());
    }
}
