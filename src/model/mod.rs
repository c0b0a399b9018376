//! # Data Model
//!
//! Plain DTOs shared by every pipeline stage and by callers.
//!
//! Design rule: this module is pure data. No I/O, no caches, no logging.

pub mod category;
pub mod cell;
pub mod geo;
pub mod poi;

pub use category::{Category, CategoryMap};
pub use cell::{CellId, ClusterLabel, Classification, HexCell};
pub use geo::{BoundingBox, LatLon, KM_PER_DEGREE, planar_distance_km};
pub use poi::{PoiRecord, PoiTable, RentSample};
