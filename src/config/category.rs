//! Per-category scoring parameters.
//!
//! Tables are validated when they are built or loaded, never at use time.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

use super::Mobility;
use crate::model::{Category, CategoryMap};
use crate::{Error, Result};

/// How one category turns nearby POIs into a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// POI type tags counted toward this category.
    #[serde(rename = "types")]
    pub poi_types: Vec<String>,
    /// Exponent of the inverse power-law decay.
    pub decay_rate: f64,
    /// POIs farther than this contribute nothing.
    pub max_distance_km: f64,
    /// Subtract contributions instead of adding them.
    #[serde(default)]
    pub invert: bool,
}

impl CategoryConfig {
    pub fn new(poi_types: &[&str], decay_rate: f64, max_distance_km: f64) -> Self {
        Self {
            poi_types: poi_types.iter().map(|t| t.to_string()).collect(),
            decay_rate,
            max_distance_km,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    fn validate(&self, category: Category) -> Result<()> {
        if self.poi_types.is_empty() {
            return Err(Error::InvalidParameter(format!("{category}: no POI types configured")));
        }
        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "{category}: decay_rate must be finite and >= 0, got {}",
                self.decay_rate
            )));
        }
        if !self.max_distance_km.is_finite() || self.max_distance_km < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "{category}: max_distance_km must be finite and >= 0, got {}",
                self.max_distance_km
            )));
        }
        Ok(())
    }
}

// ============================================================================
// CategoryTable
// ============================================================================

/// The set of categories scored in one run, with their parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategoryTable {
    entries: CategoryMap<CategoryConfig>,
}

impl CategoryTable {
    /// Build and validate a table.
    pub fn new(entries: CategoryMap<CategoryConfig>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::InvalidParameter("category table is empty".into()));
        }
        for (category, config) in entries.iter() {
            config.validate(category)?;
        }
        Ok(Self { entries })
    }

    /// Built-in table for users without a vehicle.
    pub fn walking() -> Self {
        Self::builtin([5.0, 2.0, 10.0, 20.0, 3.0, 10.0, 3.0, 3.0])
    }

    /// Built-in table for vehicle-equipped users: same decay, longer reach.
    pub fn vehicle() -> Self {
        Self::builtin([10.0, 8.0, 15.0, 20.0, 5.0, 10.0, 5.0, 3.0])
    }

    /// Max distances are given in `Category::ALL` order.
    fn builtin(max_km: [f64; Category::COUNT]) -> Self {
        let decay = |c: Category| match c {
            Category::Restaurant => 1.5,
            Category::GroceryStore => 2.0,
            Category::School => 1.0,
            Category::Hospital => 0.8,
            Category::TransitStop => 0.5,
            Category::PoliceStation => 0.5,
            Category::Park => 1.0,
            Category::CrimeIncident => 2.0,
        };
        let entries = Category::ALL
            .into_iter()
            .zip(max_km)
            .map(|(c, km)| {
                let tag = match c {
                    Category::TransitStop => "marta_stop",
                    other => other.as_str(),
                };
                let config = CategoryConfig::new(&[tag], decay(c), km);
                let config = if c == Category::CrimeIncident { config.inverted() } else { config };
                (c, config)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, category: Category) -> Option<&CategoryConfig> {
        self.entries.get(category)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.entries.contains(category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryConfig)> + '_ {
        self.entries.iter()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content digest, folded into accessibility cache keys.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (category, config) in self.entries.iter() {
            hasher.update(category.as_str().as_bytes());
            for t in &config.poi_types {
                hasher.update(&[0]);
                hasher.update(t.as_bytes());
            }
            hasher.update(&config.decay_rate.to_bits().to_le_bytes());
            hasher.update(&config.max_distance_km.to_bits().to_le_bytes());
            hasher.update(&[config.invert as u8]);
        }
        hasher.digest()
    }
}

impl<'de> Deserialize<'de> for CategoryTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = CategoryMap::<CategoryConfig>::deserialize(deserializer)?;
        CategoryTable::new(entries).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// ScoringConfig
// ============================================================================

/// One category table per mobility mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub walking: CategoryTable,
    pub vehicle: CategoryTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            walking: CategoryTable::walking(),
            vehicle: CategoryTable::vehicle(),
        }
    }
}

impl ScoringConfig {
    pub fn for_mobility(&self, mobility: Mobility) -> &CategoryTable {
        match mobility {
            Mobility::Walking => &self.walking,
            Mobility::Vehicle => &self.vehicle,
        }
    }

    /// Load from JSON: `{"walking": {...}, "vehicle": {...}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidParameter(format!("scoring config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_valid() {
        for table in [CategoryTable::walking(), CategoryTable::vehicle()] {
            assert_eq!(table.len(), Category::COUNT);
            assert!(CategoryTable::new(table.entries.clone()).is_ok());
        }
    }

    #[test]
    fn test_vehicle_reaches_at_least_as_far() {
        let walk = CategoryTable::walking();
        let drive = CategoryTable::vehicle();
        for c in Category::ALL {
            let w = walk.get(c).unwrap();
            let d = drive.get(c).unwrap();
            assert!(d.max_distance_km >= w.max_distance_km, "{c}");
            assert_eq!(d.decay_rate, w.decay_rate);
        }
        assert_eq!(walk.get(Category::GroceryStore).unwrap().max_distance_km, 2.0);
        assert_eq!(drive.get(Category::GroceryStore).unwrap().max_distance_km, 8.0);
    }

    #[test]
    fn test_only_crime_is_inverted() {
        let table = CategoryTable::walking();
        let inverted: Vec<_> = table.iter().filter(|(_, c)| c.invert).map(|(c, _)| c).collect();
        assert_eq!(inverted, vec![Category::CrimeIncident]);
        assert_eq!(table.get(Category::TransitStop).unwrap().poi_types, vec!["marta_stop"]);
    }

    #[test]
    fn test_validation_rejects_bad_entries() {
        let mut entries = CategoryMap::new();
        entries.insert(Category::Park, CategoryConfig::new(&["park"], -1.0, 3.0));
        assert!(matches!(CategoryTable::new(entries), Err(Error::InvalidParameter(_))));

        let mut entries = CategoryMap::new();
        entries.insert(Category::Park, CategoryConfig::new(&[], 1.0, 3.0));
        assert!(CategoryTable::new(entries).is_err());

        assert!(CategoryTable::new(CategoryMap::new()).is_err());
    }

    #[test]
    fn test_json_load_validates() {
        let ok = r#"{
            "walking": {"park": {"types": ["park"], "decay_rate": 1.0, "max_distance_km": 3}},
            "vehicle": {"park": {"types": ["park"], "decay_rate": 1.0, "max_distance_km": 5}}
        }"#;
        let config = ScoringConfig::from_json(ok).unwrap();
        assert_eq!(config.for_mobility(Mobility::Vehicle).get(Category::Park).unwrap().max_distance_km, 5.0);

        let bad = r#"{
            "walking": {"park": {"types": ["park"], "decay_rate": 1.0, "max_distance_km": -3}},
            "vehicle": {"park": {"types": ["park"], "decay_rate": 1.0, "max_distance_km": 5}}
        }"#;
        assert!(ScoringConfig::from_json(bad).is_err());
    }

    #[test]
    fn test_fingerprint_changes_with_parameters() {
        let walk = CategoryTable::walking();
        assert_eq!(walk.fingerprint(), CategoryTable::walking().fingerprint());
        assert_ne!(walk.fingerprint(), CategoryTable::vehicle().fingerprint());
    }
}
