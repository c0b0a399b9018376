//! Closed set of POI categories and a dense per-category map.

use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A point-of-interest category the scorer knows how to weigh.
///
/// The set is closed: configuration tables, preference ranks and score
/// columns are all indexed by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Restaurant,
    GroceryStore,
    School,
    Hospital,
    #[serde(alias = "marta_stop")]
    TransitStop,
    PoliceStation,
    Park,
    /// Negative signal: nearby incidents lower the score.
    CrimeIncident,
}

impl Category {
    pub const COUNT: usize = 8;

    pub const ALL: [Category; Category::COUNT] = [
        Category::Restaurant,
        Category::GroceryStore,
        Category::School,
        Category::Hospital,
        Category::TransitStop,
        Category::PoliceStation,
        Category::Park,
        Category::CrimeIncident,
    ];

    /// Dense index into a [`CategoryMap`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Restaurant => "restaurant",
            Category::GroceryStore => "grocery_store",
            Category::School => "school",
            Category::Hospital => "hospital",
            Category::TransitStop => "transit_stop",
            Category::PoliceStation => "police_station",
            Category::Park => "park",
            Category::CrimeIncident => "crime_incident",
        }
    }

    /// Flat column name for the raw score, e.g. `park_accessibility`.
    pub fn accessibility_column(self) -> String {
        format!("{}_accessibility", self.as_str())
    }

    /// Flat column name for the normalized score, e.g. `park_norm`.
    pub fn norm_column(self) -> String {
        format!("{}_norm", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "marta_stop" => Ok(Category::TransitStop),
            _ => Category::ALL
                .into_iter()
                .find(|c| c.as_str() == s)
                .ok_or_else(|| Error::InvalidParameter(format!("unknown category '{s}'"))),
        }
    }
}

// ============================================================================
// CategoryMap
// ============================================================================

/// Fixed-size map keyed by [`Category`].
///
/// Iteration always follows declaration order of the enum, which keeps
/// every per-category accumulation deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap<T> {
    slots: [Option<T>; Category::COUNT],
}

impl<T> Default for CategoryMap<T> {
    fn default() -> Self {
        Self { slots: std::array::from_fn(|_| None) }
    }
}

impl<T> CategoryMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> Option<&T> {
        self.slots[category.index()].as_ref()
    }

    pub fn get_mut(&mut self, category: Category) -> Option<&mut T> {
        self.slots[category.index()].as_mut()
    }

    pub fn insert(&mut self, category: Category, value: T) -> Option<T> {
        self.slots[category.index()].replace(value)
    }

    pub fn remove(&mut self, category: Category) -> Option<T> {
        self.slots[category.index()].take()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.slots[category.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> + '_ {
        Category::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(c, slot)| slot.as_ref().map(|v| (c, v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = Category> + '_ {
        self.iter().map(|(c, _)| c)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, v)| v)
    }
}

impl<T> FromIterator<(Category, T)> for CategoryMap<T> {
    fn from_iter<I: IntoIterator<Item = (Category, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (c, v) in iter {
            map.insert(c, v);
        }
        map
    }
}

impl<T: Serialize> Serialize for CategoryMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CategoryMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = hashbrown::HashMap::<Category, T>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert_eq!("marta_stop".parse::<Category>().unwrap(), Category::TransitStop);
        assert!("bakery".parse::<Category>().is_err());
    }

    #[test]
    fn test_map_iterates_in_declaration_order() {
        let mut map = CategoryMap::new();
        map.insert(Category::Park, 3);
        map.insert(Category::Restaurant, 1);
        map.insert(Category::CrimeIncident, 2);
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec![Category::Restaurant, Category::Park, Category::CrimeIncident]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.remove(Category::Park), Some(3));
        assert!(!map.contains(Category::Park));
    }

    #[test]
    fn test_map_json_uses_category_names() {
        let map: CategoryMap<i32> =
            serde_json::from_str(r#"{"park": 2, "marta_stop": 1}"#).unwrap();
        assert_eq!(map.get(Category::Park), Some(&2));
        assert_eq!(map.get(Category::TransitStop), Some(&1));

        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("\"transit_stop\":1"));
    }
}
