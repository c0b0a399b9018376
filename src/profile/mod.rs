//! # User Profiles
//!
//! Saved preference vectors with the cells a user liked, and a
//! nearest-neighbor lookup that recommends another user's liked cells.
//!
//! A profile's rank vector spans every [`Category`] in enum order; a
//! category missing from the saved ranks counts as 0. Similarity is
//! `1 − d` for the Euclidean distance `d` between rank vectors, so it
//! goes negative for distant profiles.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Category, CategoryMap, CellId};
use crate::Result;

/// Liked cells kept per profile; extras are truncated.
pub const MAX_LIKED_CELLS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub ranks: CategoryMap<i32>,
    pub liked_cells: Vec<CellId>,
    pub saved_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(ranks: CategoryMap<i32>, mut liked_cells: Vec<CellId>) -> Self {
        liked_cells.truncate(MAX_LIKED_CELLS);
        Self { ranks, liked_cells, saved_at: Utc::now() }
    }

    /// Dense rank vector in `Category::ALL` order.
    pub fn rank_vector(&self) -> [f64; Category::COUNT] {
        rank_vector(&self.ranks)
    }
}

fn rank_vector(ranks: &CategoryMap<i32>) -> [f64; Category::COUNT] {
    Category::ALL.map(|c| f64::from(ranks.get(c).copied().unwrap_or(0)))
}

/// The best-matching stored profile's liked cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub liked_cells: Vec<CellId>,
    pub similarity: f64,
}

/// Persistence for user profiles.
pub trait ProfileStore: Send + Sync {
    fn save(&self, ranks: CategoryMap<i32>, liked_cells: Vec<CellId>) -> Result<UserProfile>;

    /// Snapshot of every stored profile.
    fn profiles(&self) -> Vec<UserProfile>;

    /// Nearest stored profile with at least one liked cell, or `None`.
    fn recommend(&self, ranks: &CategoryMap<i32>) -> Option<Recommendation> {
        let query = rank_vector(ranks);
        self.profiles()
            .into_iter()
            .filter(|p| !p.liked_cells.is_empty())
            .map(|p| {
                let d = euclidean(&query, &p.rank_vector());
                (d, p)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(d, p)| Recommendation { liked_cells: p.liked_cells, similarity: 1.0 - d })
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<Vec<UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Load a JSON array of profiles.
    pub fn read_json(reader: impl Read) -> Result<Self> {
        let profiles: Vec<UserProfile> = serde_json::from_reader(reader)?;
        debug!(profiles = profiles.len(), "loaded user profiles");
        Ok(Self { profiles: RwLock::new(profiles) })
    }

    pub fn write_json(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, &*self.profiles.read())?;
        Ok(())
    }
}

impl ProfileStore for MemoryProfileStore {
    fn save(&self, ranks: CategoryMap<i32>, liked_cells: Vec<CellId>) -> Result<UserProfile> {
        let profile = UserProfile::new(ranks, liked_cells);
        self.profiles.write().push(profile.clone());
        Ok(profile)
    }

    fn profiles(&self) -> Vec<UserProfile> {
        self.profiles.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LatLon;
    use h3o::Resolution;

    fn cells(n: usize) -> Vec<CellId> {
        let origin = CellId::containing(LatLon::new(33.749, -84.388), Resolution::Eight).unwrap();
        std::iter::once(origin).chain(origin.neighbors()).take(n).collect()
    }

    fn ranks(park: i32, school: i32) -> CategoryMap<i32> {
        [(Category::Park, park), (Category::School, school)].into_iter().collect()
    }

    #[test]
    fn test_liked_cells_truncated() {
        let store = MemoryProfileStore::new();
        let saved = store.save(ranks(1, 1), cells(7)).unwrap();
        assert_eq!(saved.liked_cells.len(), MAX_LIKED_CELLS);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_recommend_nearest_with_likes() {
        let store = MemoryProfileStore::new();
        store.save(ranks(3, 0), Vec::new()).unwrap();
        store.save(ranks(3, 1), cells(2)).unwrap();
        store.save(ranks(0, 3), cells(1)).unwrap();

        let rec = store.recommend(&ranks(3, 0)).unwrap();
        // The exact match has no likes; the next nearest is one step away.
        assert_eq!(rec.liked_cells, cells(2));
        assert_eq!(rec.similarity, 0.0);
    }

    #[test]
    fn test_recommend_empty() {
        let store = MemoryProfileStore::new();
        assert!(store.recommend(&ranks(1, 1)).is_none());
        store.save(ranks(1, 1), Vec::new()).unwrap();
        assert!(store.recommend(&ranks(1, 1)).is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let store = MemoryProfileStore::new();
        store.save(ranks(2, 1), cells(3)).unwrap();
        let mut buf = Vec::new();
        store.write_json(&mut buf).unwrap();

        let loaded = MemoryProfileStore::read_json(buf.as_slice()).unwrap();
        assert_eq!(loaded.profiles(), store.profiles());
    }
}
