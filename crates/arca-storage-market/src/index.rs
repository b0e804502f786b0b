//! Swap-and-pop indexes.
//!
//! An index is a dense array plus a reverse map from entry to array
//! position. Removal moves the last entry into the vacated position and
//! updates its recorded position in the same step, so insert, remove and
//! membership are all O(1) regardless of size.

use arca_challenges::sample_index;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct SwapIndex<T> {
    entries: Vec<T>,
    positions: HashMap<T, usize>,
}

impl<T> Default for SwapIndex<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> SwapIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`. Returns false if it was already indexed.
    pub fn insert(&mut self, entry: T) -> bool {
        if self.positions.contains_key(&entry) {
            return false;
        }
        self.positions.insert(entry, self.entries.len());
        self.entries.push(entry);
        true
    }

    /// Removes `entry`. Returns false if it was not indexed.
    pub fn remove(&mut self, entry: &T) -> bool {
        let Some(position) = self.positions.remove(entry) else {
            return false;
        };
        self.entries.swap_remove(position);
        if let Some(moved) = self.entries.get(position) {
            self.positions.insert(*moved, position);
        }
        true
    }

    pub fn contains(&self, entry: &T) -> bool {
        self.positions.contains_key(entry)
    }

    pub fn position(&self, entry: &T) -> Option<usize> {
        self.positions.get(entry).copied()
    }

    pub fn get(&self, position: usize) -> Option<T> {
        self.entries.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Draws up to `count` distinct entries in seed-dependent order.
    ///
    /// Runs a partial Fisher-Yates shuffle over a virtual permutation, so the
    /// cost is O(count) even when the index is large.
    pub fn sample(&self, seed: &[u8; 32], count: usize) -> Vec<T> {
        let len = self.entries.len();
        let count = count.min(len);
        let mut swapped: HashMap<usize, usize> = HashMap::with_capacity(count * 2);
        let mut picked = Vec::with_capacity(count);

        for i in 0..count {
            let j = i + sample_index(seed, i as u64, len - i);
            let at_i = swapped.get(&i).copied().unwrap_or(i);
            let at_j = swapped.get(&j).copied().unwrap_or(j);
            swapped.insert(j, at_i);
            picked.push(self.entries[at_j]);
        }
        picked
    }
}

impl<T: Copy + Eq + Hash> FromIterator<T> for SwapIndex<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut index = Self::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}
