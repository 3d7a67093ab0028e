// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Least-used selection over a set of values.
//!
//! One pool instance holds API base URLs, another bot tokens — the two
//! concerns share a shape, so they share an implementation. Selection
//! returns any value with the minimum use count, ties broken uniformly
//! at random. Removal quarantines a value until a new pool is built;
//! there is no automatic reinstatement.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::seq::SliceRandom;

struct PoolState {
    values: Vec<String>,
    counts: HashMap<String, u64>,
}

/// A mutex-guarded pool with least-used selection.
pub struct LeastUsedPool {
    state: Mutex<PoolState>,
}

impl LeastUsedPool {
    /// Builds a pool from the given values, trimming whitespace and
    /// dropping empties.
    pub fn new(values: impl IntoIterator<Item = String>) -> Self {
        let values: Vec<String> = values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        Self {
            state: Mutex::new(PoolState {
                values,
                counts: HashMap::new(),
            }),
        }
    }

    /// Returns a value with the lowest use count, or `None` for an
    /// empty (or fully quarantined) pool.
    pub fn get(&self) -> Option<String> {
        let state = self.state.lock().expect("pool poisoned");
        if state.values.is_empty() {
            return None;
        }
        let min = state
            .values
            .iter()
            .map(|v| state.counts.get(v).copied().unwrap_or(0))
            .min()?;
        let candidates: Vec<&String> = state
            .values
            .iter()
            .filter(|v| state.counts.get(*v).copied().unwrap_or(0) == min)
            .collect();
        candidates.choose(&mut rand::thread_rng()).map(|v| (*v).clone())
    }

    /// Bumps a value's use count. No-op for the empty string.
    pub fn increment(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let mut state = self.state.lock().expect("pool poisoned");
        *state.counts.entry(value.to_string()).or_insert(0) += 1;
    }

    /// Evicts a value permanently. No-op for the empty string.
    pub fn remove(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let mut state = self.state.lock().expect("pool poisoned");
        state.values.retain(|v| v != value);
        state.counts.remove(value);
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("pool poisoned").values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current use count of a value (0 when never used or absent).
    pub fn use_count(&self, value: &str) -> u64 {
        self.state
            .lock()
            .expect("pool poisoned")
            .counts
            .get(value)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(values: &[&str]) -> LeastUsedPool {
        LeastUsedPool::new(values.iter().map(|v| v.to_string()))
    }

    #[test]
    fn new_trims_and_drops_empty_values() {
        let pool = pool(&[" a ", "", "b", "   "]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn empty_pool_returns_none() {
        let pool = pool(&[]);
        assert!(pool.get().is_none());
    }

    #[test]
    fn get_prefers_the_least_used_value() {
        let pool = pool(&["a", "b"]);
        pool.increment("a");
        pool.increment("a");
        pool.increment("b");
        assert_eq!(pool.get().as_deref(), Some("b"));
    }

    #[test]
    fn ties_are_spread_across_candidates() {
        let pool = pool(&["a", "b", "c"]);
        let mut seen = HashSet::new();
        // Incrementing the selected value each round forces rotation
        // through every candidate regardless of random tie-breaks.
        for _ in 0..3 {
            let value = pool.get().unwrap();
            pool.increment(&value);
            seen.insert(value);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn unincremented_get_hits_each_value_roughly_equally() {
        let pool = pool(&["a", "b"]);
        let mut counts: HashMap<String, u32> = HashMap::new();
        for _ in 0..200 {
            *counts.entry(pool.get().unwrap()).or_insert(0) += 1;
        }
        // Uniform tie-breaking should not starve either side.
        assert!(counts.get("a").copied().unwrap_or(0) > 50);
        assert!(counts.get("b").copied().unwrap_or(0) > 50);
    }

    #[test]
    fn remove_quarantines_permanently() {
        let pool = pool(&["a", "b"]);
        pool.remove("a");
        assert_eq!(pool.len(), 1);
        for _ in 0..10 {
            assert_eq!(pool.get().as_deref(), Some("b"));
        }
        pool.remove("b");
        assert!(pool.get().is_none());
    }

    #[test]
    fn increment_of_empty_string_is_a_noop() {
        let pool = pool(&["a"]);
        pool.increment("");
        assert_eq!(pool.use_count("a"), 0);
    }
}
