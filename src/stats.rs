//! Generic occurrence counter used for path de-dup, validator tallies and
//! error statistics. Grounded on `original_source/registrator::Encounter` —
//! the teacher has no direct analogue, so this is learned straight from the
//! Go source rather than adapted from an existing Rust module.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Counts occurrences of an arbitrary hashable key. `check_in` returns the
/// count *after* incrementing, so callers can gate on "is this the first
/// time" (`== 1`) or "did this just become a duplicate" (`== 2`) without a
/// separate read-then-write race.
pub struct Encounter<K: Eq + Hash + Clone> {
    inner: Mutex<HashMap<K, usize>>,
}

impl<K: Eq + Hash + Clone> Default for Encounter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> Encounter<K> {
    pub fn new() -> Self {
        Encounter {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Increments the count for `key` and returns the new total.
    pub fn check_in(&self, key: K) -> usize {
        let mut guard = self.inner.lock().unwrap();
        let count = guard.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, key: &K) -> usize {
        self.inner.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys seen so far.
    pub fn keys_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Sum of all counts across every key.
    pub fn total_count(&self) -> usize {
        self.inner.lock().unwrap().values().sum()
    }

    pub fn snapshot(&self) -> HashMap<K, usize> {
        self.inner.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_checkin_returns_one() {
        let e: Encounter<&str> = Encounter::new();
        assert_eq!(e.check_in("a"), 1);
        assert_eq!(e.check_in("a"), 2);
        assert_eq!(e.check_in("b"), 1);
        assert_eq!(e.keys_count(), 2);
        assert_eq!(e.total_count(), 3);
    }
}
