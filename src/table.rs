// MIT License
//
// Copyright (c) 2020 Gregory Meyer
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Chain and interface primitives shared by every table variant.

use std::borrow::Borrow;
use std::ops::AddAssign;

/// A single key/value pair in a bucket chain.
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
}

/// An unordered chain of entries with unique keys.
///
/// `Bucket` performs the ordinary chained-hash operations; it does no
/// synchronization of its own. Callers serialize mutation through whatever
/// guard owns the chain — a mutex in the locking variants, exclusive access
/// in the sequential table.
pub(crate) struct Bucket<K, V> {
    entries: Vec<Entry<K, V>>,
}

impl<K: Eq, V> Bucket<K, V> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.entries
            .iter()
            .find(|entry| entry.key.borrow() == key)
            .map(|entry| &entry.value)
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether a new entry was created.
    pub(crate) fn insert(&mut self, key: K, value: V) -> bool {
        for entry in &mut self.entries {
            if entry.key == key {
                entry.value = value;

                return false;
            }
        }

        self.entries.push(Entry { key, value });

        true
    }

    /// Removes the entry for `key`, if any. Chains are unordered, so the
    /// last entry is swapped into the hole.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.key.borrow() == key)
        {
            self.entries.swap_remove(index);

            true
        } else {
            false
        }
    }
}

impl<K: Eq, V: AddAssign> Bucket<K, V> {
    /// Adds `delta` to the value for `key`, inserting `delta` itself if the
    /// key is absent. Returns whether a new entry was created.
    pub(crate) fn increment(&mut self, key: K, delta: V) -> bool {
        for entry in &mut self.entries {
            if entry.key == key {
                entry.value += delta;

                return false;
            }
        }

        self.entries.push(Entry { key, value: delta });

        true
    }
}

/// The operations the benchmark harness drives, implemented by every
/// thread-safe table in this crate.
///
/// All methods take `&self`; implementations synchronize internally. The
/// harness is generic over this trait, so each variant runs the same
/// monomorphized workload loop and differences in the numbers come from the
/// locking discipline alone.
pub trait ConcurrentMap<K, V>: Send + Sync {
    /// Label used in benchmark output.
    const NAME: &'static str;

    /// Creates a table with `buckets` requested buckets, tuned for about
    /// `threads` concurrent callers. Only the adaptive table currently
    /// consults the thread hint.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    fn with_buckets_for_threads(buckets: usize, threads: usize) -> Self;

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    fn insert(&self, key: K, value: V) -> bool;

    /// Returns a copy of the value stored for `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Removes the entry for `key`; returns whether one was present.
    fn remove(&self, key: &K) -> bool;

    /// Number of entries, consistent with the most recently completed
    /// insert or remove. Concurrent in-flight operations may not yet be
    /// reflected.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bucket count this table actually allocated, after any internal
    /// rounding of the construction-time hint.
    fn bucket_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_insert_get_remove() {
        let mut bucket = Bucket::new();

        assert!(bucket.insert("a", 1));
        assert!(bucket.insert("b", 2));
        assert!(!bucket.insert("a", 3));

        assert_eq!(bucket.get("a"), Some(&3));
        assert_eq!(bucket.get("b"), Some(&2));
        assert_eq!(bucket.get("c"), None);

        assert!(bucket.remove("a"));
        assert!(!bucket.remove("a"));
        assert_eq!(bucket.get("a"), None);
        assert_eq!(bucket.get("b"), Some(&2));
    }

    #[test]
    fn bucket_increment() {
        let mut bucket = Bucket::new();

        assert!(bucket.increment("word", 1));
        assert!(!bucket.increment("word", 1));
        assert!(!bucket.increment("word", 3));

        assert_eq!(bucket.get("word"), Some(&5));
    }
}
