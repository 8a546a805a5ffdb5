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

//! Unsynchronized chained hash table.
//!
//! This is the single-thread baseline the benchmark harness measures
//! speedups against. It takes `&mut self` and carries no locks or atomics,
//! so its timings reflect the pure cost of the chained-hash operations.

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::Bucket;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    buckets: Box<[Bucket<K, V>]>,
    build_hasher: S,
    len: usize,
}

impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates a table with `buckets` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashMap<K, V, S> {
    pub fn with_buckets_and_hasher(buckets: usize, build_hasher: S) -> Self {
        assert!(buckets > 0, "bucket hint must be positive");

        let mut chains = Vec::with_capacity(buckets);
        chains.resize_with(buckets, Bucket::new);

        Self {
            buckets: chains.into_boxed_slice(),
            build_hasher,
            len: 0,
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let index = self.index(&key);
        let inserted = self.buckets[index].insert(key, value);

        if inserted {
            self.len += 1;
        }

        inserted
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.buckets[self.index(key)].get(key)
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.index(key);
        let removed = self.buckets[index].remove(key);

        if removed {
            self.len -= 1;
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (hash_key(&self.build_hasher, key) % self.buckets.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_and_lookup() {
        let mut map = HashMap::with_buckets(1024);

        assert!(map.insert(1, 100));
        assert!(map.insert(2, 200));
        assert!(!map.insert(1, 150));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&150));
        assert_eq!(map.get(&2), Some(&200));
        assert_eq!(map.get(&99), None);
    }

    #[test]
    fn insert_remove_roundtrip() {
        let mut map = HashMap::with_buckets(64);

        for key in 0..256u64 {
            assert!(map.insert(key, key * 7));
        }

        assert_eq!(map.len(), 256);

        for key in 0..256u64 {
            assert_eq!(map.get(&key), Some(&(key * 7)));
            assert!(map.remove(&key));
            assert_eq!(map.get(&key), None);
        }

        assert!(map.is_empty());
    }

    #[test]
    #[should_panic]
    fn zero_buckets_is_rejected() {
        let _ = HashMap::<u64, u64>::with_buckets(0);
    }
}
