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

//! Lock-striped chained hash table.
//!
//! A parameterized middle ground between one guard for everything and one
//! guard per bucket: `B` buckets share `M < B` stripe guards. Bucket `b`
//! belongs to stripe `b % M`, so every bucket maps to exactly one stripe and
//! holding a stripe's guard grants exclusive access to all of its buckets.
//! Operations whose keys land on the same stripe serialize even when their
//! buckets differ; raising `M` buys concurrency at the cost of guard memory.
//!
//! Each stripe owns the storage for its buckets (stripe `s` holds bucket
//! `b` at slot `b / M`), which keeps the guard-to-data relationship a
//! compile-time fact rather than a protocol callers must respect.

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::{Bucket, ConcurrentMap};

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// Stripe count used by the `with_buckets` constructor.
pub const DEFAULT_STRIPES: usize = 256;

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    stripes: Box<[CachePadded<Mutex<Box<[Bucket<K, V>]>>>]>,
    bucket_count: usize,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates a table with `buckets` buckets sharing [`DEFAULT_STRIPES`]
    /// guards (fewer if `buckets` is smaller).
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_and_stripes(buckets, DEFAULT_STRIPES)
    }

    pub fn with_buckets_and_stripes(buckets: usize, stripes: usize) -> Self {
        Self::with_buckets_stripes_and_hasher(buckets, stripes, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashMap<K, V, S> {
    pub fn with_buckets_stripes_and_hasher(
        buckets: usize,
        stripes: usize,
        build_hasher: S,
    ) -> Self {
        assert!(buckets > 0, "bucket hint must be positive");
        assert!(stripes > 0, "stripe count must be positive");

        let stripes = stripes.min(buckets);
        let mut groups = Vec::with_capacity(stripes);

        for stripe in 0..stripes {
            // Stripe `s` owns buckets s, s + M, s + 2M, ...
            let share = buckets / stripes + usize::from(stripe < buckets % stripes);
            let mut chains = Vec::with_capacity(share);
            chains.resize_with(share, Bucket::new);

            groups.push(CachePadded::new(Mutex::new(chains.into_boxed_slice())));
        }

        Self {
            stripes: groups.into_boxed_slice(),
            bucket_count: buckets,
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&self, key: K, value: V) -> bool {
        let (stripe, slot) = self.locate(&key);
        let mut chains = self.stripes[stripe].lock();
        let inserted = chains[slot].insert(key, value);

        if inserted {
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        inserted
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        let (stripe, slot) = self.locate(key);

        self.stripes[stripe].lock()[slot].get(key).cloned()
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (stripe, slot) = self.locate(key);
        let mut chains = self.stripes[stripe].lock();
        let removed = chains[slot].remove(key);

        if removed {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn locate<Q>(&self, key: &Q) -> (usize, usize)
    where
        Q: ?Sized + Hash,
    {
        let bucket = (hash_key(&self.build_hasher, key) % self.bucket_count as u64) as usize;

        (bucket % self.stripes.len(), bucket / self.stripes.len())
    }
}

impl<K, V, S> ConcurrentMap<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Striped";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_buckets_stripes_and_hasher(buckets, DEFAULT_STRIPES, S::default())
    }

    fn insert(&self, key: K, value: V) -> bool {
        HashMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        HashMap::get(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        HashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn bucket_count(&self) -> usize {
        HashMap::bucket_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripes_clamp_to_bucket_count() {
        let map = HashMap::<u64, u64>::with_buckets(64);

        assert_eq!(map.stripe_count(), 64);
        assert_eq!(map.bucket_count(), 64);
    }

    #[test]
    fn uneven_stripe_shares_cover_every_bucket() {
        let map = HashMap::<u64, u64>::with_buckets_and_stripes(1000, 7);

        for key in 0..50_000u64 {
            assert!(map.insert(key, !key));
        }

        assert_eq!(map.len(), 50_000);

        for key in 0..50_000u64 {
            assert_eq!(map.get(&key), Some(!key));
        }
    }
}
