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

//! Fine-grained chained hash tables.
//!
//! Each bucket carries its own mutex. The bucket index is computed before
//! any lock is taken, so operations on distinct buckets never contend. Two
//! layouts are provided: [`HashMap`] stores the guards contiguously, which
//! lets guards of adjacent buckets share a cache line, and [`PaddedHashMap`]
//! pads every guarded bucket out to its own line. Comparing the two under a
//! hot skewed workload is the cheapest way to see false sharing in a profile.
//!
//! Both tables also offer [`increment`](HashMap::increment), an atomic
//! read-modify-write used by the word-count application; a search followed
//! by an insert would race between the two steps, `increment` does both
//! under the bucket guard.

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::{Bucket, ConcurrentMap};

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::ops::AddAssign;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    buckets: Box<[Mutex<Bucket<K, V>>]>,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates a table with `buckets` buckets, each with its own guard.
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
        chains.resize_with(buckets, || Mutex::new(Bucket::new()));

        Self {
            buckets: chains.into_boxed_slice(),
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&self, key: K, value: V) -> bool {
        let index = self.index(&key);
        let mut bucket = self.buckets[index].lock();
        let inserted = bucket.insert(key, value);

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
        self.buckets[self.index(key)].lock().get(key).cloned()
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.index(key);
        let mut bucket = self.buckets[index].lock();
        let removed = bucket.remove(key);

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
        self.buckets.len()
    }

    fn index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (hash_key(&self.build_hasher, key) % self.buckets.len() as u64) as usize
    }
}

impl<K: Hash + Eq, V: AddAssign, S: BuildHasher> HashMap<K, V, S> {
    /// Adds `delta` to the value for `key`, inserting `delta` itself if the
    /// key is absent, atomically with respect to concurrent `increment`s of
    /// the same key. Returns whether a new entry was created.
    pub fn increment(&self, key: K, delta: V) -> bool {
        let index = self.index(&key);
        let mut bucket = self.buckets[index].lock();
        let inserted = bucket.increment(key, delta);

        if inserted {
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        inserted
    }
}

impl<K, V, S> ConcurrentMap<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Fine";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, S::default())
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

/// `HashMap` with each guarded bucket aligned to its own cache line.
pub struct PaddedHashMap<K, V, S = DefaultHashBuilder> {
    buckets: Box<[CachePadded<Mutex<Bucket<K, V>>>]>,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> PaddedHashMap<K, V, DefaultHashBuilder> {
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> PaddedHashMap<K, V, S> {
    pub fn with_buckets_and_hasher(buckets: usize, build_hasher: S) -> Self {
        assert!(buckets > 0, "bucket hint must be positive");

        let mut chains = Vec::with_capacity(buckets);
        chains.resize_with(buckets, || CachePadded::new(Mutex::new(Bucket::new())));

        Self {
            buckets: chains.into_boxed_slice(),
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, key: K, value: V) -> bool {
        let index = self.index(&key);
        let mut bucket = self.buckets[index].lock();
        let inserted = bucket.insert(key, value);

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
        self.buckets[self.index(key)].lock().get(key).cloned()
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.index(key);
        let mut bucket = self.buckets[index].lock();
        let removed = bucket.remove(key);

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
        self.buckets.len()
    }

    fn index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (hash_key(&self.build_hasher, key) % self.buckets.len() as u64) as usize
    }
}

impl<K: Hash + Eq, V: AddAssign, S: BuildHasher> PaddedHashMap<K, V, S> {
    /// See [`HashMap::increment`].
    pub fn increment(&self, key: K, delta: V) -> bool {
        let index = self.index(&key);
        let mut bucket = self.buckets[index].lock();
        let inserted = bucket.increment(key, delta);

        if inserted {
            self.len.fetch_add(1, Ordering::Relaxed);
        }

        inserted
    }
}

impl<K, V, S> ConcurrentMap<K, V> for PaddedHashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Fine-Padded";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, S::default())
    }

    fn insert(&self, key: K, value: V) -> bool {
        PaddedHashMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        PaddedHashMap::get(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        PaddedHashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        PaddedHashMap::len(self)
    }

    fn bucket_count(&self) -> usize {
        PaddedHashMap::bucket_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn concurrent_increments_count_every_call() {
        const THREADS: usize = 8;
        const PER_THREAD: u64 = 10_000;

        let map = HashMap::with_buckets(64);
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                let map = &map;
                let barrier = &barrier;

                s.spawn(move || {
                    barrier.wait();

                    for _ in 0..PER_THREAD {
                        map.increment("hot", 1u64);
                    }
                });
            }
        });

        assert_eq!(map.get("hot"), Some(THREADS as u64 * PER_THREAD));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn increment_inserts_when_absent() {
        let map = PaddedHashMap::with_buckets(16);

        assert!(map.increment("a", 2u64));
        assert!(!map.increment("a", 3));
        assert_eq!(map.get("a"), Some(5));
    }
}
