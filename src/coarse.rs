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

//! Coarse-grained chained hash table.
//!
//! One global mutex protects the whole bucket vector; readers and writers
//! are not distinguished. This variant is the correctness oracle and the
//! scalability floor every other table is compared against.

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::{Bucket, ConcurrentMap};

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    buckets: Mutex<Box<[Bucket<K, V>]>>,
    build_hasher: S,
    len: AtomicUsize,
    bucket_count: usize,
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
            buckets: Mutex::new(chains.into_boxed_slice()),
            build_hasher,
            len: AtomicUsize::new(0),
            bucket_count: buckets,
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&self, key: K, value: V) -> bool {
        let index = self.index(&key);
        let mut buckets = self.buckets.lock();
        let inserted = buckets[index].insert(key, value);

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
        let index = self.index(key);
        let buckets = self.buckets.lock();

        buckets[index].get(key).cloned()
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.index(key);
        let mut buckets = self.buckets.lock();
        let removed = buckets[index].remove(key);

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

    fn index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (hash_key(&self.build_hasher, key) % self.bucket_count as u64) as usize
    }
}

impl<K, V, S> ConcurrentMap<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Coarse";

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

/// `HashMap` with the global guard pushed onto its own cache line.
///
/// The coarse table's guard sits next to the length counter and hasher in
/// memory; under heavy contention the line holding the guard is already
/// being fought over, so padding it out changes little. The variant exists
/// to quantify exactly that.
pub struct PaddedHashMap<K, V, S = DefaultHashBuilder> {
    buckets: CachePadded<Mutex<Box<[Bucket<K, V>]>>>,
    build_hasher: S,
    len: AtomicUsize,
    bucket_count: usize,
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
        chains.resize_with(buckets, Bucket::new);

        Self {
            buckets: CachePadded::new(Mutex::new(chains.into_boxed_slice())),
            build_hasher,
            len: AtomicUsize::new(0),
            bucket_count: buckets,
        }
    }

    pub fn insert(&self, key: K, value: V) -> bool {
        let index = self.index(&key);
        let mut buckets = self.buckets.lock();
        let inserted = buckets[index].insert(key, value);

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
        let index = self.index(key);
        let buckets = self.buckets.lock();

        buckets[index].get(key).cloned()
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.index(key);
        let mut buckets = self.buckets.lock();
        let removed = buckets[index].remove(key);

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

    fn index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (hash_key(&self.build_hasher, key) % self.bucket_count as u64) as usize
    }
}

impl<K, V, S> ConcurrentMap<K, V> for PaddedHashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Coarse-Padded";

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
