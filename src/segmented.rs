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

//! Segmented chained hash tables.
//!
//! The table is partitioned into a fixed number of segments, each owning a
//! contiguous slice of buckets and a single guard. Operations on distinct
//! segments never contend; an operation serializes its whole segment.
//!
//! The low bits of a key's hash select the segment and the remaining bits
//! (`(h / segments) % buckets_per_segment`) select the bucket within it. If
//! both selections used the same low bits, every segment would concentrate
//! its keys in a handful of buckets whenever the two moduli shared factors;
//! dividing first makes the two choices independent.
//!
//! Three layouts:
//!
//! * [`HashMap`] — segments allocated back to back.
//! * [`PaddedHashMap`] — each segment aligned to its own cache line, so
//!   guards of neighboring segments never share one.
//! * [`ExactHashMap`] — distributes the requested bucket count across
//!   segments without over-allocation; segments receive `⌊B/S⌋` or `⌈B/S⌉`
//!   buckets so the effective count equals the request (when the request is
//!   at least the segment count).

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::{Bucket, ConcurrentMap};

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// Segment count used by the `with_buckets` constructors.
pub const DEFAULT_SEGMENTS: usize = 16;

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    segments: Box<[Mutex<Box<[Bucket<K, V>]>>]>,
    buckets_per_segment: usize,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates a table with [`DEFAULT_SEGMENTS`] segments and at least
    /// `buckets` buckets in total.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_segments_and_buckets(DEFAULT_SEGMENTS, buckets)
    }

    /// Creates a table with `segments` segments, each holding
    /// `max(1, buckets / segments)` buckets.
    pub fn with_segments_and_buckets(segments: usize, buckets: usize) -> Self {
        Self::with_segments_buckets_and_hasher(segments, buckets, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashMap<K, V, S> {
    pub fn with_segments_buckets_and_hasher(
        segments: usize,
        buckets: usize,
        build_hasher: S,
    ) -> Self {
        assert!(segments > 0, "segment count must be positive");
        assert!(buckets > 0, "bucket hint must be positive");

        let buckets_per_segment = (buckets / segments).max(1);
        let mut slices = Vec::with_capacity(segments);

        slices.resize_with(segments, || {
            let mut chains = Vec::with_capacity(buckets_per_segment);
            chains.resize_with(buckets_per_segment, Bucket::new);

            Mutex::new(chains.into_boxed_slice())
        });

        Self {
            segments: slices.into_boxed_slice(),
            buckets_per_segment,
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&self, key: K, value: V) -> bool {
        let (segment, bucket) = self.locate(&key);
        let mut chains = self.segments[segment].lock();
        let inserted = chains[bucket].insert(key, value);

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
        let (segment, bucket) = self.locate(key);

        self.segments[segment].lock()[bucket].get(key).cloned()
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (segment, bucket) = self.locate(key);
        let mut chains = self.segments[segment].lock();
        let removed = chains[bucket].remove(key);

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

    /// The bucket count actually allocated; the construction-time hint
    /// rounds down to a multiple of the segment count.
    pub fn bucket_count(&self) -> usize {
        self.segments.len() * self.buckets_per_segment
    }

    fn locate<Q>(&self, key: &Q) -> (usize, usize)
    where
        Q: ?Sized + Hash,
    {
        let hash = hash_key(&self.build_hasher, key);
        let segments = self.segments.len() as u64;
        let segment = (hash % segments) as usize;
        let bucket = ((hash / segments) % self.buckets_per_segment as u64) as usize;

        (segment, bucket)
    }
}

impl<K, V, S> ConcurrentMap<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Segment";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_segments_buckets_and_hasher(DEFAULT_SEGMENTS, buckets, S::default())
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

/// `HashMap` with each segment aligned to its own cache line.
pub struct PaddedHashMap<K, V, S = DefaultHashBuilder> {
    segments: Box<[CachePadded<Mutex<Box<[Bucket<K, V>]>>>]>,
    buckets_per_segment: usize,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> PaddedHashMap<K, V, DefaultHashBuilder> {
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_segments_and_buckets(DEFAULT_SEGMENTS, buckets)
    }

    pub fn with_segments_and_buckets(segments: usize, buckets: usize) -> Self {
        Self::with_segments_buckets_and_hasher(segments, buckets, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> PaddedHashMap<K, V, S> {
    pub fn with_segments_buckets_and_hasher(
        segments: usize,
        buckets: usize,
        build_hasher: S,
    ) -> Self {
        assert!(segments > 0, "segment count must be positive");
        assert!(buckets > 0, "bucket hint must be positive");

        let buckets_per_segment = (buckets / segments).max(1);
        let mut slices = Vec::with_capacity(segments);

        slices.resize_with(segments, || {
            let mut chains = Vec::with_capacity(buckets_per_segment);
            chains.resize_with(buckets_per_segment, Bucket::new);

            CachePadded::new(Mutex::new(chains.into_boxed_slice()))
        });

        Self {
            segments: slices.into_boxed_slice(),
            buckets_per_segment,
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, key: K, value: V) -> bool {
        let (segment, bucket) = self.locate(&key);
        let mut chains = self.segments[segment].lock();
        let inserted = chains[bucket].insert(key, value);

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
        let (segment, bucket) = self.locate(key);

        self.segments[segment].lock()[bucket].get(key).cloned()
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (segment, bucket) = self.locate(key);
        let mut chains = self.segments[segment].lock();
        let removed = chains[bucket].remove(key);

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
        self.segments.len() * self.buckets_per_segment
    }

    fn locate<Q>(&self, key: &Q) -> (usize, usize)
    where
        Q: ?Sized + Hash,
    {
        let hash = hash_key(&self.build_hasher, key);
        let segments = self.segments.len() as u64;
        let segment = (hash % segments) as usize;
        let bucket = ((hash / segments) % self.buckets_per_segment as u64) as usize;

        (segment, bucket)
    }
}

impl<K, V, S> ConcurrentMap<K, V> for PaddedHashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Segment-Padded";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_segments_buckets_and_hasher(DEFAULT_SEGMENTS, buckets, S::default())
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

/// Segmented table that allocates exactly the requested bucket count.
///
/// Segments receive `⌊B/S⌋` or `⌈B/S⌉` buckets (the first `B mod S`
/// segments take the larger share), so no memory is spent beyond the hint.
/// Requests smaller than the segment count round up to one bucket per
/// segment.
pub struct ExactHashMap<K, V, S = DefaultHashBuilder> {
    segments: Box<[CachePadded<Mutex<Box<[Bucket<K, V>]>>>]>,
    bucket_count: usize,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> ExactHashMap<K, V, DefaultHashBuilder> {
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_segments_and_buckets(DEFAULT_SEGMENTS, buckets)
    }

    pub fn with_segments_and_buckets(segments: usize, buckets: usize) -> Self {
        Self::with_segments_buckets_and_hasher(segments, buckets, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ExactHashMap<K, V, S> {
    pub fn with_segments_buckets_and_hasher(
        segments: usize,
        buckets: usize,
        build_hasher: S,
    ) -> Self {
        assert!(segments > 0, "segment count must be positive");
        assert!(buckets > 0, "bucket hint must be positive");

        let base = buckets / segments;
        let remainder = buckets % segments;
        let mut bucket_count = 0;
        let mut slices = Vec::with_capacity(segments);

        for i in 0..segments {
            let share = (base + usize::from(i < remainder)).max(1);
            bucket_count += share;

            let mut chains = Vec::with_capacity(share);
            chains.resize_with(share, Bucket::new);
            slices.push(CachePadded::new(Mutex::new(chains.into_boxed_slice())));
        }

        Self {
            segments: slices.into_boxed_slice(),
            bucket_count,
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, key: K, value: V) -> bool {
        let (segment, offset) = self.locate(&key);
        let mut chains = self.segments[segment].lock();
        let bucket = (offset % chains.len() as u64) as usize;
        let inserted = chains[bucket].insert(key, value);

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
        let (segment, offset) = self.locate(key);
        let chains = self.segments[segment].lock();
        let bucket = (offset % chains.len() as u64) as usize;

        chains[bucket].get(key).cloned()
    }

    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (segment, offset) = self.locate(key);
        let mut chains = self.segments[segment].lock();
        let bucket = (offset % chains.len() as u64) as usize;
        let removed = chains[bucket].remove(key);

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

    /// Equal to the construction-time hint whenever the hint was at least
    /// the segment count.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Segment index and the undivided in-segment offset. Segment sizes
    /// vary, so the final modulo happens against the locked slice.
    fn locate<Q>(&self, key: &Q) -> (usize, u64)
    where
        Q: ?Sized + Hash,
    {
        let hash = hash_key(&self.build_hasher, key);
        let segments = self.segments.len() as u64;

        ((hash % segments) as usize, hash / segments)
    }
}

impl<K, V, S> ConcurrentMap<K, V> for ExactHashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Segment-Exact";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_segments_buckets_and_hasher(DEFAULT_SEGMENTS, buckets, S::default())
    }

    fn insert(&self, key: K, value: V) -> bool {
        ExactHashMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        ExactHashMap::get(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        ExactHashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        ExactHashMap::len(self)
    }

    fn bucket_count(&self) -> usize {
        ExactHashMap::bucket_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rounds_down_to_segment_multiple() {
        let map = HashMap::<u64, u64>::with_buckets(1000);

        assert_eq!(map.bucket_count(), 62 * 16);
    }

    #[test]
    fn exact_matches_request() {
        for buckets in [16, 100, 1000, 16384] {
            let map = ExactHashMap::<u64, u64>::with_buckets(buckets);

            assert_eq!(map.bucket_count(), buckets);
        }
    }

    #[test]
    fn exact_rounds_tiny_requests_up() {
        let map = ExactHashMap::<u64, u64>::with_buckets(3);

        assert_eq!(map.bucket_count(), DEFAULT_SEGMENTS);
    }

    #[test]
    fn values_survive_segment_routing() {
        let map = ExactHashMap::with_buckets(100);

        for key in 0..10_000u64 {
            assert!(map.insert(key, key + 1));
        }

        assert_eq!(map.len(), 10_000);

        for key in 0..10_000u64 {
            assert_eq!(map.get(&key), Some(key + 1));
        }
    }
}
