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

//! Adaptive-granularity chained hash table.
//!
//! Combines segment partitioning with intra-segment lock striping. Segments
//! bound the set of cache lines a burst of operations can touch; the `K`
//! stripe guards inside each segment still admit parallel writers when a
//! segment runs hot. `K` is sized once, at construction, from the expected
//! thread count: `next_power_of_two(threads / STRIPE_FACTOR)`, clamped to
//! `[1, MAX_STRIPES]` and to at most the segment's bucket count. Bucket `b`
//! of a segment belongs to stripe `b & (K - 1)`; the mapping never changes,
//! so the stripe-covers-bucket invariant is static.
//!
//! Buckets are distributed exactly: segments receive `⌊B/S⌋` or `⌈B/S⌉`
//! buckets and the effective total equals the request (for requests of at
//! least [`NUM_SEGMENTS`] buckets).

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::{Bucket, ConcurrentMap};

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// Fixed segment count.
pub const NUM_SEGMENTS: usize = 128;

/// Stripe guards per segment target `threads / STRIPE_FACTOR`.
pub const STRIPE_FACTOR: usize = 2;

/// Upper bound on stripe guards per segment.
pub const MAX_STRIPES: usize = 32;

struct Segment<K, V> {
    stripes: Box<[CachePadded<Mutex<Box<[Bucket<K, V>]>>>]>,
    buckets_per_segment: usize,
    stripe_mask: usize,
}

impl<K: Eq, V> Segment<K, V> {
    fn new(buckets_per_segment: usize, stripe_count: usize) -> Self {
        debug_assert!(stripe_count.is_power_of_two());
        debug_assert!(stripe_count <= buckets_per_segment);

        let mut stripes = Vec::with_capacity(stripe_count);

        for stripe in 0..stripe_count {
            // Stripe `s` owns in-segment buckets s, s + K, s + 2K, ...
            let share = buckets_per_segment / stripe_count
                + usize::from(stripe < buckets_per_segment % stripe_count);
            let mut chains = Vec::with_capacity(share);
            chains.resize_with(share, Bucket::new);

            stripes.push(CachePadded::new(Mutex::new(chains.into_boxed_slice())));
        }

        Self {
            stripes: stripes.into_boxed_slice(),
            buckets_per_segment,
            stripe_mask: stripe_count - 1,
        }
    }
}

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    segments: Box<[Segment<K, V>]>,
    bucket_count: usize,
    stripes_per_segment: usize,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates a table sized for as many threads as the machine has CPUs.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_threads_and_hasher(buckets, 0, DefaultHashBuilder::default())
    }

    /// Creates a table tuned for `threads` concurrent callers. A zero
    /// thread hint means "as many as the machine has CPUs".
    pub fn with_buckets_and_threads(buckets: usize, threads: usize) -> Self {
        Self::with_buckets_threads_and_hasher(buckets, threads, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashMap<K, V, S> {
    pub fn with_buckets_threads_and_hasher(buckets: usize, threads: usize, build_hasher: S) -> Self {
        assert!(buckets > 0, "bucket hint must be positive");

        let threads = if threads == 0 {
            num_cpus::get()
        } else {
            threads
        };

        let base = buckets / NUM_SEGMENTS;
        let remainder = buckets % NUM_SEGMENTS;
        let mut bucket_count = 0;
        let mut segments = Vec::with_capacity(NUM_SEGMENTS);
        let mut stripes_per_segment = 1;

        for i in 0..NUM_SEGMENTS {
            let share = (base + usize::from(i < remainder)).max(1);
            let stripe_count = choose_stripes(share, threads);
            bucket_count += share;
            stripes_per_segment = stripes_per_segment.max(stripe_count);

            segments.push(Segment::new(share, stripe_count));
        }

        Self {
            segments: segments.into_boxed_slice(),
            bucket_count,
            stripes_per_segment,
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&self, key: K, value: V) -> bool {
        let (segment, stripe, slot) = self.locate(&key);
        let mut chains = segment.stripes[stripe].lock();
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
        let (segment, stripe, slot) = self.locate(key);

        segment.stripes[stripe].lock()[slot].get(key).cloned()
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (segment, stripe, slot) = self.locate(key);
        let mut chains = segment.stripes[stripe].lock();
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

    /// The largest stripe count chosen for any segment.
    pub fn stripes_per_segment(&self) -> usize {
        self.stripes_per_segment
    }

    fn locate<Q>(&self, key: &Q) -> (&Segment<K, V>, usize, usize)
    where
        Q: ?Sized + Hash,
    {
        let hash = hash_key(&self.build_hasher, key);
        let segment = &self.segments[(hash % NUM_SEGMENTS as u64) as usize];
        let bucket =
            ((hash / NUM_SEGMENTS as u64) % segment.buckets_per_segment as u64) as usize;
        let stripe = bucket & segment.stripe_mask;
        let slot = bucket / (segment.stripe_mask + 1);

        (segment, stripe, slot)
    }
}

fn choose_stripes(buckets_per_segment: usize, threads: usize) -> usize {
    let mut stripes = (threads / STRIPE_FACTOR)
        .max(1)
        .next_power_of_two()
        .min(MAX_STRIPES);

    // Cannot exceed the segment's bucket count; stay a power of two.
    while stripes > buckets_per_segment && stripes > 1 {
        stripes >>= 1;
    }

    stripes
}

impl<K, V, S> ConcurrentMap<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "AGH";

    fn with_buckets_for_threads(buckets: usize, threads: usize) -> Self {
        Self::with_buckets_threads_and_hasher(buckets, threads, S::default())
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
    fn stripe_choice_tracks_thread_count() {
        assert_eq!(choose_stripes(1024, 1), 1);
        assert_eq!(choose_stripes(1024, 2), 1);
        assert_eq!(choose_stripes(1024, 4), 2);
        assert_eq!(choose_stripes(1024, 6), 4);
        assert_eq!(choose_stripes(1024, 16), 8);
        assert_eq!(choose_stripes(1024, 256), MAX_STRIPES);
    }

    #[test]
    fn stripe_choice_clamps_to_segment_size() {
        assert_eq!(choose_stripes(2, 256), 2);
        assert_eq!(choose_stripes(1, 256), 1);
        assert_eq!(choose_stripes(3, 256), 2);
    }

    #[test]
    fn exact_bucket_distribution() {
        for buckets in [128, 1000, 16384, 65536] {
            let map = HashMap::<u64, u64>::with_buckets_and_threads(buckets, 8);

            assert_eq!(map.bucket_count(), buckets);
        }
    }

    #[test]
    fn routing_is_consistent() {
        let map = HashMap::with_buckets_and_threads(16384, 16);

        for key in 0..20_000u64 {
            assert!(map.insert(key, key * 3));
        }

        assert_eq!(map.len(), 20_000);

        for key in 0..20_000u64 {
            assert_eq!(map.get(&key), Some(key * 3));
        }

        for key in 0..10_000u64 {
            assert!(map.remove(&key));
        }

        assert_eq!(map.len(), 10_000);
    }
}
