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

//! Fixed-capacity concurrent hash maps under a spectrum of locking
//! granularities, with a reproducible scaling benchmark matrix.
//!
//! Every table exposes the same contract — `insert` / `get` / `remove` /
//! `len` over a bucket count fixed at construction — and differs only in
//! how mutation is serialized:
//!
//! * [`sequential`] — no synchronization; the single-thread baseline.
//! * [`coarse`] — one global mutex.
//! * [`fine`] — one mutex per bucket (plus a cache-line-padded twin).
//! * [`segmented`] — one mutex per segment of buckets (padded and
//!   exact-allocation twins).
//! * [`striped`] — `B` buckets sharing `M < B` stripe mutexes.
//! * [`adaptive`] — segments carrying a construction-time-chosen number of
//!   internal stripe locks.
//! * [`lockfree`] — per-bucket CAS chains with epoch-based reclamation.
//!
//! The [`bench`] module drives any of them through a two-phase workload
//! (parallel prefill, then a timed mixed read/write phase with uniform or
//! hotset-skewed keys) and sweeps thread counts, bucket counts, read mixes,
//! and skew to produce a CSV of throughput and speedup. None of the tables
//! resize; capacity questions are answered by the bucket-count sweep, not
//! by rehashing.

pub mod adaptive;
pub mod bench;
pub mod coarse;
pub mod error;
pub mod fine;
pub mod hash;
pub mod hotset;
pub mod lockfree;
pub mod segmented;
pub mod sequential;
pub mod striped;
pub mod table;

pub use error::Error;
pub use hash::DefaultHashBuilder;
pub use hotset::Hotset;
pub use table::ConcurrentMap;

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Barrier;
    use std::thread;

    /// Single-threaded contract shared by every variant: overwrite
    /// semantics, lookups, removal, and the size counter.
    fn check_contract<M: ConcurrentMap<u64, u64>>() {
        let map = M::with_buckets_for_threads(128, 1);

        assert!(map.insert(1, 100));
        assert!(map.insert(2, 200));
        assert!(!map.insert(1, 150));
        assert_eq!(map.len(), 2);

        assert_eq!(map.get(&1), Some(150));
        assert_eq!(map.get(&2), Some(200));
        assert_eq!(map.get(&99), None);

        assert!(map.remove(&1));
        assert_eq!(map.get(&1), None);
        assert_eq!(map.len(), 1);
        assert!(!map.remove(&99));

        assert!(map.remove(&2));
        assert!(map.is_empty());
        assert!(map.bucket_count() > 0);
    }

    /// N distinct inserts then M removes leave exactly N - M entries.
    fn check_size_conservation<M: ConcurrentMap<u64, u64>>() {
        let map = M::with_buckets_for_threads(256, 1);

        for key in 0..1000 {
            assert!(map.insert(key, key));
        }

        assert_eq!(map.len(), 1000);

        for key in 0..400 {
            assert!(map.remove(&key));
        }

        assert_eq!(map.len(), 600);

        for key in 0..1000 {
            assert_eq!(map.get(&key).is_some(), key >= 400);
        }
    }

    /// Concurrent inserts of disjoint key ranges are lossless: T threads
    /// inserting N keys each leave T*N searchable entries.
    fn check_disjoint_parallel_inserts<M: ConcurrentMap<u64, u64>>() {
        const THREADS: usize = 4;
        const PER_THREAD: u64 = 1000;

        let map = M::with_buckets_for_threads(1024, THREADS);
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for t in 0..THREADS as u64 {
                let map = &map;
                let barrier = &barrier;

                s.spawn(move || {
                    barrier.wait();

                    for i in 0..PER_THREAD {
                        let key = t * PER_THREAD + i;
                        assert!(map.insert(key, key * 10));
                    }
                });
            }
        });

        assert_eq!(map.len(), THREADS * PER_THREAD as usize);

        for key in 0..THREADS as u64 * PER_THREAD {
            assert_eq!(map.get(&key), Some(key * 10));
        }
    }

    /// Readers racing a writer on one key only ever observe values that
    /// writer actually stored, in storage order.
    fn check_per_key_write_visibility<M: ConcurrentMap<u64, u64>>() {
        const ROUNDS: u64 = 10_000;

        let map = M::with_buckets_for_threads(64, 3);
        map.insert(42, 0);

        let barrier = Barrier::new(3);

        thread::scope(|s| {
            let map = &map;
            let barrier = &barrier;

            s.spawn(move || {
                barrier.wait();

                for round in 1..=ROUNDS {
                    map.insert(42, round);
                }
            });

            for _ in 0..2 {
                s.spawn(move || {
                    barrier.wait();

                    let mut last = 0;

                    for _ in 0..ROUNDS {
                        let value = map.get(&42).unwrap();
                        assert!(value <= ROUNDS);
                        // Overwrites of one key are serialized, so observed
                        // values never run backwards.
                        assert!(value >= last);
                        last = value;
                    }
                });
            }
        });

        assert_eq!(map.get(&42), Some(ROUNDS));
        assert_eq!(map.len(), 1);
    }

    macro_rules! variant_tests {
        ($module:ident, $map:ty) => {
            mod $module {
                use super::*;

                #[test]
                fn contract() {
                    check_contract::<$map>();
                }

                #[test]
                fn size_conservation() {
                    check_size_conservation::<$map>();
                }

                #[test]
                fn disjoint_parallel_inserts() {
                    check_disjoint_parallel_inserts::<$map>();
                }

                #[test]
                fn per_key_write_visibility() {
                    check_per_key_write_visibility::<$map>();
                }
            }
        };
    }

    variant_tests!(coarse_map, coarse::HashMap<u64, u64>);
    variant_tests!(coarse_padded_map, coarse::PaddedHashMap<u64, u64>);
    variant_tests!(fine_map, fine::HashMap<u64, u64>);
    variant_tests!(fine_padded_map, fine::PaddedHashMap<u64, u64>);
    variant_tests!(segmented_map, segmented::HashMap<u64, u64>);
    variant_tests!(segmented_padded_map, segmented::PaddedHashMap<u64, u64>);
    variant_tests!(segmented_exact_map, segmented::ExactHashMap<u64, u64>);
    variant_tests!(striped_map, striped::HashMap<u64, u64>);
    variant_tests!(adaptive_map, adaptive::HashMap<u64, u64>);
    variant_tests!(lockfree_map, lockfree::HashMap<u64, u64>);
}
