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

//! The two-phase benchmark workload.
//!
//! Phase one inserts the first half of the key space in parallel. Phase two
//! is the timed mixed phase: each iteration flips a weighted coin to decide
//! read versus write, reads draw their key from a per-thread hotset
//! generator (skewed) or from a modular sweep of the prefilled range
//! (uniform), writes append fresh keys past the prefilled range.
//!
//! Iteration ranges are split into contiguous per-thread chunks up front;
//! workers share nothing but the map itself, so the timings measure the
//! map's synchronization and not the harness's. All seeds are fixed, which
//! makes single-threaded runs bit-reproducible.

use crate::hotset::Hotset;
use crate::sequential;
use crate::table::ConcurrentMap;

use std::ops::Range;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Base seed for the per-thread read/write coin.
pub const COIN_SEED: u64 = 0xC0FFEE;

/// Base seed for the per-thread hotset generators.
pub const HOTSET_SEED: u64 = 12345;

/// Which key distribution drives the read side of the mixed phase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Distribution {
    Uniform,
    Skewed,
}

impl Distribution {
    pub fn label(self) -> &'static str {
        match self {
            Distribution::Uniform => "uniform",
            Distribution::Skewed => "skew",
        }
    }
}

/// One cell of the benchmark matrix.
#[derive(Clone, Copy, Debug)]
pub struct Workload {
    pub threads: usize,
    pub total_ops: usize,
    pub read_ratio: f64,
    pub distribution: Distribution,
    pub buckets: usize,
    /// Probability of a skewed read hitting the hot band. Ignored under
    /// [`Distribution::Uniform`].
    pub p_hot: f64,
    /// Hot band size as a fraction of the prefilled key range.
    pub hot_frac: f64,
}

/// Splits `0..len` into `threads` contiguous chunks, the way a static
/// parallel-for schedule would.
fn partition(len: usize, threads: usize) -> Vec<Range<usize>> {
    let threads = threads.max(1);
    let chunk = len / threads;
    let remainder = len % threads;
    let mut ranges = Vec::with_capacity(threads);
    let mut start = 0;

    for index in 0..threads {
        let end = start + chunk + usize::from(index < remainder);
        ranges.push(start..end);
        start = end;
    }

    ranges
}

fn thread_seed(base: u64, tid: usize) -> u64 {
    base ^ (tid as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Runs the two-phase workload against a fresh `M`, returning the
/// wall-clock duration of the mixed phase only.
pub fn run_workload<M: ConcurrentMap<u64, u64>>(workload: &Workload) -> Duration {
    let map = M::with_buckets_for_threads(workload.buckets, workload.threads);
    let initial = workload.total_ops / 2;
    let mixed = workload.total_ops - initial;
    let read_ratio = workload.read_ratio;
    let distribution = workload.distribution;
    let p_hot = workload.p_hot;
    let universe = (initial as u64).max(1);
    let hot_band = ((initial as f64 * workload.hot_frac) as u64).max(1);

    thread::scope(|s| {
        for range in partition(initial, workload.threads) {
            let map = &map;

            s.spawn(move || {
                for i in range {
                    map.insert(i as u64, i as u64 * 2);
                }
            });
        }
    });

    let start = Instant::now();

    thread::scope(|s| {
        for (tid, range) in partition(mixed, workload.threads).into_iter().enumerate() {
            let map = &map;

            s.spawn(move || {
                let mut coin = SmallRng::seed_from_u64(COIN_SEED + tid as u64);
                let mut hotset =
                    Hotset::new(universe, hot_band, p_hot, thread_seed(HOTSET_SEED, tid));

                for i in range {
                    if coin.gen::<f64>() < read_ratio {
                        let key = match distribution {
                            Distribution::Skewed => hotset.draw(),
                            Distribution::Uniform => i as u64 % universe,
                        };

                        let _ = map.get(&key);
                    } else {
                        map.insert((initial + i) as u64, i as u64);
                    }
                }
            });
        }
    });

    start.elapsed()
}

/// Runs the same workload single-threaded against the unsynchronized
/// baseline table. This is what speedups are measured against.
pub fn run_workload_sequential(workload: &Workload) -> Duration {
    let mut map = sequential::HashMap::with_buckets(workload.buckets);
    let initial = workload.total_ops / 2;
    let mixed = workload.total_ops - initial;
    let universe = (initial as u64).max(1);
    let hot_band = ((initial as f64 * workload.hot_frac) as u64).max(1);

    for i in 0..initial {
        map.insert(i as u64, i as u64 * 2);
    }

    let mut coin = SmallRng::seed_from_u64(COIN_SEED);
    let mut hotset = Hotset::new(universe, hot_band, workload.p_hot, thread_seed(HOTSET_SEED, 0));
    let start = Instant::now();

    for i in 0..mixed {
        if coin.gen::<f64>() < workload.read_ratio {
            let key = match workload.distribution {
                Distribution::Skewed => hotset.draw(),
                Distribution::Uniform => i as u64 % universe,
            };

            let _ = map.get(&key);
        } else {
            map.insert((initial + i) as u64, i as u64);
        }
    }

    start.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adaptive, coarse, fine, lockfree, segmented, striped};

    #[test]
    fn partition_covers_range_contiguously() {
        for len in [0, 1, 7, 100, 101] {
            for threads in [1, 2, 3, 8, 16] {
                let ranges = partition(len, threads);
                assert_eq!(ranges.len(), threads);

                let mut expected = 0;

                for range in &ranges {
                    assert_eq!(range.start, expected);
                    expected = range.end;
                }

                assert_eq!(expected, len);

                let (min, max) = ranges
                    .iter()
                    .map(Range::len)
                    .fold((usize::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn thread_seeds_are_distinct() {
        let seeds: Vec<_> = (0..16).map(|tid| thread_seed(HOTSET_SEED, tid)).collect();

        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }

        assert_eq!(thread_seed(HOTSET_SEED, 0), HOTSET_SEED);
    }

    #[test]
    fn mixed_phase_runs_against_every_kind_of_map() {
        let workload = Workload {
            threads: 4,
            total_ops: 20_000,
            read_ratio: 0.8,
            distribution: Distribution::Skewed,
            buckets: 1024,
            p_hot: 0.9,
            hot_frac: 0.1,
        };

        run_workload::<coarse::HashMap<u64, u64>>(&workload);
        run_workload::<fine::HashMap<u64, u64>>(&workload);
        run_workload::<segmented::HashMap<u64, u64>>(&workload);
        run_workload::<striped::HashMap<u64, u64>>(&workload);
        run_workload::<adaptive::HashMap<u64, u64>>(&workload);
        run_workload::<lockfree::HashMap<u64, u64>>(&workload);
        run_workload_sequential(&workload);
    }

    #[test]
    fn uniform_workload_handles_single_thread() {
        let workload = Workload {
            threads: 1,
            total_ops: 10_000,
            read_ratio: 0.5,
            distribution: Distribution::Uniform,
            buckets: 512,
            p_hot: 0.0,
            hot_frac: 0.1,
        };

        run_workload::<coarse::HashMap<u64, u64>>(&workload);
    }
}
