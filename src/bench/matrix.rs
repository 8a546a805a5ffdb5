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

//! The sweep matrix and its CSV output.

use crate::bench::workload::{run_workload, run_workload_sequential, Distribution, Workload};
use crate::table::ConcurrentMap;

use std::collections::HashMap;
use std::env;
use std::fmt;

/// Header of the emitted CSV block. Order-sensitive; downstream plotting
/// scripts index columns by position.
pub const CSV_HEADER: &str =
    "impl,mode,mix,dist,threads,ops,bucket_count,read_ratio,p_hot,time_s,throughput_mops,speedup,seq_baseline_s";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ScalingMode {
    /// Fixed total work; thread count varies.
    Strong,
    /// Per-thread work fixed; total work grows with the thread count.
    Weak,
}

impl ScalingMode {
    pub fn label(self) -> &'static str {
        match self {
            ScalingMode::Strong => "strong",
            ScalingMode::Weak => "weak",
        }
    }

    fn ops(self, config: &MatrixConfig, threads: usize) -> usize {
        match self {
            ScalingMode::Strong => config.strong_ops,
            ScalingMode::Weak => config.weak_ops_per_thread * threads,
        }
    }
}

fn mix_label(read_ratio: f64) -> &'static str {
    if read_ratio == 0.8 {
        "80/20"
    } else if read_ratio == 0.5 {
        "50/50"
    } else if read_ratio == 0.95 {
        "95/5"
    } else {
        "mix"
    }
}

/// One emitted datapoint.
#[derive(Clone, Debug)]
pub struct Row {
    pub impl_name: &'static str,
    pub mode: ScalingMode,
    pub distribution: Distribution,
    pub threads: usize,
    pub ops: usize,
    pub buckets: usize,
    pub read_ratio: f64,
    pub p_hot: f64,
    pub time_s: f64,
    pub throughput_mops: f64,
    pub speedup: f64,
    pub seq_baseline_s: f64,
}

impl Row {
    pub fn csv(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{:.2},{:.2},{:.6},{:.3},{:.3},{:.6}",
            self.impl_name,
            self.mode.label(),
            mix_label(self.read_ratio),
            self.distribution.label(),
            self.threads,
            self.ops,
            self.buckets,
            self.read_ratio,
            self.p_hot,
            self.time_s,
            self.throughput_mops,
            self.speedup,
            self.seq_baseline_s,
        )
    }

    /// The fields that do not depend on wall-clock time; two runs with the
    /// same seeds agree on these exactly.
    pub fn deterministic_fields(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{:.2},{:.2}",
            self.impl_name,
            self.mode.label(),
            mix_label(self.read_ratio),
            self.distribution.label(),
            self.threads,
            self.ops,
            self.buckets,
            self.read_ratio,
            self.p_hot,
        )
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<14} {:<6} {:>6} {:>7}  T={:2} ops={:8} buckets={:7}",
            self.impl_name,
            self.mode.label(),
            mix_label(self.read_ratio),
            self.distribution.label(),
            self.threads,
            self.ops,
            self.buckets,
        )?;

        if self.distribution == Distribution::Skewed {
            write!(f, " p_hot={:4.2}", self.p_hot)?;
        }

        write!(
            f,
            "  time={:.4}  thr={:.2} Mops  speedup={:.2}",
            self.time_s, self.throughput_mops, self.speedup
        )
    }
}

/// The full sweep both benchmark binaries iterate.
#[derive(Clone, Debug)]
pub struct MatrixConfig {
    pub threads: Vec<usize>,
    pub strong_ops: usize,
    pub weak_ops_per_thread: usize,
    pub read_ratios: Vec<f64>,
    pub buckets: Vec<usize>,
    pub p_hots: Vec<f64>,
    pub hot_frac: f64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            threads: vec![1, 2, 4, 8, 16],
            strong_ops: 2_000_000,
            weak_ops_per_thread: 250_000,
            read_ratios: vec![0.8, 0.5],
            buckets: vec![8192, 16384, 65536],
            p_hots: vec![0.7, 0.9, 0.99],
            hot_frac: 0.10,
        }
    }
}

impl MatrixConfig {
    /// The wider bucket sweep used by the single-implementation binary.
    pub fn wide_buckets() -> Self {
        Self {
            buckets: vec![16384, 65536, 262_144, 1_048_576],
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct BaselineKey {
    mode: ScalingMode,
    read_ratio_bits: u64,
    distribution: Distribution,
    buckets: usize,
    p_hot_bits: u64,
    ops: usize,
}

/// Per-configuration sequential baseline times.
///
/// The first datapoint for a configuration pays for one single-threaded run
/// of the unsynchronized table; every later datapoint with the same
/// configuration reuses the stored time, so speedups within a configuration
/// share one denominator.
pub struct BaselineCache {
    hot_frac: f64,
    times: HashMap<BaselineKey, f64>,
}

impl BaselineCache {
    pub fn new(hot_frac: f64) -> Self {
        Self {
            hot_frac,
            times: HashMap::new(),
        }
    }

    pub fn time_for(
        &mut self,
        mode: ScalingMode,
        read_ratio: f64,
        distribution: Distribution,
        buckets: usize,
        p_hot: f64,
        ops: usize,
    ) -> f64 {
        let key = BaselineKey {
            mode,
            read_ratio_bits: read_ratio.to_bits(),
            distribution,
            buckets,
            p_hot_bits: p_hot.to_bits(),
            ops,
        };

        if let Some(&time) = self.times.get(&key) {
            return time;
        }

        log::info!(
            "sequential baseline: mode={} mix={} dist={} buckets={} p_hot={:.2} ops={}",
            mode.label(),
            mix_label(read_ratio),
            distribution.label(),
            buckets,
            p_hot,
            ops
        );

        let workload = Workload {
            threads: 1,
            total_ops: ops,
            read_ratio,
            distribution,
            buckets,
            p_hot,
            hot_frac: self.hot_frac,
        };

        let time = run_workload_sequential(&workload).as_secs_f64();
        self.times.insert(key, time);

        time
    }
}

/// Runs the strong and weak sweeps for one implementation, appending a row
/// per datapoint and logging each to stdout as it lands.
pub fn sweep<M: ConcurrentMap<u64, u64>>(
    config: &MatrixConfig,
    baselines: &mut BaselineCache,
    rows: &mut Vec<Row>,
) {
    log::info!("sweeping {}", M::NAME);

    for mode in [ScalingMode::Strong, ScalingMode::Weak] {
        for &read_ratio in &config.read_ratios {
            for &buckets in &config.buckets {
                for &threads in &config.threads {
                    run_one::<M>(
                        config,
                        baselines,
                        mode,
                        read_ratio,
                        buckets,
                        Distribution::Uniform,
                        0.0,
                        threads,
                        rows,
                    );
                }

                for &p_hot in &config.p_hots {
                    for &threads in &config.threads {
                        run_one::<M>(
                            config,
                            baselines,
                            mode,
                            read_ratio,
                            buckets,
                            Distribution::Skewed,
                            p_hot,
                            threads,
                            rows,
                        );
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_one<M: ConcurrentMap<u64, u64>>(
    config: &MatrixConfig,
    baselines: &mut BaselineCache,
    mode: ScalingMode,
    read_ratio: f64,
    buckets: usize,
    distribution: Distribution,
    p_hot: f64,
    threads: usize,
    rows: &mut Vec<Row>,
) {
    let ops = mode.ops(config, threads);
    let baseline = baselines.time_for(mode, read_ratio, distribution, buckets, p_hot, ops);
    let workload = Workload {
        threads,
        total_ops: ops,
        read_ratio,
        distribution,
        buckets,
        p_hot,
        hot_frac: config.hot_frac,
    };

    let time_s = run_workload::<M>(&workload).as_secs_f64();
    let row = Row {
        impl_name: M::NAME,
        mode,
        distribution,
        threads,
        ops,
        buckets,
        read_ratio,
        p_hot,
        time_s,
        throughput_mops: ops as f64 / time_s / 1e6,
        speedup: baseline / time_s,
        seq_baseline_s: baseline,
    };

    println!("{row}");
    rows.push(row);
}

/// Emits the bracketed CSV block to stdout.
pub fn print_csv(rows: &[Row]) {
    println!("CSV_RESULTS_BEGIN");
    println!("{CSV_HEADER}");

    for row in rows {
        println!("{}", row.csv());
    }

    println!("CSV_RESULTS_END");
}

/// Echoes the thread-binding environment to stderr, so a CSV can be traced
/// back to how its run was pinned.
pub fn echo_affinity_env() {
    let bind = env::var("OMP_PROC_BIND").unwrap_or_else(|_| "(null)".to_owned());
    let places = env::var("OMP_PLACES").unwrap_or_else(|_| "(null)".to_owned());

    eprintln!("OMP_PROC_BIND={bind}  OMP_PLACES={places}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coarse;

    fn tiny_config() -> MatrixConfig {
        MatrixConfig {
            threads: vec![1],
            strong_ops: 2000,
            weak_ops_per_thread: 1000,
            read_ratios: vec![0.8],
            buckets: vec![256],
            p_hots: vec![0.9],
            hot_frac: 0.10,
        }
    }

    #[test]
    fn csv_row_formatting_is_stable() {
        let row = Row {
            impl_name: "Coarse",
            mode: ScalingMode::Strong,
            distribution: Distribution::Skewed,
            threads: 8,
            ops: 2_000_000,
            buckets: 16384,
            read_ratio: 0.8,
            p_hot: 0.9,
            time_s: 0.123456789,
            throughput_mops: 16.2,
            speedup: 3.5,
            seq_baseline_s: 0.43209876,
        };

        assert_eq!(
            row.csv(),
            "Coarse,strong,80/20,skew,8,2000000,16384,0.80,0.90,0.123457,16.200,3.500,0.432099"
        );
    }

    #[test]
    fn mix_labels() {
        assert_eq!(mix_label(0.8), "80/20");
        assert_eq!(mix_label(0.5), "50/50");
        assert_eq!(mix_label(0.95), "95/5");
        assert_eq!(mix_label(0.75), "mix");
    }

    #[test]
    fn baseline_is_cached_per_configuration() {
        let mut cache = BaselineCache::new(0.10);

        let first = cache.time_for(
            ScalingMode::Strong,
            0.8,
            Distribution::Uniform,
            256,
            0.0,
            2000,
        );
        let second = cache.time_for(
            ScalingMode::Strong,
            0.8,
            Distribution::Uniform,
            256,
            0.0,
            2000,
        );

        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(cache.times.len(), 1);

        cache.time_for(ScalingMode::Weak, 0.8, Distribution::Uniform, 256, 0.0, 2000);
        assert_eq!(cache.times.len(), 2);
    }

    #[test]
    fn single_threaded_sweeps_are_deterministic() {
        let config = tiny_config();

        let mut first = Vec::new();
        let mut second = Vec::new();

        sweep::<coarse::HashMap<u64, u64>>(&config, &mut BaselineCache::new(0.10), &mut first);
        sweep::<coarse::HashMap<u64, u64>>(&config, &mut BaselineCache::new(0.10), &mut second);

        assert_eq!(first.len(), second.len());
        assert!(!first.is_empty());

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.deterministic_fields(), b.deterministic_fields());
        }
    }

    #[test]
    fn sweep_emits_every_cell() {
        let config = MatrixConfig {
            threads: vec![1, 2],
            ..tiny_config()
        };

        let mut rows = Vec::new();
        sweep::<coarse::HashMap<u64, u64>>(&config, &mut BaselineCache::new(0.10), &mut rows);

        // 2 modes x 1 mix x 1 bucket count x (1 uniform + 1 p_hot) x 2 threads
        assert_eq!(rows.len(), 2 * (2 + 2));

        for row in &rows {
            assert_eq!(row.impl_name, "Coarse");
            assert!(row.time_s > 0.0);
            assert!(row.seq_baseline_s > 0.0);

            if row.distribution == Distribution::Uniform {
                assert_eq!(row.p_hot, 0.0);
            }
        }
    }
}
