use ght::fine;
use ght::Error;

use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use clap::{value_parser, Arg, Command};
use hashbrown::HashMap as StdHashMap;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const OPERATION_SEED: u64 = 0x5EED;

#[derive(Clone, Copy)]
struct CacheOp {
    key: u64,
    value: u64,
    is_read: bool,
}

/// One synthetic operation stream, shared by every run so the comparison
/// is apples to apples.
fn generate_operations(count: usize, key_range: u64, read_ratio: f64) -> Vec<CacheOp> {
    let mut rng = SmallRng::seed_from_u64(OPERATION_SEED);

    (0..count)
        .map(|_| CacheOp {
            key: rng.gen_range(0..key_range),
            value: rng.gen_range(0..key_range),
            is_read: rng.gen::<f64>() < read_ratio,
        })
        .collect()
}

/// Drives the stream against the fine-grained table; returns elapsed
/// seconds plus hit and miss counts.
fn run_with_library(operations: &[CacheOp], threads: usize) -> (f64, u64, u64) {
    let cache = fine::HashMap::<u64, u64>::with_buckets(8192);
    let chunk = (operations.len() + threads - 1) / threads;
    let start = Instant::now();

    let (hits, misses) = thread::scope(|s| {
        let handles: Vec<_> = operations
            .chunks(chunk)
            .map(|slice| {
                let cache = &cache;

                s.spawn(move || {
                    let mut hits = 0u64;
                    let mut misses = 0u64;

                    for op in slice {
                        if op.is_read {
                            if cache.get(&op.key).is_some() {
                                hits += 1;
                            } else {
                                misses += 1;
                            }
                        } else if cache.insert(op.key, op.value) {
                            misses += 1;
                        }
                    }

                    (hits, misses)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .fold((0, 0), |(h, m), (hits, misses)| (h + hits, m + misses))
    });

    (start.elapsed().as_secs_f64(), hits, misses)
}

/// The same stream against a single-lock standard map.
fn run_with_locked_map(operations: &[CacheOp], threads: usize) -> (f64, u64, u64) {
    let cache = Mutex::new(StdHashMap::<u64, u64>::new());
    let chunk = (operations.len() + threads - 1) / threads;
    let start = Instant::now();

    let (hits, misses) = thread::scope(|s| {
        let handles: Vec<_> = operations
            .chunks(chunk)
            .map(|slice| {
                let cache = &cache;

                s.spawn(move || {
                    let mut hits = 0u64;
                    let mut misses = 0u64;

                    for op in slice {
                        if op.is_read {
                            if cache.lock().contains_key(&op.key) {
                                hits += 1;
                            } else {
                                misses += 1;
                            }
                        } else if cache.lock().insert(op.key, op.value).is_none() {
                            misses += 1;
                        }
                    }

                    (hits, misses)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .fold((0, 0), |(h, m), (hits, misses)| (h + hits, m + misses))
    });

    (start.elapsed().as_secs_f64(), hits, misses)
}

fn report(label: &str, operations: &[CacheOp], threads: usize, time: f64, baseline: f64) {
    println!(
        "{label:<16} {threads:>7} {time:>12.4} {throughput:>16.2} {speedup:>10.2}",
        throughput = operations.len() as f64 / time / 1e6,
        speedup = baseline / time,
    );
}

fn run() -> Result<(), Error> {
    let matches = Command::new("cache_sim_benchmark")
        .about("Synthetic read/write cache stream against the concurrent table")
        .arg(
            Arg::new("operations")
                .required(true)
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("key_range")
                .required(true)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("read_ratio")
                .required(true)
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("threads")
                .num_args(0..)
                .value_parser(value_parser!(usize)),
        )
        .get_matches();

    let operations = *matches.get_one::<usize>("operations").unwrap();
    let key_range = *matches.get_one::<u64>("key_range").unwrap();
    let read_ratio = *matches.get_one::<f64>("read_ratio").unwrap();
    let thread_counts: Vec<usize> = matches
        .get_many::<usize>("threads")
        .map(|values| values.copied().collect())
        .unwrap_or_else(|| vec![1, 2, 4, 8, 16]);

    if operations == 0 {
        return Err(Error::InvalidArgument(
            "operation count must be positive".to_owned(),
        ));
    }

    if key_range == 0 {
        return Err(Error::InvalidArgument("key range must be positive".to_owned()));
    }

    if !(0.0..=1.0).contains(&read_ratio) {
        return Err(Error::InvalidArgument(format!(
            "read ratio must be in [0, 1], got {read_ratio}"
        )));
    }

    if thread_counts.contains(&0) {
        return Err(Error::InvalidArgument(
            "thread counts must be positive".to_owned(),
        ));
    }

    println!("Operations: {operations}");
    println!("Key range: {key_range}");
    println!("Read ratio: {read_ratio}");
    println!();

    let stream = generate_operations(operations, key_range, read_ratio);

    println!(
        "{:<16} {:>7} {:>12} {:>16} {:>10}",
        "Implementation", "Threads", "Time (s)", "Throughput (M/s)", "Speedup"
    );
    println!("{}", "-".repeat(66));

    let mut library_baseline = 0.0;

    for &threads in &thread_counts {
        let (time, _, _) = run_with_library(&stream, threads);

        if library_baseline == 0.0 {
            library_baseline = time;
        }

        report("Library", &stream, threads, time, library_baseline);
    }

    println!();

    let mut locked_baseline = 0.0;

    for &threads in &thread_counts {
        let (time, _, _) = run_with_locked_map(&stream, threads);

        if locked_baseline == 0.0 {
            locked_baseline = time;
        }

        report("StdMap+Lock", &stream, threads, time, locked_baseline);
    }

    println!();

    let (library_time, hits, misses) = run_with_library(&stream, 8);
    let (locked_time, _, _) = run_with_locked_map(&stream, 8);

    println!("Cache hits: {hits}  misses: {misses}");
    println!(
        "Library vs locked std map speedup (8 threads): {:.2}x",
        locked_time / library_time
    );

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");

            ExitCode::FAILURE
        }
    }
}
