use ght::{adaptive, coarse, fine, lockfree, segmented, striped, ConcurrentMap};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

const BUCKETS: usize = 16384;
const PREFILL: u64 = 100_000;

fn bench_single_thread_insertion(c: &mut Criterion) {
    fn bench<M: ConcurrentMap<u64, u64>>(c: &mut Criterion, name: &str) {
        let map = M::with_buckets_for_threads(BUCKETS, 1);
        let mut key = 0u64;

        c.bench_function(name, |b| {
            b.iter(|| {
                map.insert(black_box(key), key);
                key = key.wrapping_add(1);
            })
        });
    }

    bench::<coarse::HashMap<u64, u64>>(c, "coarse: single threaded insertion");
    bench::<fine::HashMap<u64, u64>>(c, "fine: single threaded insertion");
    bench::<segmented::HashMap<u64, u64>>(c, "segmented: single threaded insertion");
    bench::<striped::HashMap<u64, u64>>(c, "striped: single threaded insertion");
    bench::<adaptive::HashMap<u64, u64>>(c, "adaptive: single threaded insertion");
    bench::<lockfree::HashMap<u64, u64>>(c, "lockfree: single threaded insertion");
}

fn bench_contended_insertion(c: &mut Criterion) {
    fn bench<M: ConcurrentMap<u64, u64> + 'static>(c: &mut Criterion, name: &str) {
        let num_threads = num_cpus::get();
        let map = Arc::new(M::with_buckets_for_threads(BUCKETS, num_threads));
        let keep_going = Arc::new(AtomicBool::new(true));

        let threads: Vec<_> = (0..num_threads.saturating_sub(1))
            .map(|_| {
                let map = map.clone();
                let keep_going = keep_going.clone();

                thread::spawn(move || {
                    while keep_going.load(Ordering::SeqCst) {
                        map.insert(black_box(0), 0);
                    }
                })
            })
            .collect();

        c.bench_function(name, {
            let map = map.clone();

            move |b| b.iter(|| map.insert(black_box(0), 0))
        });

        keep_going.store(false, Ordering::SeqCst);

        let _: Vec<_> = threads.into_iter().map(|t| t.join()).collect();
    }

    bench::<coarse::HashMap<u64, u64>>(c, "coarse: contended insertion");
    bench::<fine::HashMap<u64, u64>>(c, "fine: contended insertion");
    bench::<segmented::HashMap<u64, u64>>(c, "segmented: contended insertion");
    bench::<striped::HashMap<u64, u64>>(c, "striped: contended insertion");
    bench::<adaptive::HashMap<u64, u64>>(c, "adaptive: contended insertion");
    bench::<lockfree::HashMap<u64, u64>>(c, "lockfree: contended insertion");
}

fn bench_read_under_writers(c: &mut Criterion) {
    fn bench<M: ConcurrentMap<u64, u64> + 'static>(c: &mut Criterion, name: &str) {
        let num_threads = num_cpus::get();
        let map = Arc::new(M::with_buckets_for_threads(BUCKETS, num_threads));

        for key in 0..PREFILL {
            map.insert(key, key);
        }

        let keep_going = Arc::new(AtomicBool::new(true));

        let threads: Vec<_> = (0..num_threads.saturating_sub(1))
            .map(|i| {
                let map = map.clone();
                let keep_going = keep_going.clone();

                thread::spawn(move || {
                    let mut key = i as u64;

                    while keep_going.load(Ordering::SeqCst) {
                        map.insert(black_box(key % PREFILL), key);
                        key = key.wrapping_add(1);
                    }
                })
            })
            .collect();

        c.bench_function(name, {
            let map = map.clone();
            let mut key = 0u64;

            move |b| {
                b.iter(|| {
                    let found = map.get(&black_box(key % PREFILL));
                    key = key.wrapping_add(1);
                    found
                })
            }
        });

        keep_going.store(false, Ordering::SeqCst);

        let _: Vec<_> = threads.into_iter().map(|t| t.join()).collect();
    }

    bench::<coarse::HashMap<u64, u64>>(c, "coarse: reads under writers");
    bench::<fine::HashMap<u64, u64>>(c, "fine: reads under writers");
    bench::<segmented::HashMap<u64, u64>>(c, "segmented: reads under writers");
    bench::<striped::HashMap<u64, u64>>(c, "striped: reads under writers");
    bench::<adaptive::HashMap<u64, u64>>(c, "adaptive: reads under writers");
    bench::<lockfree::HashMap<u64, u64>>(c, "lockfree: reads under writers");
}

criterion_group!(
    benches,
    bench_single_thread_insertion,
    bench_contended_insertion,
    bench_read_under_writers,
);
criterion_main!(benches);
