use ght::bench::{echo_affinity_env, print_csv, sweep, BaselineCache, MatrixConfig};
use ght::{adaptive, coarse, fine, lockfree, segmented, striped};

use clap::Command;

fn main() {
    env_logger::init();

    Command::new("bench_matrix")
        .about("Scaling sweep over every concurrent table implementation")
        .get_matches();

    echo_affinity_env();

    let config = MatrixConfig::default();
    let mut baselines = BaselineCache::new(config.hot_frac);
    let mut rows = Vec::new();

    sweep::<coarse::HashMap<u64, u64>>(&config, &mut baselines, &mut rows);
    sweep::<fine::HashMap<u64, u64>>(&config, &mut baselines, &mut rows);
    sweep::<segmented::HashMap<u64, u64>>(&config, &mut baselines, &mut rows);
    sweep::<striped::HashMap<u64, u64>>(&config, &mut baselines, &mut rows);
    sweep::<adaptive::HashMap<u64, u64>>(&config, &mut baselines, &mut rows);
    sweep::<lockfree::HashMap<u64, u64>>(&config, &mut baselines, &mut rows);

    print_csv(&rows);
}
