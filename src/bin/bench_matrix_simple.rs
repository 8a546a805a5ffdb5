use ght::bench::{echo_affinity_env, print_csv, sweep, BaselineCache, MatrixConfig};
use ght::{coarse, fine, lockfree, segmented};

use clap::{Arg, Command};

fn main() {
    env_logger::init();

    let matches = Command::new("bench_matrix_simple")
        .about("Scaling sweep for a single table implementation")
        .arg(
            Arg::new("impl")
                .long("impl")
                .value_name("IMPL")
                .value_parser(["coarse", "fine", "segment", "lockfree", "lock-free"])
                .required(true)
                .help("Which table implementation to sweep"),
        )
        .get_matches();

    echo_affinity_env();

    let config = MatrixConfig::wide_buckets();
    let mut baselines = BaselineCache::new(config.hot_frac);
    let mut rows = Vec::new();

    match matches.get_one::<String>("impl").unwrap().as_str() {
        "coarse" => sweep::<coarse::HashMap<u64, u64>>(&config, &mut baselines, &mut rows),
        "fine" => sweep::<fine::HashMap<u64, u64>>(&config, &mut baselines, &mut rows),
        "segment" => sweep::<segmented::HashMap<u64, u64>>(&config, &mut baselines, &mut rows),
        "lockfree" | "lock-free" => {
            sweep::<lockfree::HashMap<u64, u64>>(&config, &mut baselines, &mut rows)
        }
        other => unreachable!("clap rejects {other}"),
    }

    print_csv(&rows);
}
