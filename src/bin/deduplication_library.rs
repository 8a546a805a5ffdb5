use ght::fine;
use ght::Error;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use clap::{value_parser, Arg, Command};

fn read_integers(path: &Path) -> Result<Vec<i64>, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;

    let values = contents
        .split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|_| Error::InvalidArgument(format!("not an integer: {token:?}")))
        })
        .collect::<Result<Vec<i64>, _>>()?;

    if values.is_empty() {
        return Err(Error::empty_input(path));
    }

    Ok(values)
}

fn run() -> Result<(), Error> {
    let matches = Command::new("deduplication_library")
        .about("Parallel deduplication of whitespace-separated integers")
        .arg(
            Arg::new("file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("threads")
                .required(true)
                .value_parser(value_parser!(usize)),
        )
        .get_matches();

    let path = matches.get_one::<PathBuf>("file").unwrap();
    let threads = *matches.get_one::<usize>("threads").unwrap();

    if threads == 0 {
        return Err(Error::InvalidArgument(
            "thread count must be positive".to_owned(),
        ));
    }

    let values = read_integers(path)?;
    let seen = fine::HashMap::<i64, bool>::with_buckets(8192);
    let chunk = (values.len() + threads - 1) / threads;

    let start = Instant::now();

    thread::scope(|s| {
        for slice in values.chunks(chunk) {
            let seen = &seen;

            s.spawn(move || {
                for &value in slice {
                    // A racing duplicate insert is fine: `insert` overwrites
                    // in place and the unique count is untouched.
                    if seen.get(&value).is_none() {
                        seen.insert(value, true);
                    }
                }
            });
        }
    });

    let elapsed = start.elapsed().as_secs_f64();

    println!("File: {}", path.display());
    println!("Threads: {threads}");
    println!();
    println!("Total items: {}", values.len());
    println!("Unique items: {}", seen.len());
    println!("Time: {elapsed:.4} seconds");
    println!(
        "Throughput: {:.2} M items/second",
        values.len() as f64 / elapsed / 1e6
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
