use ght::fine;
use ght::Error;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use clap::{value_parser, Arg, Command};

/// Lowercases `raw` and strips everything that is not ASCII alphanumeric.
fn clean_word(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn read_words(path: &Path) -> Result<Vec<String>, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;

    let words: Vec<String> = contents
        .split_whitespace()
        .map(clean_word)
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        return Err(Error::empty_input(path));
    }

    Ok(words)
}

fn run() -> Result<(), Error> {
    let matches = Command::new("word_count_library")
        .about("Parallel word frequency count over a whitespace-delimited file")
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

    let words = read_words(path)?;
    let counts = fine::HashMap::<String, u64>::with_buckets(8192);
    let chunk = (words.len() + threads - 1) / threads;

    let start = Instant::now();

    thread::scope(|s| {
        for slice in words.chunks(chunk) {
            let counts = &counts;

            s.spawn(move || {
                for word in slice {
                    counts.increment(word.clone(), 1);
                }
            });
        }
    });

    let elapsed = start.elapsed().as_secs_f64();

    println!("File: {}", path.display());
    println!("Threads: {threads}");
    println!();
    println!("Total words: {}", words.len());
    println!("Unique words: {}", counts.len());
    println!("Time: {elapsed:.4} seconds");
    println!(
        "Throughput: {:.2} M words/second",
        words.len() as f64 / elapsed / 1e6
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
