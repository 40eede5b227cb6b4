//! Finds identical files on the same filesystem and consolidates them with
//! hardlinks.
//!
//! The binary (`src/main.rs`) is a thin wrapper around [`run`]; the crate is
//! split out so the engine can be driven from tests without going through
//! `std::env::args`.

pub mod cli;
pub mod device;
pub mod digest;
pub mod engine;
pub mod errors;
pub mod humansize;
pub mod inoset;
pub mod intern;
pub mod linker;
pub mod paths;
pub mod planner;
pub mod progress;
pub mod results;
pub mod stat;
pub mod walk;

pub use errors::{HardlinkError, Result};
pub use results::Results;

/// Parses `std::env::args()`, runs a scan (and link, if `-L`/`--linking-enabled`
/// was given), prints the report, and returns the process exit code.
pub fn run() -> i32 {
    let (raw, verbosity) = match cli::parse() {
        Ok(v) => v,
        Err(early_exit) => {
            print!("{}", early_exit.output);
            return if early_exit.status.is_ok() { 0 } else { 2 };
        }
    };

    let opts = match cli::Options::resolve(raw, verbosity) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("hardlinkable: {e}");
            return e.exit_code();
        }
    };

    match engine::run(&opts) {
        Ok(results) => {
            report(&results, &opts);
            if results.success {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("hardlinkable: {e}");
            e.exit_code()
        }
    }
}

fn report(results: &Results, opts: &cli::Options) {
    if !opts.show_stats {
        return;
    }
    match opts.output_format {
        #[cfg(feature = "json")]
        cli::OutputFormat::Json => match results.to_json() {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("hardlinkable: failed to serialize JSON report: {e}"),
        },
        #[cfg(not(feature = "json"))]
        cli::OutputFormat::Json => print!("{}", results.to_text(opts.verbosity)),
        cli::OutputFormat::Text => print!("{}", results.to_text(opts.verbosity)),
    }
}
