//! Top-level run orchestration: owns the walker→engine channel, drives the
//! pipeline to completion, and collects results.
//!
//! Modeled on `components::build::BuildBlueprint`'s role in the original
//! kernel build tool, generalized so the "steps" are devices rather than
//! build stages — one `DeviceEngine` per `st_dev` encountered, since inode
//! numbers are only comparable within a single device.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::thread;

use crossbeam::channel::bounded;

use crate::cli::Options;
use crate::device::DeviceEngine;
use crate::errors::Result;
use crate::planner::LinkPlanner;
use crate::progress;
use crate::results::Results;
use crate::stat::max_link_for;
use crate::walk::{self, WalkEvent};

const CHANNEL_CAPACITY: usize = 4096;

/// Runs a full scan-and-link pass for `opts`, returning the accumulated
/// `Results`. Never returns `Err` for per-file problems — those are folded
/// into `Results`' error counters — only for conditions treated as fatal (a
/// link failure with `ignore_link_errors` off, a quiescence failure, or a
/// walk root that cannot be accessed at all).
pub fn run(opts: &Options) -> Result<Results> {
    let mut results = Results::new();
    results.start();
    if opts.verbosity >= 2 {
        results.enable_link_path_detail();
    }
    if opts.verbosity >= 3 {
        results.enable_existing_link_detail();
    }

    let counters = progress::new_counters();
    let progress_handle = if opts.show_progress {
        progress::spawn(counters.clone()).ok()
    } else {
        None
    };

    let run_result = run_inner(opts, &mut results, &counters);

    if let Some(handle) = progress_handle {
        progress::finish(&counters, handle);
    }

    results.end(run_result.is_ok());
    run_result?;
    Ok(results)
}

fn run_inner(
    opts: &Options,
    results: &mut Results,
    counters: &progress::SharedCounters,
) -> Result<()> {
    results.enter_walk();

    let (tx, rx) = bounded(CHANNEL_CAPACITY);
    let walk_opts = opts.clone();
    let walker = thread::spawn(move || walk::walk(&walk_opts, &tx));

    let mut devices: HashMap<u64, DeviceEngine> = HashMap::new();

    for event in rx {
        match event {
            WalkEvent::DirVisited => {
                results.dirs_walked += 1;
                counters.dirs_walked.store(results.dirs_walked, Ordering::Relaxed);
            }
            WalkEvent::TooSmall => {
                results.files_walked += 1;
                results.too_small_count += 1;
                counters.files_walked.store(results.files_walked, Ordering::Relaxed);
            }
            WalkEvent::TooLarge => {
                results.files_walked += 1;
                results.too_large_count += 1;
                counters.files_walked.store(results.files_walked, Ordering::Relaxed);
            }
            WalkEvent::DirError(_, _) => {
                results.skipped_dir_err_count += 1;
            }
            WalkEvent::FileError(_, _) => {
                results.skipped_file_err_count += 1;
            }
            WalkEvent::File(file) => {
                results.files_walked += 1;
                counters.files_walked.store(results.files_walked, Ordering::Relaxed);
                let dev = file.dev_stat.dev;
                let engine = devices
                    .entry(dev)
                    .or_insert_with(|| DeviceEngine::new(dev, max_link_for(&file.path)));
                engine.find_identical_files(file.dev_stat, &file.path, opts, results);
            }
        }
    }

    walker.join().ok();

    results.enter_link();
    for engine in devices.values_mut() {
        let classes = engine.linkable.all();
        for class in classes {
            LinkPlanner::generate_links(engine, class, opts, results)?;
            counters.new_links.store(results.new_link_count, Ordering::Relaxed);
        }
    }

    Ok(())
}
