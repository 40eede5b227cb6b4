//! Directory walk adapter (spec.md §4.6).
//!
//! Generalizes `kornelski-dupe-krill`'s `Scanner::scan_dir`/`enqueue`/`flush`
//! (a `read_dir`-based queue, traversal errors swallowed rather than
//! propagated) into a producer that sends `WalkEvent`s over a
//! `crossbeam::channel`, applying the `regex` include/exclude/dir-exclude
//! filters and the size window before a file ever reaches the channel.
//! Entries within a directory are sorted by name before being queued so
//! traversal order is stable for a given directory layout (spec.md §5).

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crossbeam::channel::Sender;

use crate::cli::Options;
use crate::stat::DevStatInfo;

/// One file discovered by the walk, already filtered and stat'd.
pub struct WalkedFile {
    pub path: PathBuf,
    pub dev_stat: DevStatInfo,
}

/// Everything the walk can report back to the single consuming thread. Size
/// and traversal tallies ride along as events, rather than being counted
/// in-thread here, so `Results` is only ever touched by the engine's
/// consumer loop (spec.md §5).
pub enum WalkEvent {
    DirVisited,
    File(WalkedFile),
    TooSmall,
    TooLarge,
    DirError(PathBuf, std::io::Error),
    FileError(PathBuf, std::io::Error),
}

/// Walks every root in `opts.paths`, sending `WalkEvent`s to `tx` as they are
/// discovered. Intended to run on its own thread, feeding the engine's
/// consumer loop on the other end of `tx`.
pub fn walk(opts: &Options, tx: &Sender<WalkEvent>) {
    for root in &opts.paths {
        walk_root(root, opts, tx);
    }
}

fn walk_root(root: &Path, opts: &Options, tx: &Sender<WalkEvent>) {
    let meta = match fs::symlink_metadata(root) {
        Ok(m) => m,
        Err(e) => {
            let _ = tx.send(WalkEvent::DirError(root.to_path_buf(), e));
            return;
        }
    };
    if meta.is_dir() {
        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        queue.push_back(root.to_path_buf());
        while let Some(dir) = queue.pop_front() {
            scan_dir(&dir, opts, tx, &mut queue);
        }
    } else if meta.is_file() {
        consider_file(root, opts, tx);
    }
    // A symlink, device, or socket passed directly as a root is ignored,
    // consistent with "regular files and directories only" for subtree entries.
}

fn scan_dir(dir: &Path, opts: &Options, tx: &Sender<WalkEvent>, queue: &mut VecDeque<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(it) => it,
        Err(e) => {
            let _ = tx.send(WalkEvent::DirError(dir.to_path_buf(), e));
            return;
        }
    };
    let _ = tx.send(WalkEvent::DirVisited);

    let mut names: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    names.sort();

    for path in names {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ty = match fs::symlink_metadata(&path) {
            Ok(m) => m.file_type(),
            Err(e) => {
                let _ = tx.send(WalkEvent::FileError(path, e));
                continue;
            }
        };

        if ty.is_dir() {
            if is_dir_excluded(&file_name, opts) {
                continue;
            }
            queue.push_back(path);
            continue;
        }
        if !ty.is_file() {
            continue; // symlinks, devices, sockets
        }
        if !passes_name_filters(&file_name, opts) {
            continue;
        }
        consider_file(&path, opts, tx);
    }
}

fn is_dir_excluded(name: &str, opts: &Options) -> bool {
    opts.exclude_dirs.iter().any(|re| re.is_match(name))
}

/// Include regexes override excludes: a basename matching any include
/// pattern is always considered, regardless of any exclude match.
fn passes_name_filters(name: &str, opts: &Options) -> bool {
    if opts.include_files.iter().any(|re| re.is_match(name)) {
        return true;
    }
    !opts.exclude_files.iter().any(|re| re.is_match(name))
}

fn consider_file(path: &Path, opts: &Options, tx: &Sender<WalkEvent>) {
    let dev_stat = match DevStatInfo::lstat(path) {
        Ok(s) => s,
        Err(e) => {
            let _ = tx.send(WalkEvent::FileError(path.to_path_buf(), e));
            return;
        }
    };
    if dev_stat.stat.has_special_bits() {
        return; // setuid/setgid/sticky files are out of scope (spec.md §1)
    }
    if dev_stat.stat.size < opts.min_size {
        let _ = tx.send(WalkEvent::TooSmall);
        return;
    }
    if opts.max_size != 0 && dev_stat.stat.size > opts.max_size {
        let _ = tx.send(WalkEvent::TooLarge);
        return;
    }
    let _ = tx.send(WalkEvent::File(WalkedFile {
        path: path.to_path_buf(),
        dev_stat,
    }));
}
