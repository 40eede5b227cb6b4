//! `LinkPlanner::generate_links`: turns one equivalence class of identical
//! inodes into a sequence of actual link operations without ever exceeding
//! the filesystem's hardlink ceiling.
//!
//! No pack example does max-nlink-aware link planning, so this is built
//! directly: sort an equivalence class by cached nlink descending, repeatedly
//! pair the highest- and lowest-ranked remaining members, and requeue
//! whatever a pairing couldn't absorb under the ceiling.

use std::collections::VecDeque;
use std::path::Path;

use crate::cli::Options;
use crate::device::{DeviceEngine, InoStatInfo};
use crate::errors::{HardlinkError, Result};
use crate::inoset::{Ino, InoSet};
use crate::results::Results;
use crate::stat::Pathsplit;

pub struct LinkPlanner;

impl LinkPlanner {
    /// Plans (and, if `opts.linking_enabled`, performs) every link operation
    /// for one equivalence class.
    pub fn generate_links(
        engine: &mut DeviceEngine,
        class: InoSet,
        opts: &Options,
        results: &mut Results,
    ) -> Result<()> {
        let mut s: VecDeque<Ino> = sorted_members(&class, &engine.stats);
        let mut remaining: Vec<Ino> = Vec::new();

        while !s.is_empty() || !remaining.is_empty() {
            if !remaining.is_empty() {
                for ino in remaining.drain(..).rev() {
                    s.push_back(ino);
                }
            }
            let Some(src) = s.pop_front() else { break };

            while !s.is_empty() {
                let dst = s.pop_back().expect("checked non-empty");
                let src_nlink = nlink_of(engine, src);
                let dst_nlink = nlink_of(engine, dst);

                if src_nlink + dst_nlink > engine.max_link {
                    remaining.push(dst);
                    while let Some(x) = s.pop_back() {
                        remaining.push(x);
                    }
                    break;
                }

                let dst_had_leftover = pair(engine, src, dst, opts, results)?;
                if dst_had_leftover {
                    remaining.push(dst);
                }
            }
        }

        Ok(())
    }
}

fn nlink_of(engine: &DeviceEngine, ino: Ino) -> u64 {
    engine.stats.get(ino).map(|s| s.nlink).unwrap_or(0)
}

fn sorted_members(class: &InoSet, stats: &InoStatInfo) -> VecDeque<Ino> {
    let mut members: Vec<Ino> = class.as_slice();
    members.sort_by(|&a, &b| {
        let na = stats.get(a).map(|s| s.nlink).unwrap_or(0);
        let nb = stats.get(b).map(|s| s.nlink).unwrap_or(0);
        nb.cmp(&na).then(b.cmp(&a))
    });
    members.into()
}

/// Links every path currently owned by `dst` onto `src` (subject to the
/// `same_name` restriction). Returns whether `dst` still owns any path
/// afterwards (only possible under `same_name`), in which case the caller
/// should requeue it to try a different `src` later.
fn pair(
    engine: &mut DeviceEngine,
    src: Ino,
    dst: Ino,
    opts: &Options,
    results: &mut Results,
) -> Result<bool> {
    let dst_paths: Vec<Pathsplit> = engine
        .paths
        .get(dst)
        .map(|fp| fp.all_paths())
        .unwrap_or_default();

    let mut leftover = false;

    for dst_path in dst_paths {
        if !engine
            .paths
            .get(dst)
            .map(|fp| fp.contains(&dst_path))
            .unwrap_or(false)
        {
            continue; // already moved by an earlier iteration
        }

        let src_path = if opts.same_name {
            let candidate = engine
                .paths
                .get(src)
                .and_then(|fp| fp.arbitrary_with_basename(&dst_path.basename))
                .cloned();
            match candidate {
                Some(p) => p,
                None => {
                    leftover = true;
                    continue;
                }
            }
        } else {
            match engine.paths.get(src).and_then(|fp| fp.arbitrary()).cloned() {
                Some(p) => p,
                None => break, // src has no paths left; nothing to link onto
            }
        };

        link_one(engine, src, dst, &src_path, &dst_path, opts, results)?;
    }

    Ok(leftover)
}

#[allow(clippy::too_many_arguments)]
fn link_one(
    engine: &mut DeviceEngine,
    src: Ino,
    dst: Ino,
    src_path: &Pathsplit,
    dst_path: &Pathsplit,
    opts: &Options,
    results: &mut Results,
) -> Result<()> {
    let src_pb = src_path.to_path_buf();
    let dst_pb = dst_path.to_path_buf();

    if opts.linking_enabled || opts.quiescence {
        check_quiescent(engine, src, &src_pb)?;
        check_quiescent(engine, dst, &dst_pb)?;
    }

    results.record_link(src_pb.clone(), dst_pb.clone());

    let mut succeeded = true;
    if opts.linking_enabled {
        if let Err(source) = crate::linker::link_and_rename(&src_pb, &dst_pb) {
            if opts.ignore_link_errors {
                results.skipped_link_err_count += 1;
                results.skipped_link_paths.push((src_pb.clone(), dst_pb.clone()));
                succeeded = false;
            } else {
                return Err(HardlinkError::Link {
                    src: src_pb,
                    dst: dst_pb,
                    source,
                });
            }
        }
    }

    if !succeeded {
        return Ok(());
    }

    if opts.use_newest_link {
        apply_newest_link_adjustment(engine, src, dst, &src_pb, results);
    }

    let dst_size = engine.stats.get(dst).map(|s| s.size).unwrap_or(0);
    if let Some(src_stat) = engine.stats.get_mut(src) {
        src_stat.nlink += 1;
    }
    let dst_nlink_after = engine.stats.get_mut(dst).map(|s| {
        s.nlink = s.nlink.saturating_sub(1);
        s.nlink
    });

    if dst_nlink_after == Some(0) {
        results.record_inode_removed(dst_size);
        engine.stats.remove(dst);
    }

    engine.paths.entry(dst).remove(dst_path);
    engine.paths.entry(src).insert(dst_path.clone());

    Ok(())
}

fn apply_newest_link_adjustment(
    engine: &mut DeviceEngine,
    src: Ino,
    dst: Ino,
    src_path: &Path,
    results: &mut Results,
) {
    let (src_mtime, dst_mtime, dst_uid, dst_gid) = {
        let src_stat = engine.stats.get(src);
        let dst_stat = engine.stats.get(dst);
        match (src_stat, dst_stat) {
            (Some(s), Some(d)) => (s.mtime, d.mtime, d.uid, d.gid),
            _ => return,
        }
    };
    let (chtimes_ok, chown_ok) =
        crate::linker::adjust_to_newest(src_path, src_mtime, dst_mtime, dst_uid, dst_gid);
    if !chtimes_ok {
        results.chtimes_failed_count += 1;
    }
    if !chown_ok {
        results.chown_failed_count += 1;
    }
}

/// Re-stats `path` and aborts the run if dev/ino/size/mtime/mode/uid/gid has
/// drifted from what the walk recorded for `expected_ino`.
fn check_quiescent(engine: &DeviceEngine, expected_ino: Ino, path: &Path) -> Result<()> {
    let cached = engine
        .stats
        .get(expected_ino)
        .copied()
        .ok_or_else(|| HardlinkError::Quiescence { path: path.to_path_buf() })?;

    let fresh = crate::stat::DevStatInfo::lstat(path).map_err(|source| HardlinkError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;

    let unchanged = fresh.dev == engine.dev
        && fresh.stat.ino == cached.ino
        && fresh.stat.size == cached.size
        && fresh.stat.mtime == cached.mtime
        && fresh.stat.mode == cached.mode
        && fresh.stat.uid == cached.uid
        && fresh.stat.gid == cached.gid;

    if unchanged {
        Ok(())
    } else {
        Err(HardlinkError::Quiescence { path: path.to_path_buf() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::app::RawArgs;
    use crate::stat::DevStatInfo;
    use std::path::PathBuf;

    fn opts(dir: &Path, linking_enabled: bool, same_name: bool) -> Options {
        let raw = RawArgs {
            no_stats: false,
            no_progress: false,
            json: false,
            linking_enabled,
            same_name,
            content_only: false,
            ignore_time: false,
            ignore_perm: false,
            ignore_owner: false,
            ignore_xattr: false,
            min_size: "1".into(),
            max_size: "0".into(),
            include: vec![],
            exclude: vec![],
            exclude_dirs: vec![],
            search_thresh: 1,
            quiescence: false,
            ignore_linkerr: false,
            use_newest_link: false,
            paths: vec![dir.to_path_buf()],
        };
        Options::resolve(raw, 0).unwrap()
    }

    fn seed(engine: &mut DeviceEngine, path: &Path) -> Ino {
        let stat = DevStatInfo::lstat(path).unwrap();
        let ino = stat.stat.ino;
        engine.stats.insert(ino, stat.stat);
        engine.paths.entry(ino).insert(Pathsplit::new(path));
        ino
    }

    #[test]
    fn dry_run_plans_without_touching_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();

        let mut engine = DeviceEngine::new(0, 8);
        let ia = seed(&mut engine, &a);
        let ib = seed(&mut engine, &b);
        let class: InoSet = [ia, ib].into_iter().collect();

        let options = opts(dir.path(), false, false);
        let mut results = Results::new();
        LinkPlanner::generate_links(&mut engine, class, &options, &mut results).unwrap();

        assert_eq!(results.new_link_count, 1);
        // dry run: both files still exist as distinct inodes on disk.
        let sa = std::fs::metadata(&a).unwrap();
        let sb = std::fs::metadata(&b).unwrap();
        use std::os::unix::fs::MetadataExt;
        assert_ne!(sa.ino(), sb.ino());
    }

    #[test]
    fn enabled_run_actually_links_and_frees_an_inode() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();

        let mut engine = DeviceEngine::new(0, 8);
        let ia = seed(&mut engine, &a);
        let ib = seed(&mut engine, &b);
        let class: InoSet = [ia, ib].into_iter().collect();

        let options = opts(dir.path(), true, false);
        let mut results = Results::new();
        LinkPlanner::generate_links(&mut engine, class, &options, &mut results).unwrap();

        assert_eq!(results.new_link_count, 1);
        assert_eq!(results.inode_removed_count, 1);

        let sa = std::fs::metadata(&a).unwrap();
        let sb = std::fs::metadata(&b).unwrap();
        use std::os::unix::fs::MetadataExt;
        assert_eq!(sa.ino(), sb.ino());
        assert_eq!(sa.nlink(), 2);
    }

    #[test]
    fn same_name_restriction_leaves_mismatched_basenames_unlinked() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("same");
        let b = dir.path().join("different");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();

        let mut engine = DeviceEngine::new(0, 8);
        let ia = seed(&mut engine, &a);
        let ib = seed(&mut engine, &b);
        let class: InoSet = [ia, ib].into_iter().collect();

        let options = opts(dir.path(), true, true);
        let mut results = Results::new();
        LinkPlanner::generate_links(&mut engine, class, &options, &mut results).unwrap();

        assert_eq!(results.new_link_count, 0);
        let sa = std::fs::metadata(&a).unwrap();
        let sb = std::fs::metadata(&b).unwrap();
        use std::os::unix::fs::MetadataExt;
        assert_ne!(sa.ino(), sb.ino());
    }

    #[test]
    fn max_link_ceiling_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..4).map(|i| dir.path().join(format!("f{i}"))).collect();
        for p in &paths {
            std::fs::write(p, b"x").unwrap();
        }

        let mut engine = DeviceEngine::new(0, 2); // ceiling of 2 links per inode
        let inos: Vec<Ino> = paths.iter().map(|p| seed(&mut engine, p)).collect();
        let class: InoSet = inos.into_iter().collect();

        let options = opts(dir.path(), true, false);
        let mut results = Results::new();
        LinkPlanner::generate_links(&mut engine, class, &options, &mut results).unwrap();

        use std::os::unix::fs::MetadataExt;
        for p in &paths {
            let meta = std::fs::metadata(p).unwrap();
            assert!(meta.nlink() <= 2);
        }
    }
}
