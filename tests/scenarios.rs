//! End-to-end scenarios against the concrete examples and invariants the
//! planning algorithm must satisfy.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use hardlinkable::cli::app::RawArgs;
use hardlinkable::cli::Options;

fn raw(dir: &Path) -> RawArgs {
    RawArgs {
        no_stats: false,
        no_progress: true,
        json: false,
        linking_enabled: true,
        same_name: false,
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
    }
}

fn opts(dir: &Path, f: impl FnOnce(&mut RawArgs)) -> Options {
    let mut r = raw(dir);
    f(&mut r);
    Options::resolve(r, 0).unwrap()
}

fn write(dir: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn scenario_1_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let options = opts(dir.path(), |_| {});
    let results = hardlinkable::engine::run(&options).unwrap();
    assert_eq!(results.files_walked, 0);
    assert_eq!(results.new_link_count, 0);
    assert_eq!(results.inode_removed_count, 0);
}

#[test]
fn scenario_2_two_equal_files() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = write(dir.path(), "f1", b"X");
    let f2 = write(dir.path(), "f2", b"X");

    let options = opts(dir.path(), |_| {});
    let results = hardlinkable::engine::run(&options).unwrap();

    assert_eq!(results.new_link_count, 1);
    assert_eq!(results.inode_removed_count, 1);
    assert_eq!(results.saveable_bytes(), 1);

    let m1 = std::fs::metadata(&f1).unwrap();
    let m2 = std::fs::metadata(&f2).unwrap();
    assert_eq!(m1.ino(), m2.ino());
    assert_eq!(m1.nlink(), 2);
    assert_eq!(m2.nlink(), 2);
}

#[test]
fn scenario_3_two_unequal_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "f1", b"X");
    write(dir.path(), "f2", b"Y");

    let options = opts(dir.path(), |_| {});
    let results = hardlinkable::engine::run(&options).unwrap();

    assert_eq!(results.new_link_count, 0);
    assert_eq!(results.inode_removed_count, 0);
}

#[test]
fn scenario_4_equal_with_preexisting_link() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = write(dir.path(), "f1", b"X");
    let f2 = write(dir.path(), "f2", b"X");
    let f3 = dir.path().join("f3");
    std::fs::hard_link(&f2, &f3).unwrap();

    let options = opts(dir.path(), |_| {});
    let results = hardlinkable::engine::run(&options).unwrap();

    assert_eq!(results.new_link_count, 1);
    assert_eq!(results.inode_removed_count, 1);

    let m1 = std::fs::metadata(&f1).unwrap();
    let m2 = std::fs::metadata(&f2).unwrap();
    let m3 = std::fs::metadata(&f3).unwrap();
    assert_eq!(m1.ino(), m2.ino());
    assert_eq!(m2.ino(), m3.ino());
    assert_eq!(m1.nlink(), 3);
}

#[test]
fn scenario_5_two_groups() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "f1", b"X");
    write(dir.path(), "f2", b"X");
    write(dir.path(), "f3", b"YY");
    write(dir.path(), "f4", b"YY");
    write(dir.path(), "f5", b"YY");

    let options = opts(dir.path(), |_| {});
    let results = hardlinkable::engine::run(&options).unwrap();

    assert_eq!(results.inode_removed_count, 3);
    assert_eq!(results.saveable_bytes(), 5);
}

#[test]
fn scenario_6_same_name_restriction() {
    let dir = tempfile::tempdir().unwrap();
    let a_f1 = write(dir.path(), "A/f1", b"X");
    let b_f1 = write(dir.path(), "B/f1", b"X");
    let b_f2 = write(dir.path(), "B/f2", b"X");

    let options = opts(dir.path(), |r| r.same_name = true);
    let results = hardlinkable::engine::run(&options).unwrap();

    assert_eq!(results.new_link_count, 1);
    assert_eq!(results.inode_removed_count, 1);

    let m_a1 = std::fs::metadata(&a_f1).unwrap();
    let m_b1 = std::fs::metadata(&b_f1).unwrap();
    let m_b2 = std::fs::metadata(&b_f2).unwrap();
    assert_eq!(m_a1.ino(), m_b1.ino());
    assert_ne!(m_a1.ino(), m_b2.ino());
}

#[test]
fn scenario_7_max_link_histogram() {
    let dir = tempfile::tempdir().unwrap();
    let n = 5usize;
    let total = 2 * n + 3; // two groups saturate the ceiling, one leftover group stays under it
    let paths: Vec<PathBuf> = (0..total)
        .map(|i| write(dir.path(), &format!("f{i}"), b"X"))
        .collect();

    let options = opts(dir.path(), |_| {});
    // Force a small ceiling by constructing the engine directly would be
    // cleaner, but the public surface only exposes `max_link_for` via the
    // filesystem; exercise the planner's ceiling directly instead.
    let mut engine = hardlinkable::device::DeviceEngine::new(0, n as u64);
    let mut results = hardlinkable::Results::new();
    for p in &paths {
        let stat = hardlinkable::stat::DevStatInfo::lstat(p).unwrap();
        engine.find_identical_files(stat, p, &options, &mut results);
    }
    for class in engine.linkable.all() {
        hardlinkable::planner::LinkPlanner::generate_links(&mut engine, class, &options, &mut results).unwrap();
    }

    let mut nlink_counts: Vec<u64> = paths
        .iter()
        .map(|p| std::fs::metadata(p).unwrap().nlink())
        .collect();
    nlink_counts.sort_unstable();
    assert!(nlink_counts.iter().all(|&n_| n_ <= n as u64));
    // Every surviving inode is at the ceiling except the leftover group.
    let at_ceiling = nlink_counts.iter().filter(|&&n_| n_ == n as u64).count();
    assert!(at_ceiling > 0);
}

#[test]
fn scenario_8_ignore_time_gates_linking() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = write(dir.path(), "f1", b"X");
    let f2 = write(dir.path(), "f2", b"X");
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    filetime::set_file_mtime(&f2, filetime::FileTime::from_system_time(old)).unwrap();

    let m1 = std::fs::metadata(&f1).unwrap();
    let m2 = std::fs::metadata(&f2).unwrap();
    if m1.mtime() == m2.mtime() && m1.mtime_nsec() == m2.mtime_nsec() {
        return; // filesystem didn't actually record distinct mtimes; skip
    }

    let without_ignore = opts(dir.path(), |_| {});
    let results = hardlinkable::engine::run(&without_ignore).unwrap();
    assert_eq!(results.new_link_count, 0);

    let dir2 = tempfile::tempdir().unwrap();
    let g1 = write(dir2.path(), "f1", b"X");
    let g2 = write(dir2.path(), "f2", b"X");
    filetime::set_file_mtime(&g2, filetime::FileTime::from_system_time(old)).unwrap();
    let with_ignore = opts(dir2.path(), |r| r.ignore_time = true);
    let results2 = hardlinkable::engine::run(&with_ignore).unwrap();
    assert_eq!(results2.new_link_count, 1);
    let _ = (g1, g2);
}

#[test]
fn scenario_9_exclude_dirs_prunes_subtrees() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Aetc/f1", b"X");
    write(dir.path(), "Bpre/f2", b"X");
    write(dir.path(), "etcA/f1", b"X");
    write(dir.path(), "Bpre2/f2", b"X");

    let options = opts(dir.path(), |r| r.exclude_dirs = vec!["^A.*".into()]);
    let results = hardlinkable::engine::run(&options).unwrap();
    // Aetc/f1 is pruned; the remaining three files include two distinct
    // pairs keyed by basename collision across directories is irrelevant
    // here since hardlinking only cares about content, not basenames.
    assert!(results.new_link_count >= 1);
}

#[test]
fn scenario_10_search_thresh_does_not_change_outcome() {
    let mut final_result = None;
    for thresh in [-1i64, 0, 1, 4, 11] {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..36 {
            let content = if i % 3 == 0 { b"AAAA".to_vec() } else { b"BBBB".to_vec() };
            write(dir.path(), &format!("f{i}"), &content);
        }
        let options = opts(dir.path(), |r| r.search_thresh = thresh);
        let results = hardlinkable::engine::run(&options).unwrap();
        let bytes = results.inode_removed_bytes;
        if let Some(expected) = final_result {
            assert_eq!(bytes, expected, "search_thresh={thresh} changed outcome");
        } else {
            final_result = Some(bytes);
        }
    }
}

#[test]
fn idempotent_second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "f1", b"X");
    write(dir.path(), "f2", b"X");

    let options = opts(dir.path(), |_| {});
    let first = hardlinkable::engine::run(&options).unwrap();
    assert_eq!(first.new_link_count, 1);

    let second = hardlinkable::engine::run(&options).unwrap();
    assert_eq!(second.new_link_count, 0);
    assert_eq!(second.inode_removed_count, 0);
}

#[test]
fn dry_run_leaves_filesystem_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = write(dir.path(), "f1", b"X");
    let f2 = write(dir.path(), "f2", b"X");

    let options = opts(dir.path(), |r| r.linking_enabled = false);
    let results = hardlinkable::engine::run(&options).unwrap();
    assert_eq!(results.new_link_count, 1);

    let m1 = std::fs::metadata(&f1).unwrap();
    let m2 = std::fs::metadata(&f2).unwrap();
    assert_ne!(m1.ino(), m2.ino());
}
