//! Link execution: the actual `link`+`rename` dance, and the best-effort
//! `use_newest_link` time/ownership adjustment.
//!
//! Grounded on `kornelski-dupe-krill`'s `dedupe()`, which links onto a
//! same-directory temp name and renames it over the destination so a
//! crash never leaves a directory entry missing. We generate a genuinely
//! unique temp suffix (pid + a monotonic counter) rather than its hardcoded
//! placeholder, since a real run may perform many link operations in the
//! same directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn tmp_name_for(dst: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix = format!(".tmp-hardlinkable-{}-{}", std::process::id(), n);
    dst.with_file_name(suffix)
}

/// Hardlinks `src` onto a temp name next to `dst`, then renames it over
/// `dst`. On any failure the temp entry is removed before the error is
/// propagated.
pub fn link_and_rename(src: &Path, dst: &Path) -> std::io::Result<()> {
    let tmp = tmp_name_for(dst);
    std::fs::hard_link(src, &tmp)?;
    if let Err(e) = std::fs::rename(&tmp, dst) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Best-effort: if `dst`'s mtime postdates `src`'s, copy `dst`'s mtime and
/// uid/gid onto `src` (the inode kept after linking). Returns
/// `(chtimes_ok, chown_ok)`; failures are left for the caller to count,
/// nothing here is fatal.
pub fn adjust_to_newest(
    src: &Path,
    src_mtime: (i64, i64),
    dst_mtime: (i64, i64),
    dst_uid: u32,
    dst_gid: u32,
) -> (bool, bool) {
    if dst_mtime <= src_mtime {
        return (true, true);
    }
    let ft = filetime::FileTime::from_unix_time(dst_mtime.0, dst_mtime.1 as u32);
    let chtimes_ok = filetime::set_file_mtime(src, ft).is_ok();
    let chown_ok = lchown(src, dst_uid, dst_gid).is_ok();
    (chtimes_ok, chown_ok)
}

fn lchown(path: &Path, uid: u32, gid: u32) -> nix::Result<()> {
    use nix::unistd::{Gid, Uid};
    nix::unistd::fchownat(
        None,
        path,
        Some(Uid::from_raw(uid)),
        Some(Gid::from_raw(gid)),
        nix::unistd::FchownatFlags::NoFollowSymlink,
    )
}
