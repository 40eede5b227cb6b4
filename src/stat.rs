//! Pathsplit/StatInfo/DevStatInfo/PathInfo (spec.md §3) and the OS glue that
//! produces them: `lstat`, `pathconf(_PC_LINK_MAX)` (with a `getconf`
//! subprocess fallback), and user-namespace xattr equality.
//!
//! Grounded on `kornelski-dupe-krill`'s direct use of
//! `std::os::unix::fs::MetadataExt` to read `dev`/`ino`/`nlink`/`size`, with
//! `nix` (as in `Infinidat-fscmp`/`realchonk-fuse-ufs`) filling in the one
//! thing `std::fs::Metadata` doesn't expose: the filesystem's link-count
//! ceiling.

use std::collections::HashSet;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::intern::{intern, Interned};

/// Default assumed per-filesystem hardlink cap when neither `pathconf` nor
/// the `getconf` fallback can answer (spec.md §6 "Environment").
pub const DEFAULT_MAX_LINK: u64 = 8;

/// A path split into its directory and basename components, each interned
/// so repeated directory components across the walk share one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pathsplit {
    pub dirname: Interned,
    pub basename: Interned,
}

impl Pathsplit {
    pub fn new(path: &Path) -> Self {
        let dirname = path.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Pathsplit {
            dirname: intern(&dirname),
            basename: intern(&basename),
        }
    }

    /// Joins the split back into a usable OS path.
    pub fn to_path_buf(&self) -> PathBuf {
        if self.dirname.is_empty() {
            PathBuf::from(&*self.basename)
        } else {
            Path::new(&*self.dirname).join(&*self.basename)
        }
    }
}

/// Cheap metadata snapshot of a regular file, captured once at walk time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatInfo {
    pub size: u64,
    pub ino: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub mtime: (i64, i64),
}

impl StatInfo {
    pub fn from_metadata(meta: &fs::Metadata) -> Self {
        StatInfo {
            size: meta.size(),
            ino: meta.ino(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            mtime: (meta.mtime(), meta.mtime_nsec()),
        }
    }

    /// Permission bits only (spec.md §9 Open Question: `equal_mode` should
    /// compare `Mode.Perm()`, not the full mode, since non-permission bits
    /// are already excluded at walk time).
    pub fn perm_bits(&self) -> u32 {
        self.mode & 0o7777
    }

    /// True if `mode` carries setuid/setgid/sticky bits, or isn't a regular
    /// file's mode at all (spec.md §1 Non-goals).
    pub fn has_special_bits(&self) -> bool {
        self.mode & 0o7000 != 0
    }
}

/// `StatInfo` plus the device id it was captured on; inode numbers are only
/// unique within a device (spec.md §9 "Inode identity across devices").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevStatInfo {
    pub dev: u64,
    pub stat: StatInfo,
}

impl DevStatInfo {
    pub fn lstat(path: &Path) -> std::io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        Ok(DevStatInfo {
            dev: meta.dev(),
            stat: StatInfo::from_metadata(&meta),
        })
    }
}

impl std::ops::Deref for DevStatInfo {
    type Target = StatInfo;
    fn deref(&self) -> &StatInfo {
        &self.stat
    }
}

/// A `Pathsplit` paired with the stat snapshot taken when it was found.
#[derive(Debug, Clone)]
pub struct PathInfo {
    pub path: Pathsplit,
    pub stat: StatInfo,
}

impl PathInfo {
    pub fn new(path: Pathsplit, stat: StatInfo) -> Self {
        PathInfo { path, stat }
    }

    pub fn equal_mtime(&self, other: &PathInfo) -> bool {
        self.stat.mtime == other.stat.mtime
    }

    pub fn equal_mode(&self, other: &PathInfo) -> bool {
        self.stat.perm_bits() == other.stat.perm_bits()
    }

    pub fn equal_ownership(&self, other: &PathInfo) -> bool {
        self.stat.uid == other.stat.uid && self.stat.gid == other.stat.gid
    }
}

/// Queries the per-filesystem hardlink ceiling for the filesystem containing
/// `path`. Prefers the native `pathconf(_PC_LINK_MAX)` syscall; falls back to
/// shelling out to `/bin/getconf LINK_MAX <path>` only if `pathconf` can't
/// answer, and finally to `DEFAULT_MAX_LINK` (spec.md §9 Open Question).
pub fn max_link_for(path: &Path) -> u64 {
    if let Ok(Some(value)) = nix::unistd::pathconf(path, nix::unistd::PathconfVar::LINK_MAX) {
        if value > 0 {
            return value as u64;
        }
    }

    if let Some(value) = getconf_link_max(path) {
        return value;
    }

    DEFAULT_MAX_LINK
}

fn getconf_link_max(path: &Path) -> Option<u64> {
    let output = Command::new("/bin/getconf")
        .arg("LINK_MAX")
        .arg(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

/// User-namespace extended attribute equality (spec.md §4.4.1): every
/// `user.*` xattr on one file must be present with a byte-identical value on
/// the other; order is irrelevant.
pub fn xattrs_equal(a: &Path, b: &Path) -> std::io::Result<bool> {
    let xa = collect_user_xattrs(a)?;
    let xb = collect_user_xattrs(b)?;
    if xa.len() != xb.len() {
        return Ok(false);
    }
    for (name, value) in &xa {
        match xb.get(name) {
            Some(other_value) if other_value == value => continue,
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Collects only `user.*` xattrs (spec.md §4.4.1 scopes equality to the
/// user namespace; `system.*`/`security.*`/`trusted.*` entries, e.g. POSIX
/// ACLs, are not part of this comparison).
fn collect_user_xattrs(
    path: &Path,
) -> std::io::Result<std::collections::HashMap<std::ffi::OsString, Vec<u8>>> {
    let mut map = std::collections::HashMap::new();
    let names: HashSet<_> = match xattr::list(path) {
        Ok(iter) => iter.filter(|name| is_user_namespace(name)).collect(),
        Err(_) => return Ok(map),
    };
    for name in names {
        if let Ok(Some(value)) = xattr::get(path, &name) {
            map.insert(name, value);
        }
    }
    Ok(map)
}

fn is_user_namespace(name: &std::ffi::OsStr) -> bool {
    name.as_bytes().starts_with(b"user.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathsplit_round_trips() {
        let p = Path::new("/a/b/c.txt");
        let split = Pathsplit::new(p);
        assert_eq!(&*split.basename, "c.txt");
        assert_eq!(&*split.dirname, "/a/b");
        assert_eq!(split.to_path_buf(), p);
    }

    #[test]
    fn pathsplit_relative_with_no_dir() {
        let p = Path::new("c.txt");
        let split = Pathsplit::new(p);
        assert_eq!(&*split.dirname, "");
        assert_eq!(split.to_path_buf(), PathBuf::from("c.txt"));
    }

    #[test]
    fn perm_bits_ignore_special_bits() {
        let stat = StatInfo {
            size: 0,
            ino: 1,
            nlink: 1,
            uid: 0,
            gid: 0,
            mode: 0o104_755, // setuid + rwxr-xr-x
            mtime: (0, 0),
        };
        assert_eq!(stat.perm_bits(), 0o755);
        assert!(stat.has_special_bits());
    }

    #[test]
    fn lstat_reads_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"hello").unwrap();
        let stat = DevStatInfo::lstat(&file).unwrap();
        assert_eq!(stat.size, 5);
    }

    #[test]
    fn max_link_is_at_least_default_floor_or_real_value() {
        let dir = tempfile::tempdir().unwrap();
        let v = max_link_for(dir.path());
        assert!(v >= 2);
    }

    #[test]
    fn xattrs_equal_for_plain_files_with_none() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"x").unwrap();
        assert!(xattrs_equal(&a, &b).unwrap());
    }

    #[test]
    fn is_user_namespace_scopes_to_user_prefix() {
        assert!(is_user_namespace(std::ffi::OsStr::new("user.comment")));
        assert!(!is_user_namespace(std::ffi::OsStr::new("system.posix_acl_access")));
        assert!(!is_user_namespace(std::ffi::OsStr::new("security.selinux")));
        assert!(!is_user_namespace(std::ffi::OsStr::new("trusted.foo")));
    }
}
