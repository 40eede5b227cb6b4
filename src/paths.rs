//! `FilenamePaths` and `PathsMap`: the per-inode path bookkeeping the planner
//! reads and mutates.
//!
//! Generalizes `kornelski-dupe-krill`'s `FileSet` (a flat `Vec<PathBuf>` per
//! inode) into the basename-keyed structure the planner's `same_name` option
//! needs, plus a stable-arbitrary-path invariant so that repeated queries
//! don't make the reported source path jitter between runs of the planner.

use std::collections::{HashMap, HashSet};

use crate::inoset::Ino;
use crate::intern::Interned;
use crate::stat::Pathsplit;

/// Every known path pointing at one inode, indexed by basename, plus a
/// cached "arbitrary" path that only changes when it is itself removed.
#[derive(Debug, Clone, Default)]
pub struct FilenamePaths {
    by_basename: HashMap<Interned, HashSet<Pathsplit>>,
    arbitrary: Option<Pathsplit>,
    len: usize,
}

impl FilenamePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: Pathsplit) -> bool {
        let inserted = self
            .by_basename
            .entry(path.basename.clone())
            .or_default()
            .insert(path.clone());
        if inserted {
            self.len += 1;
            if self.arbitrary.is_none() {
                self.arbitrary = Some(path);
            }
        }
        inserted
    }

    pub fn contains(&self, path: &Pathsplit) -> bool {
        self.by_basename
            .get(&path.basename)
            .map(|set| set.contains(path))
            .unwrap_or(false)
    }

    pub fn remove(&mut self, path: &Pathsplit) -> bool {
        let removed = self
            .by_basename
            .get_mut(&path.basename)
            .map(|set| set.remove(path))
            .unwrap_or(false);
        if removed {
            self.len -= 1;
            if let Some(entry) = self.by_basename.get(&path.basename) {
                if entry.is_empty() {
                    self.by_basename.remove(&path.basename);
                }
            }
            if self.arbitrary.as_ref() == Some(path) {
                self.arbitrary = self.pick_any();
            }
        }
        removed
    }

    fn pick_any(&self) -> Option<Pathsplit> {
        self.by_basename
            .values()
            .next()
            .and_then(|set| set.iter().next())
            .cloned()
    }

    /// The stable arbitrary path for this inode, or `None` if it has no
    /// known paths left.
    pub fn arbitrary(&self) -> Option<&Pathsplit> {
        self.arbitrary.as_ref()
    }

    pub fn paths_with_basename(&self, basename: &Interned) -> Option<&HashSet<Pathsplit>> {
        self.by_basename.get(basename)
    }

    /// An arbitrary path sharing `basename` with some path already owned by
    /// this inode, used by the planner's `same_name` restriction.
    pub fn arbitrary_with_basename(&self, basename: &Interned) -> Option<&Pathsplit> {
        self.by_basename.get(basename).and_then(|set| set.iter().next())
    }

    pub fn all_paths(&self) -> Vec<Pathsplit> {
        self.by_basename.values().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Ino → `FilenamePaths`.
#[derive(Debug, Clone, Default)]
pub struct PathsMap(HashMap<Ino, FilenamePaths>);

impl PathsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, ino: Ino) -> &mut FilenamePaths {
        self.0.entry(ino).or_default()
    }

    pub fn get(&self, ino: Ino) -> Option<&FilenamePaths> {
        self.0.get(&ino)
    }

    pub fn remove(&mut self, ino: Ino) -> Option<FilenamePaths> {
        self.0.remove(&ino)
    }

    pub fn contains(&self, ino: Ino) -> bool {
        self.0.contains_key(&ino)
    }
}
