//! `InoSet` and `LinkableInoSets`: the equivalence classes of inodes that are
//! safe to hardlink together.
//!
//! `LinkableInoSets` is implemented as a disjoint-set-union with path
//! compression and union-by-rank over `Ino`, rather than a bare adjacency
//! map — merge is O(α(n)) instead of a linear scan per union. The observable
//! contract (`add`, `containing`, `all`) would be identical either way.

use std::collections::{HashMap, HashSet};

pub type Ino = u64;

/// An unordered set of inode numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InoSet(HashSet<Ino>);

impl InoSet {
    pub fn new() -> Self {
        InoSet(HashSet::new())
    }

    pub fn singleton(ino: Ino) -> Self {
        let mut s = InoSet::new();
        s.add(ino);
        s
    }

    pub fn add(&mut self, ino: Ino) -> bool {
        self.0.insert(ino)
    }

    pub fn remove(&mut self, ino: Ino) -> bool {
        self.0.remove(&ino)
    }

    pub fn has(&self, ino: Ino) -> bool {
        self.0.contains(&ino)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn intersection(&self, other: &InoSet) -> InoSet {
        InoSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn difference(&self, other: &InoSet) -> InoSet {
        InoSet(self.0.difference(&other.0).copied().collect())
    }

    pub fn overlaps(&self, other: &InoSet) -> bool {
        self.0.iter().any(|i| other.0.contains(i))
    }

    pub fn has_all(&self, other: &InoSet) -> bool {
        other.0.iter().all(|i| self.0.contains(i))
    }

    pub fn as_slice(&self) -> Vec<Ino> {
        self.0.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ino> {
        self.0.iter()
    }
}

impl FromIterator<Ino> for InoSet {
    fn from_iter<T: IntoIterator<Item = Ino>>(iter: T) -> Self {
        InoSet(iter.into_iter().collect())
    }
}

/// Disjoint-set-union over `Ino` giving the adjacency of the "proven
/// linkable within this device" relation. Only inodes that have
/// participated in `add` are tracked; `containing` on an untracked inode
/// returns a fresh, un-persisted singleton, so `all()` never yields
/// trivial one-member classes for inodes that were merely looked at.
#[derive(Debug, Default)]
pub struct LinkableInoSets {
    parent: HashMap<Ino, Ino>,
    rank: HashMap<Ino, u32>,
}

impl LinkableInoSets {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, ino: Ino) {
        self.parent.entry(ino).or_insert(ino);
        self.rank.entry(ino).or_insert(0);
    }

    fn find(&mut self, ino: Ino) -> Ino {
        let parent = *self.parent.get(&ino).expect("find on untracked inode");
        if parent == ino {
            return ino;
        }
        let root = self.find(parent);
        self.parent.insert(ino, root);
        root
    }

    /// Merges the equivalence classes containing `a` and `b`. Idempotent.
    pub fn add(&mut self, a: Ino, b: Ino) {
        self.ensure(a);
        self.ensure(b);
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let rank_a = self.rank[&ra];
        let rank_b = self.rank[&rb];
        if rank_a < rank_b {
            self.parent.insert(ra, rb);
        } else if rank_a > rank_b {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(rb, ra);
            *self.rank.get_mut(&ra).unwrap() += 1;
        }
    }

    /// Returns the equivalence class containing `ino`: every inode reachable
    /// from it via `add`, or a fresh `{ino}` if `ino` was never added.
    pub fn containing(&mut self, ino: Ino) -> InoSet {
        if !self.parent.contains_key(&ino) {
            return InoSet::singleton(ino);
        }
        let root = self.find(ino);
        let members: Vec<Ino> = self.parent.keys().copied().collect();
        members
            .into_iter()
            .filter(|&k| self.find(k) == root)
            .collect()
    }

    /// Yields each distinct equivalence class exactly once.
    pub fn all(&mut self) -> Vec<InoSet> {
        let members: Vec<Ino> = self.parent.keys().copied().collect();
        let mut groups: HashMap<Ino, InoSet> = HashMap::new();
        for k in members {
            let root = self.find(k);
            groups.entry(root).or_insert_with(InoSet::new).add(k);
        }
        groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_untracked_is_fresh_singleton() {
        let mut sets = LinkableInoSets::new();
        let class = sets.containing(42);
        assert_eq!(class.as_slice(), vec![42]);
        // Querying doesn't persist it.
        assert!(sets.all().is_empty());
    }

    #[test]
    fn add_merges_and_is_transitive() {
        let mut sets = LinkableInoSets::new();
        sets.add(1, 2);
        sets.add(2, 3);
        let class = sets.containing(1);
        assert_eq!(class.len(), 3);
        assert!(class.has(1) && class.has(2) && class.has(3));
    }

    #[test]
    fn add_is_idempotent() {
        let mut sets = LinkableInoSets::new();
        sets.add(1, 2);
        sets.add(1, 2);
        assert_eq!(sets.containing(1).len(), 2);
    }

    #[test]
    fn all_yields_each_class_once() {
        let mut sets = LinkableInoSets::new();
        sets.add(1, 2);
        sets.add(10, 11);
        sets.add(11, 12);
        let classes = sets.all();
        assert_eq!(classes.len(), 2);
        let total: usize = classes.iter().map(|c| c.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn inoset_set_ops() {
        let a: InoSet = [1, 2, 3].into_iter().collect();
        let b: InoSet = [2, 3, 4].into_iter().collect();
        assert_eq!(a.intersection(&b).len(), 2);
        assert_eq!(a.difference(&b).as_slice(), vec![1]);
        assert!(a.overlaps(&b));
        assert!(!a.has_all(&b));
    }
}
