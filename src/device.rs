//! `DeviceEngine` — finds identical files on one device and decides which
//! inodes are linkable.
//!
//! Generalizes `kornelski-dupe-krill`'s `Scanner::add`/`dedupe` (bucket by
//! inode, then by a whole-file hash, merging on first match) into a three
//! stage pipeline: a cheap metadata hash bucket, a search-threshold-gated
//! prefix digest, and only then a byte-exact compare.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cli::Options;
use crate::digest::{compare_files, compute_digest};
use crate::inoset::{Ino, InoSet, LinkableInoSets};
use crate::paths::PathsMap;
use crate::results::Results;
use crate::stat::{xattrs_equal, DevStatInfo, PathInfo, Pathsplit, StatInfo};

/// Hash → inodes whose metadata matches that hash and have not yet been
/// proven linkable to another inode in the same bucket.
#[derive(Debug, Default)]
struct InoHashes(HashMap<u64, InoSet>);

impl InoHashes {
    fn contains_bucket(&self, hash: u64) -> bool {
        self.0.contains_key(&hash)
    }

    fn bucket(&self, hash: u64) -> InoSet {
        self.0.get(&hash).cloned().unwrap_or_default()
    }

    fn insert_new_bucket(&mut self, hash: u64, ino: Ino) {
        self.0.insert(hash, InoSet::singleton(ino));
    }

    fn add_to_bucket(&mut self, hash: u64, ino: Ino) {
        self.0.entry(hash).or_default().add(ino);
    }
}

/// Digest → inodes sharing it, plus which inodes have a computed digest at
/// all (an inode's digest is computed at most once).
#[derive(Debug, Default)]
struct InoDigests {
    by_digest: HashMap<u32, InoSet>,
    digest_of: HashMap<Ino, u32>,
}

impl InoDigests {
    fn digest_of(&self, ino: Ino) -> Option<u32> {
        self.digest_of.get(&ino).copied()
    }

    fn record(&mut self, ino: Ino, digest: u32) {
        self.digest_of.insert(ino, digest);
        self.by_digest.entry(digest).or_default().add(ino);
    }
}

/// Ino → cached `StatInfo`; the planner mutates the cached `nlink` as it
/// simulates the effect of each link.
#[derive(Debug, Default)]
pub struct InoStatInfo(HashMap<Ino, StatInfo>);

impl InoStatInfo {
    pub fn contains(&self, ino: Ino) -> bool {
        self.0.contains_key(&ino)
    }

    pub fn get(&self, ino: Ino) -> Option<&StatInfo> {
        self.0.get(&ino)
    }

    pub fn get_mut(&mut self, ino: Ino) -> Option<&mut StatInfo> {
        self.0.get_mut(&ino)
    }

    pub fn insert(&mut self, ino: Ino, stat: StatInfo) {
        self.0.insert(ino, stat);
    }

    pub fn remove(&mut self, ino: Ino) {
        self.0.remove(&ino);
    }
}

/// All per-device state: the cheap-hash buckets, the digest cache, the
/// proven-linkable partition, the path map, and the stat cache, plus the
/// device id and its hardlink ceiling.
pub struct DeviceEngine {
    pub dev: u64,
    pub max_link: u64,
    pub linkable: LinkableInoSets,
    pub paths: PathsMap,
    pub stats: InoStatInfo,
    ino_hashes: InoHashes,
    ino_digests: InoDigests,
}

fn hash_of(stat: &StatInfo, ignore_time: bool) -> u64 {
    if ignore_time {
        stat.size
    } else {
        stat.size ^ (stat.mtime.0 as u64) ^ (stat.mtime.1 as u64)
    }
}

impl DeviceEngine {
    pub fn new(dev: u64, max_link: u64) -> Self {
        DeviceEngine {
            dev,
            max_link,
            linkable: LinkableInoSets::new(),
            paths: PathsMap::new(),
            stats: InoStatInfo::default(),
            ino_hashes: InoHashes::default(),
            ino_digests: InoDigests::default(),
        }
    }

    /// Returns the inode's prefix digest, computing it at most once. A read
    /// failure leaves the inode without a digest (spec.md §4.2: "the inode
    /// is left without a digest and may be re-attempted") rather than
    /// failing the run; it is counted as a skipped file.
    fn digest_for(&mut self, ino: Ino, path: &Path, results: &mut Results) -> Option<u32> {
        if let Some(d) = self.ino_digests.digest_of(ino) {
            return Some(d);
        }
        match compute_digest(path) {
            Ok(digest) => {
                self.ino_digests.record(ino, digest);
                results.digest_computed_count += 1;
                Some(digest)
            }
            Err(_) => {
                results.skipped_file_err_count += 1;
                None
            }
        }
    }

    fn candidate_path_info(&self, ino: Ino) -> Option<PathInfo> {
        let stat = *self.stats.get(ino)?;
        let path = self.paths.get(ino)?.arbitrary()?.clone();
        Some(PathInfo::new(path, stat))
    }

    fn finish_entry(&mut self, ino: Ino, stat: StatInfo, pathsplit: Pathsplit) {
        self.stats.insert(ino, stat);
        self.paths.entry(ino).insert(pathsplit);
    }

    /// §4.4: updates all per-device structures for one `(stat, pathname)`
    /// observation, possibly declaring the inode linkable to a previously
    /// seen one.
    pub fn find_identical_files(
        &mut self,
        dev_stat: DevStatInfo,
        path: &Path,
        opts: &Options,
        results: &mut Results,
    ) {
        debug_assert_eq!(dev_stat.dev, self.dev);
        let ino = dev_stat.stat.ino;
        let pathsplit = Pathsplit::new(path);

        if !self.stats.contains(ino) {
            results.inode_count += 1;
            results.nlink_total += dev_stat.stat.nlink;
        }

        let hash = hash_of(&dev_stat.stat, opts.ignore_time);

        if !self.ino_hashes.contains_bucket(hash) {
            self.ino_hashes.insert_new_bucket(hash, ino);
            results.hash_missed_count += 1;
            self.finish_entry(ino, dev_stat.stat, pathsplit);
            return;
        }

        results.hash_found_count += 1;

        if self.stats.contains(ino) {
            // Existing intra-device hardlink.
            if self
                .paths
                .get(ino)
                .map(|fp| fp.contains(&pathsplit))
                .unwrap_or(false)
            {
                return; // idempotent re-entry
            }
            if let Some(existing) = self.paths.entry(ino).arbitrary().cloned() {
                results.existing_link_count += 1;
                results.existing_link_bytes += dev_stat.stat.size;
                results.record_existing_link(existing.to_path_buf(), pathsplit.to_path_buf());
            }
            self.paths.entry(ino).insert(pathsplit);
            return;
        }

        let linked = self.linkable.containing(ino);
        let hashed = self.ino_hashes.bucket(hash);

        if linked.overlaps(&hashed) {
            self.finish_entry(ino, dev_stat.stat, pathsplit);
            return;
        }

        let cur_info = PathInfo::new(pathsplit.clone(), dev_stat.stat);
        let candidates = self.candidate_order(&hashed, ino, path, opts, results);

        let mut found: Option<Ino> = None;
        for cand in candidates {
            let cand_info = match self.candidate_path_info(cand) {
                Some(info) => info,
                None => continue,
            };
            if self.are_files_linkable(&cur_info, ino, &cand_info, cand, opts, results) {
                found = Some(cand);
                break;
            }
        }

        if let Some(cand) = found {
            self.linkable.add(cand, ino);
        } else {
            self.ino_hashes.add_to_bucket(hash, ino);
        }
        self.finish_entry(ino, dev_stat.stat, pathsplit);
    }

    /// Orders the hash-bucket candidates to compare against: when the
    /// bucket is larger than `search_thresh`, prefer same-digest candidates
    /// first, then no-digest candidates, skipping known-different digests.
    /// If the current file's own digest can't be read, digest-based
    /// ordering is skipped for this call (the candidates are returned in
    /// arbitrary bucket order) rather than failing the run.
    fn candidate_order(
        &mut self,
        hashed: &InoSet,
        cur_ino: Ino,
        cur_path: &Path,
        opts: &Options,
        results: &mut Results,
    ) -> Vec<Ino> {
        let use_digest = opts.search_thresh >= 0 && hashed.len() as i64 > opts.search_thresh;
        if !use_digest {
            return hashed.as_slice();
        }
        let cur_digest = match self.digest_for(cur_ino, cur_path, results) {
            Some(d) => d,
            None => return hashed.as_slice(),
        };

        let mut same_digest = Vec::new();
        let mut no_digest = Vec::new();
        for cand in hashed.iter().copied() {
            match self.ino_digests.digest_of(cand) {
                Some(d) if d == cur_digest => same_digest.push(cand),
                Some(_) => {} // known different digest, skip entirely
                None => no_digest.push(cand),
            }
        }
        same_digest.extend(no_digest);
        same_digest
    }

    /// §4.4.1: predicate between two `PathInfo`s on the same device. Read
    /// failures (digest or full compare) fold into "not equal" and are
    /// counted as a skipped file, rather than failing the run (spec.md §7).
    #[allow(clippy::too_many_arguments)]
    fn are_files_linkable(
        &mut self,
        cur: &PathInfo,
        cur_ino: Ino,
        cand: &PathInfo,
        cand_ino: Ino,
        opts: &Options,
        results: &mut Results,
    ) -> bool {
        if cur.stat.ino == cand.stat.ino {
            return false;
        }
        if cur.stat.size != cand.stat.size {
            return false;
        }

        let mtimes_equal = cur.equal_mtime(cand);
        let modes_equal = cur.equal_mode(cand);
        let owners_equal = cur.equal_ownership(cand);

        if !opts.ignore_time && !mtimes_equal {
            return false;
        }
        if !opts.ignore_perm && !modes_equal {
            return false;
        }
        if !opts.ignore_owner && !owners_equal {
            return false;
        }

        let cur_path = absolute_path(cur);
        let cand_path = absolute_path(cand);

        let xattrs_match = xattrs_equal(&cur_path, &cand_path).unwrap_or(false);
        if !opts.ignore_xattr && !xattrs_match {
            return false;
        }

        if opts.search_thresh >= 0 {
            let da = self.digest_for(cur_ino, &cur_path, results);
            let db = self.digest_for(cand_ino, &cand_path, results);
            match (da, db) {
                (Some(a), Some(b)) if a == b => {}
                (Some(_), Some(_)) => return false,
                _ => return false, // a digest read failed: fold to "not equal"
            }
        }

        let outcome = match compare_files(&cur_path, &cand_path) {
            Ok(outcome) => outcome,
            Err(_) => {
                results.skipped_file_err_count += 1;
                return false;
            }
        };
        results.comparison_count += 1;
        results.bytes_compared += outcome.bytes_compared;
        if !outcome.equal {
            return false;
        }

        results.record_equal_comparison();
        if !mtimes_equal {
            results.record_mismatch_mtime(cur.stat.size);
        }
        if !modes_equal {
            results.record_mismatch_mode(cur.stat.size);
        }
        if !owners_equal {
            results.record_mismatch_owner(cur.stat.size);
        }
        if !xattrs_match {
            results.record_mismatch_xattr(cur.stat.size);
        }

        true
    }
}

fn absolute_path(info: &PathInfo) -> PathBuf {
    info.path.to_path_buf()
}
