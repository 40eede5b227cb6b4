//! `Results` accumulator and its text/JSON emitters.
//!
//! The counter set is grounded on `kornelski-dupe-krill`'s `Stats` struct
//! (`added`/`skipped`/`dupes`/`hardlinks`), generalized to the fuller set of
//! counters a hardlink run needs to report. The JSON emitter mirrors,
//! feature-flag and all, `kornelski-dupe-krill`'s own `json` Cargo feature.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Which phase of the run `Results` last observed; recorded so a run that
/// stops early can still be reported honestly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Walk,
    Link,
    End,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Walk => "walk",
            Phase::Link => "link",
            Phase::End => "end",
        }
    }
}

/// A count + byte-sized amount, for metadata facets that differ despite
/// equal file contents (spec.md §4.4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MismatchTally {
    pub count: u64,
    pub bytes: u64,
}

impl MismatchTally {
    fn record(&mut self, size: u64) {
        self.count += 1;
        self.bytes += size;
    }
}

#[derive(Debug)]
pub struct Results {
    pub phase: Phase,
    pub success: bool,
    started_at: Option<Instant>,
    elapsed: Option<Duration>,

    pub dirs_walked: u64,
    pub files_walked: u64,
    pub too_small_count: u64,
    pub too_large_count: u64,

    pub comparison_count: u64,
    pub bytes_compared: u64,

    pub inode_count: u64,
    pub nlink_total: u64,

    pub existing_link_count: u64,
    pub existing_link_bytes: u64,

    pub new_link_count: u64,
    pub inode_removed_count: u64,
    pub inode_removed_bytes: u64,

    pub equal_comparison_count: u64,
    pub mismatched_mtime: MismatchTally,
    pub mismatched_mode: MismatchTally,
    pub mismatched_owner: MismatchTally,
    pub mismatched_xattr: MismatchTally,
    pub mismatched_total_bytes: u64,

    pub hash_found_count: u64,
    pub hash_missed_count: u64,
    pub digest_computed_count: u64,

    pub skipped_dir_err_count: u64,
    pub skipped_file_err_count: u64,
    pub skipped_link_err_count: u64,

    pub chown_failed_count: u64,
    pub chtimes_failed_count: u64,

    /// src path -> destination paths linked onto it. Populated only at `-vv`
    /// and above (spec.md §6).
    pub link_paths: Option<HashMap<PathBuf, Vec<PathBuf>>>,
    /// Pre-existing hardlinks discovered during the walk. Populated only at
    /// `-vvv`.
    pub existing_links: Option<HashMap<PathBuf, Vec<PathBuf>>>,
    pub skipped_link_paths: Vec<(PathBuf, PathBuf)>,
}

impl Default for Results {
    fn default() -> Self {
        Results {
            phase: Phase::Start,
            success: false,
            started_at: None,
            elapsed: None,
            dirs_walked: 0,
            files_walked: 0,
            too_small_count: 0,
            too_large_count: 0,
            comparison_count: 0,
            bytes_compared: 0,
            inode_count: 0,
            nlink_total: 0,
            existing_link_count: 0,
            existing_link_bytes: 0,
            new_link_count: 0,
            inode_removed_count: 0,
            inode_removed_bytes: 0,
            equal_comparison_count: 0,
            mismatched_mtime: MismatchTally::default(),
            mismatched_mode: MismatchTally::default(),
            mismatched_owner: MismatchTally::default(),
            mismatched_xattr: MismatchTally::default(),
            mismatched_total_bytes: 0,
            hash_found_count: 0,
            hash_missed_count: 0,
            digest_computed_count: 0,
            skipped_dir_err_count: 0,
            skipped_file_err_count: 0,
            skipped_link_err_count: 0,
            chown_failed_count: 0,
            chtimes_failed_count: 0,
            link_paths: None,
            existing_links: None,
            skipped_link_paths: Vec::new(),
        }
    }
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.phase = Phase::Start;
        self.started_at = Some(Instant::now());
    }

    pub fn enter_walk(&mut self) {
        self.phase = Phase::Walk;
    }

    pub fn enter_link(&mut self) {
        self.phase = Phase::Link;
    }

    pub fn end(&mut self, success: bool) {
        self.phase = Phase::End;
        self.success = success;
        if let Some(start) = self.started_at {
            self.elapsed = Some(start.elapsed());
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn record_equal_comparison(&mut self) {
        self.equal_comparison_count += 1;
    }

    pub fn record_mismatch_mtime(&mut self, size: u64) {
        self.mismatched_mtime.record(size);
        self.mismatched_total_bytes += size;
    }

    pub fn record_mismatch_mode(&mut self, size: u64) {
        self.mismatched_mode.record(size);
        self.mismatched_total_bytes += size;
    }

    pub fn record_mismatch_owner(&mut self, size: u64) {
        self.mismatched_owner.record(size);
        self.mismatched_total_bytes += size;
    }

    pub fn record_mismatch_xattr(&mut self, size: u64) {
        self.mismatched_xattr.record(size);
        self.mismatched_total_bytes += size;
    }

    pub fn record_link(&mut self, src: PathBuf, dst: PathBuf) {
        self.new_link_count += 1;
        if let Some(map) = self.link_paths.as_mut() {
            map.entry(src).or_default().push(dst);
        }
    }

    pub fn record_existing_link(&mut self, src: PathBuf, dst: PathBuf) {
        if let Some(map) = self.existing_links.as_mut() {
            map.entry(src).or_default().push(dst);
        }
    }

    pub fn record_inode_removed(&mut self, bytes: u64) {
        self.inode_removed_count += 1;
        self.inode_removed_bytes += bytes;
    }

    /// `existing_link_bytes + inode_removed_bytes` is the conserved
    /// "saveable bytes" quantity (spec.md §8 "Conservation").
    pub fn saveable_bytes(&self) -> u64 {
        self.existing_link_bytes + self.inode_removed_bytes
    }

    pub fn enable_link_path_detail(&mut self) {
        self.link_paths.get_or_insert_with(HashMap::new);
    }

    pub fn enable_existing_link_detail(&mut self) {
        self.existing_links.get_or_insert_with(HashMap::new);
    }

    pub fn to_text(&self, verbosity: u8) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Scan stopped in phase: {}\n",
            self.phase.as_str()
        ));
        out.push_str(&format!("Directories walked: {}\n", self.dirs_walked));
        out.push_str(&format!("Files considered: {}\n", self.files_walked));
        out.push_str(&format!("Existing links found: {}\n", self.existing_link_count));
        out.push_str(&format!(
            "New links {}: {}\n",
            if self.success { "created" } else { "planned" },
            self.new_link_count
        ));
        out.push_str(&format!("Inodes removed: {}\n", self.inode_removed_count));
        out.push_str(&format!(
            "Total bytes saved: {}\n",
            crate::humansize::format_size(self.saveable_bytes())
        ));
        if verbosity >= 1 {
            out.push_str(&format!("Comparisons made: {}\n", self.comparison_count));
            out.push_str(&format!(
                "Bytes compared: {}\n",
                crate::humansize::format_size(self.bytes_compared)
            ));
            out.push_str(&format!(
                "Mismatched metadata (mtime/mode/owner/xattr): {}/{}/{}/{}\n",
                self.mismatched_mtime.count,
                self.mismatched_mode.count,
                self.mismatched_owner.count,
                self.mismatched_xattr.count
            ));
        }
        if verbosity >= 2 {
            if let Some(map) = &self.link_paths {
                out.push_str("New links:\n");
                for (src, dsts) in map {
                    for dst in dsts {
                        out.push_str(&format!("  {} -> {}\n", src.display(), dst.display()));
                    }
                }
            }
        }
        if verbosity >= 3 {
            if let Some(map) = &self.existing_links {
                out.push_str("Existing links:\n");
                for (src, dsts) in map {
                    for dst in dsts {
                        out.push_str(&format!("  {} == {}\n", src.display(), dst.display()));
                    }
                }
            }
        }
        out
    }
}

#[cfg(feature = "json")]
mod json {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct ResultsJson<'a> {
        phase: &'static str,
        success: bool,
        dirs_walked: u64,
        files_walked: u64,
        too_small_count: u64,
        too_large_count: u64,
        comparison_count: u64,
        bytes_compared: u64,
        inode_count: u64,
        nlink_total: u64,
        existing_link_count: u64,
        existing_link_bytes: u64,
        new_link_count: u64,
        inode_removed_count: u64,
        inode_removed_bytes: u64,
        saveable_bytes: u64,
        mismatched_mtime_count: u64,
        mismatched_mtime_bytes: u64,
        mismatched_mode_count: u64,
        mismatched_mode_bytes: u64,
        mismatched_owner_count: u64,
        mismatched_owner_bytes: u64,
        mismatched_xattr_count: u64,
        mismatched_xattr_bytes: u64,
        mismatched_total_bytes: u64,
        hash_found_count: u64,
        hash_missed_count: u64,
        digest_computed_count: u64,
        skipped_dir_err_count: u64,
        skipped_file_err_count: u64,
        skipped_link_err_count: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        link_paths: Option<BTreeMap<String, Vec<String>>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        existing_links: Option<BTreeMap<String, Vec<String>>>,
        #[allow(dead_code)]
        #[serde(skip)]
        _marker: std::marker::PhantomData<&'a ()>,
    }

    fn stringify(map: &HashMap<PathBuf, Vec<PathBuf>>) -> BTreeMap<String, Vec<String>> {
        map.iter()
            .map(|(k, v)| {
                (
                    k.display().to_string(),
                    v.iter().map(|p| p.display().to_string()).collect(),
                )
            })
            .collect()
    }

    impl Results {
        pub fn to_json(&self) -> serde_json::Result<String> {
            let doc = ResultsJson {
                phase: self.phase.as_str(),
                success: self.success,
                dirs_walked: self.dirs_walked,
                files_walked: self.files_walked,
                too_small_count: self.too_small_count,
                too_large_count: self.too_large_count,
                comparison_count: self.comparison_count,
                bytes_compared: self.bytes_compared,
                inode_count: self.inode_count,
                nlink_total: self.nlink_total,
                existing_link_count: self.existing_link_count,
                existing_link_bytes: self.existing_link_bytes,
                new_link_count: self.new_link_count,
                inode_removed_count: self.inode_removed_count,
                inode_removed_bytes: self.inode_removed_bytes,
                saveable_bytes: self.saveable_bytes(),
                mismatched_mtime_count: self.mismatched_mtime.count,
                mismatched_mtime_bytes: self.mismatched_mtime.bytes,
                mismatched_mode_count: self.mismatched_mode.count,
                mismatched_mode_bytes: self.mismatched_mode.bytes,
                mismatched_owner_count: self.mismatched_owner.count,
                mismatched_owner_bytes: self.mismatched_owner.bytes,
                mismatched_xattr_count: self.mismatched_xattr.count,
                mismatched_xattr_bytes: self.mismatched_xattr.bytes,
                mismatched_total_bytes: self.mismatched_total_bytes,
                hash_found_count: self.hash_found_count,
                hash_missed_count: self.hash_missed_count,
                digest_computed_count: self.digest_computed_count,
                skipped_dir_err_count: self.skipped_dir_err_count,
                skipped_file_err_count: self.skipped_file_err_count,
                skipped_link_err_count: self.skipped_link_err_count,
                link_paths: self.link_paths.as_ref().map(stringify),
                existing_links: self.existing_links.as_ref().map(stringify),
                _marker: std::marker::PhantomData,
            };
            serde_json::to_string_pretty(&doc)
        }
    }
}
