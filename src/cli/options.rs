//! Resolved run configuration (spec.md §6), generalizing the teacher's small
//! `cli/state.rs` (`AppState { step_id, action_id }`) resolved-state struct
//! into the full option set the engine needs. Kept separate from `RawArgs`
//! so the engine never touches `argh` types directly.

use std::path::PathBuf;

use regex::Regex;

use crate::cli::app::RawArgs;
use crate::errors::HardlinkError;
use crate::humansize::parse_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone)]
pub struct Options {
    pub paths: Vec<PathBuf>,

    pub same_name: bool,
    pub ignore_time: bool,
    pub ignore_perm: bool,
    pub ignore_owner: bool,
    pub ignore_xattr: bool,

    pub min_size: u64,
    pub max_size: u64,

    pub include_files: Vec<Regex>,
    pub exclude_files: Vec<Regex>,
    pub exclude_dirs: Vec<Regex>,

    pub search_thresh: i64,

    pub quiescence: bool,
    pub ignore_link_errors: bool,
    pub linking_enabled: bool,
    pub use_newest_link: bool,

    pub verbosity: u8,
    pub show_stats: bool,
    pub show_progress: bool,
    pub output_format: OutputFormat,
}

impl Options {
    pub fn resolve(mut raw: RawArgs, verbosity: u8) -> Result<Options, HardlinkError> {
        if raw.content_only {
            raw.ignore_perm = true;
            raw.ignore_owner = true;
            raw.ignore_time = true;
            raw.ignore_xattr = true;
        }

        let min_size = parse_size(&raw.min_size)
            .map_err(|message| HardlinkError::BadInput { message })?;
        let max_size = parse_size(&raw.max_size)
            .map_err(|message| HardlinkError::BadInput { message })?;
        if max_size != 0 && min_size > max_size {
            return Err(HardlinkError::BadInput {
                message: format!(
                    "min-size ({min_size}) is greater than max-size ({max_size})"
                ),
            });
        }

        if raw.paths.is_empty() {
            return Err(HardlinkError::BadInput {
                message: "at least one directory or file argument is required".to_string(),
            });
        }
        for path in &raw.paths {
            let meta = std::fs::symlink_metadata(path).map_err(|source| HardlinkError::FileAccess {
                path: path.clone(),
                source,
            })?;
            if !meta.is_dir() && !meta.is_file() {
                return Err(HardlinkError::BadInput {
                    message: format!("{} is neither a regular file nor a directory", path.display()),
                });
            }
        }

        let include_files = compile_all(&raw.include)?;
        let exclude_files = compile_all(&raw.exclude)?;
        let exclude_dirs = compile_all(&raw.exclude_dirs)?;

        Ok(Options {
            paths: raw.paths,
            same_name: raw.same_name,
            ignore_time: raw.ignore_time,
            ignore_perm: raw.ignore_perm,
            ignore_owner: raw.ignore_owner,
            ignore_xattr: raw.ignore_xattr,
            min_size,
            max_size,
            include_files,
            exclude_files,
            exclude_dirs,
            search_thresh: raw.search_thresh,
            quiescence: raw.quiescence,
            ignore_link_errors: raw.ignore_linkerr,
            linking_enabled: raw.linking_enabled,
            use_newest_link: raw.use_newest_link,
            verbosity,
            show_stats: !raw.no_stats,
            show_progress: !raw.no_progress,
            output_format: if raw.json { OutputFormat::Json } else { OutputFormat::Text },
        })
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, HardlinkError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| HardlinkError::BadInput {
                message: format!("invalid regex {p:?}: {e}"),
            })
        })
        .collect()
}
