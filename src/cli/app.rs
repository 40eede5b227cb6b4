//! Raw CLI surface (spec.md §6), parsed with `argh` the way the teacher's
//! own `App: FromArgs` (`build/src/cli/app.rs`) parses its build flags.
//!
//! `argh` has no native "repeat a switch up to N times" support (unlike
//! `clap`'s `ArgAction::Count`), so `-v`/`-vv`/`-vvv`/`-vvvv` is counted by a
//! small pre-pass over `argv` before handing the rest to `argh` — a common
//! trick for verbosity flags on top of minimal arg parsers.

use std::path::PathBuf;

use argh::FromArgs;

#[derive(FromArgs, Debug)]
#[argh(description = "find identical files and consolidate them with hardlinks")]
pub struct RawArgs {
    #[argh(switch, description = "disable printing the summary stats block")]
    pub no_stats: bool,

    #[argh(switch, description = "disable the progress indicator")]
    pub no_progress: bool,

    #[argh(switch, description = "emit a JSON report instead of text")]
    pub json: bool,

    #[argh(
        switch,
        description = "actually perform the links (default: dry-run)"
    )]
    pub linking_enabled: bool,

    #[argh(
        switch,
        short = 'f',
        description = "require identical basenames to link two files"
    )]
    pub same_name: bool,

    #[argh(
        switch,
        short = 'c',
        description = "content-only match: shorthand for -p -o -t -x"
    )]
    pub content_only: bool,

    #[argh(switch, short = 't', description = "ignore mtime differences")]
    pub ignore_time: bool,

    #[argh(switch, short = 'p', description = "ignore permission differences")]
    pub ignore_perm: bool,

    #[argh(switch, short = 'o', description = "ignore ownership differences")]
    pub ignore_owner: bool,

    #[argh(switch, short = 'x', description = "ignore extended attribute differences")]
    pub ignore_xattr: bool,

    #[argh(
        option,
        short = 's',
        default = "String::from(\"1\")",
        description = "minimum file size to consider (accepts k/m/g/t/p suffixes)"
    )]
    pub min_size: String,

    #[argh(
        option,
        short = 'S',
        default = "String::from(\"0\")",
        description = "maximum file size to consider, 0 = unlimited"
    )]
    pub max_size: String,

    #[argh(
        option,
        short = 'i',
        description = "regex of files to include, overrides excludes (repeatable)"
    )]
    pub include: Vec<String>,

    #[argh(
        option,
        short = 'e',
        description = "regex of files to exclude (repeatable)"
    )]
    pub exclude: Vec<String>,

    #[argh(
        option,
        short = 'E',
        description = "regex of directories to exclude/prune (repeatable)"
    )]
    pub exclude_dirs: Vec<String>,

    #[argh(
        option,
        default = "1",
        description = "hash-bucket size above which content digests engage; -1 disables"
    )]
    pub search_thresh: i64,

    #[argh(
        switch,
        description = "re-stat src/dst immediately before linking and abort on any change"
    )]
    pub quiescence: bool,

    #[argh(
        switch,
        description = "log and skip link failures instead of stopping the run"
    )]
    pub ignore_linkerr: bool,

    #[argh(
        switch,
        description = "best-effort adjust the kept inode's mtime/owner to the newest of the two pre-link files"
    )]
    pub use_newest_link: bool,

    #[argh(positional, description = "directories or files to scan")]
    pub paths: Vec<PathBuf>,
}

/// Counts leading `-v`/`--verbose` occurrences in `args`, returning the count
/// (clamped to 4 per spec.md §6) and the remaining arguments with those
/// tokens stripped.
pub fn extract_verbosity(args: &[String]) -> (u8, Vec<String>) {
    let mut level: u8 = 0;
    let mut rest = Vec::with_capacity(args.len());
    for arg in args {
        if arg == "--verbose" {
            level = level.saturating_add(1);
            continue;
        }
        if arg.len() > 1 && arg.starts_with('-') && !arg.starts_with("--") {
            let body = &arg[1..];
            if !body.is_empty() && body.chars().all(|c| c == 'v') {
                level = level.saturating_add(body.len() as u8);
                continue;
            }
        }
        rest.push(arg.clone());
    }
    (level.min(4), rest)
}

/// Parses `std::env::args()` into `(RawArgs, verbosity)`.
pub fn parse() -> Result<(RawArgs, u8), argh::EarlyExit> {
    let mut all: Vec<String> = std::env::args().collect();
    let program = if all.is_empty() {
        "hardlinkable".to_string()
    } else {
        all.remove(0)
    };
    let (verbosity, rest) = extract_verbosity(&all);
    let rest_refs: Vec<&str> = rest.iter().map(String::as_str).collect();
    let raw = RawArgs::from_args(&[program.as_str()], &rest_refs)?;
    Ok((raw, verbosity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bundled_v_flags() {
        let args: Vec<String> = vec!["-vvv".into(), "somefile".into()];
        let (level, rest) = extract_verbosity(&args);
        assert_eq!(level, 3);
        assert_eq!(rest, vec!["somefile".to_string()]);
    }

    #[test]
    fn counts_repeated_separate_v_flags() {
        let args: Vec<String> = vec!["-v".into(), "-v".into(), "--verbose".into()];
        let (level, rest) = extract_verbosity(&args);
        assert_eq!(level, 3);
        assert!(rest.is_empty());
    }

    #[test]
    fn clamps_to_four() {
        let args: Vec<String> = vec!["-vvvvvvvv".into()];
        let (level, _) = extract_verbosity(&args);
        assert_eq!(level, 4);
    }

    #[test]
    fn leaves_other_flags_alone() {
        let args: Vec<String> = vec!["--json".into(), "-f".into()];
        let (level, rest) = extract_verbosity(&args);
        assert_eq!(level, 0);
        assert_eq!(rest, args);
    }
}
