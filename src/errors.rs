//! Typed error kinds for the hardlinking engine.

use std::path::PathBuf;

use thiserror::Error;

/// Everything the core engine can fail with. Per-file comparison/digest
/// failures are deliberately *not* represented here: the comparator and
/// digest paths fold those into "not equal" / "no digest" return values
/// rather than bubbling an error, matching the recovery policy of the rest of
/// the engine: a bad comparison just means "not a match", not a crash.
#[derive(Debug, Error)]
pub enum HardlinkError {
    #[error("bad input: {message}")]
    BadInput { message: String },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to link {src} -> {dst}: {source}")]
    Link {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("quiescence check failed for {path}: tree changed during the run")]
    Quiescence { path: PathBuf },

    #[error("fatal error: {message}")]
    Fatal { message: String },
}

impl HardlinkError {
    /// Exit code this error maps to when it reaches `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            HardlinkError::BadInput { .. } => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, HardlinkError>;
