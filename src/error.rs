//! Error taxonomy for repomirror
//!
//! Only configuration-level problems are Rust errors. Per-repository
//! failures are recorded as [`crate::sync::SyncOutcome`] values instead.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal, pre-flight configuration failure. Aborts the run before any
/// repository is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A manifest file could not be read
    #[error("Failed to read manifest {}: {source}", .path.display())]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source and destination manifests disagree on the number of entries
    #[error(
        "Mismatch in number of repos: {sources} source entries vs {destinations} destination entries"
    )]
    PairCountMismatch { sources: usize, destinations: usize },

    /// Any other invalid setting
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
