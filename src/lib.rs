//! repomirror - Branch-for-branch git repository mirroring
//!
//! repomirror clones (or reuses) each source repository listed in a manifest
//! and force-pushes the configured branch to its destination repository,
//! reporting progress and a final summary to a chat channel.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`manifest`]: Source/destination manifest parsing and pairing
//! - [`git`]: Git clone, remote and push operations
//! - [`sync`]: The sequential mirroring engine
//! - [`notify`]: Best-effort chat notifications
//! - [`report`]: Run timing and summaries
//! - [`run`]: A complete run, start to summary

pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod notify;
pub mod report;
pub mod run;
pub mod secret;
pub mod sync;

pub use config::Config;
pub use error::ConfigError;
pub use git::{GitClient, VersionControl};
pub use manifest::{RepoEntry, SyncPair};
pub use notify::Notifier;
pub use report::{RunReport, RunTimer};
pub use sync::{RepoReport, SyncEngine, SyncOutcome, SyncSummary};
