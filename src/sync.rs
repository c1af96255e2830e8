//! Sync Engine - Drives the clone, repoint and force-push sequence
//!
//! Pairs are processed strictly in manifest order, one at a time. Each pair
//! ends in exactly one [`SyncOutcome`]; a failing pair is recorded and the
//! engine moves on to the next one.

use crate::error::ConfigError;
use crate::git::{repo_name, PushTarget, Refspec, VersionControl};
use crate::manifest::{pair_entries, RepoEntry, SyncPair};
use crate::notify::{code_span, escape_markdown, Notifier};
use crate::secret::Redactor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Final state of one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fresh clone, then pushed
    ClonedAndPushed,
    /// Existing working copy reused, then pushed
    ReusedAndPushed,
    /// Clone failed, nothing pushed
    CloneFailed { diagnostic: String },
    /// Remote could not be repointed, nothing pushed
    RemoteFailed { diagnostic: String },
    /// Force-push failed
    PushFailed { diagnostic: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::ClonedAndPushed | Self::ReusedAndPushed)
    }

    /// Diagnostic text for failures
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::CloneFailed { diagnostic }
            | Self::RemoteFailed { diagnostic }
            | Self::PushFailed { diagnostic } => Some(diagnostic),
            Self::ClonedAndPushed | Self::ReusedAndPushed => None,
        }
    }

    /// Short status used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::ClonedAndPushed => "Cloned and Pushed",
            Self::ReusedAndPushed => "Reused and Pushed",
            Self::CloneFailed { .. } => "Clone Failed",
            Self::RemoteFailed { .. } => "Remote Failed",
            Self::PushFailed { .. } => "Push Failed",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one pair, tagged with its position and working copy name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReport {
    pub index: usize,
    pub repo_name: String,
    pub outcome: SyncOutcome,
}

/// Counts over a completed batch
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub reports: Vec<RepoReport>,
}

impl SyncSummary {
    pub fn from_reports(reports: Vec<RepoReport>) -> Self {
        let total_repositories = reports.len();
        let successful_operations = reports.iter().filter(|r| r.outcome.is_success()).count();

        Self {
            total_repositories,
            successful_operations,
            failed_operations: total_repositories - successful_operations,
            reports,
        }
    }
}

/// How the working copy for a pair was obtained
enum Acquired {
    Cloned,
    Reused,
}

/// The engine that mirrors each pair in turn
#[derive(Clone)]
pub struct SyncEngine {
    vcs: Arc<dyn VersionControl>,
    notifier: Arc<dyn Notifier>,
    push: PushTarget,
    workspace_root: Option<PathBuf>,
    redactor: Redactor,
}

impl SyncEngine {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        notifier: Arc<dyn Notifier>,
        push: PushTarget,
        workspace_root: Option<PathBuf>,
        redactor: Redactor,
    ) -> Self {
        Self {
            vcs,
            notifier,
            push,
            workspace_root,
            redactor,
        }
    }

    /// Pair the two lists by position and mirror every pair.
    ///
    /// A length mismatch fails before any repository is touched.
    pub async fn run(
        &self,
        sources: Vec<RepoEntry>,
        destinations: Vec<RepoEntry>,
    ) -> Result<Vec<RepoReport>, ConfigError> {
        let pairs = pair_entries(sources, destinations)?;
        Ok(self.run_pairs(&pairs).await)
    }

    /// Mirror already paired work in order
    pub async fn run_pairs(&self, pairs: &[SyncPair]) -> Vec<RepoReport> {
        info!("Mirroring {} repositories", pairs.len());

        let mut reports = Vec::with_capacity(pairs.len());
        for pair in pairs {
            reports.push(self.sync_pair(pair).await);
        }
        reports
    }

    /// Local working copy for a repository name
    pub fn repo_dir(&self, name: &str) -> PathBuf {
        match &self.workspace_root {
            Some(root) => root.join(name),
            None => PathBuf::from(name),
        }
    }

    async fn sync_pair(&self, pair: &SyncPair) -> RepoReport {
        let mut name = repo_name(&pair.source.locator);
        if name.is_empty() {
            name = format!("repo-{}", pair.index);
        }

        info!(index = pair.index, repo = %name, "=== Processing {} ===", name);
        self.notifier
            .send(&format!("🔄 Processing *{}*...", escape_markdown(&name)))
            .await;

        let outcome = self.mirror(pair, &name).await;

        RepoReport {
            index: pair.index,
            repo_name: name,
            outcome,
        }
    }

    async fn mirror(&self, pair: &SyncPair, name: &str) -> SyncOutcome {
        let repo_dir = self.repo_dir(name);

        let acquired = match self.acquire(pair, name, &repo_dir).await {
            Ok(acquired) => acquired,
            Err(diagnostic) => {
                self.report_failure("Clone", name, &diagnostic).await;
                return SyncOutcome::CloneFailed { diagnostic };
            }
        };

        let push_url = self.push.url_for(&pair.destination.locator);
        if let Err(e) = self
            .vcs
            .set_remote(&repo_dir, &self.push.remote_name, &push_url)
            .await
        {
            let diagnostic = self.redactor.scrub(&e.message);
            self.report_failure("Remote set", name, &diagnostic).await;
            return SyncOutcome::RemoteFailed { diagnostic };
        }

        let refspec = Refspec::new(&pair.source.branch, &pair.destination.branch);
        if let Err(e) = self
            .vcs
            .force_push(&repo_dir, &self.push.remote_name, &refspec)
            .await
        {
            let diagnostic = self.redactor.scrub(&e.message);
            self.report_failure("Push", name, &diagnostic).await;
            return SyncOutcome::PushFailed { diagnostic };
        }

        info!(
            repo = %name,
            "Pushed {} ({} → {})",
            name, pair.source.branch, pair.destination.branch
        );
        self.notifier
            .send(&format!(
                "✅ Pushed *{}* ({} → {})",
                escape_markdown(name),
                escape_markdown(&pair.source.branch),
                escape_markdown(&pair.destination.branch)
            ))
            .await;

        match acquired {
            Acquired::Cloned => SyncOutcome::ClonedAndPushed,
            Acquired::Reused => SyncOutcome::ReusedAndPushed,
        }
    }

    /// Clone into `repo_dir` unless it already exists. Existing directories are
    /// reused as-is. Errors carry scrubbed diagnostic text.
    async fn acquire(
        &self,
        pair: &SyncPair,
        name: &str,
        repo_dir: &Path,
    ) -> Result<Acquired, String> {
        if repo_dir.exists() {
            warn!(repo = %name, "{} already exists, skipping clone", repo_dir.display());
            return Ok(Acquired::Reused);
        }

        if let Some(parent) = repo_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                format!(
                    "Failed to create workspace directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }

        if let Err(e) = self
            .vcs
            .clone_branch(&pair.source.locator, &pair.source.branch, repo_dir)
            .await
        {
            // A killed or partial clone must not be reused on the next run
            if repo_dir.exists() {
                if let Err(cleanup) = tokio::fs::remove_dir_all(repo_dir).await {
                    warn!(
                        repo = %name,
                        "Failed to remove partial clone {}: {}",
                        repo_dir.display(),
                        cleanup
                    );
                }
            }
            return Err(self.redactor.scrub(&e.message));
        }

        info!(repo = %name, "Cloned {} ({})", name, pair.source.branch);
        self.notifier
            .send(&format!(
                "✅ Cloned *{}* ({})",
                escape_markdown(name),
                escape_markdown(&pair.source.branch)
            ))
            .await;

        Ok(Acquired::Cloned)
    }

    async fn report_failure(&self, step: &str, name: &str, diagnostic: &str) {
        error!(repo = %name, "{} failed: {}", step, diagnostic);
        self.notifier
            .send(&format!(
                "❌ {} failed for *{}*:\n{}",
                step,
                escape_markdown(name),
                code_span(diagnostic)
            ))
            .await;
    }
}
