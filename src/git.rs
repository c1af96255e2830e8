use async_trait::async_trait;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::secret::Secret;

/// Diagnostic text from a failed git invocation: stderr, or the process error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GitFailure {
    pub message: String,
}

impl GitFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Stdout on success, diagnostic on failure
pub type GitResult = std::result::Result<String, GitFailure>;

/// `<local>:<remote>` push refspec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refspec {
    pub local: String,
    pub remote: String,
}

impl Refspec {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

impl fmt::Display for Refspec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.remote)
    }
}

/// The version-control operations the sync driver needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `locator` at `branch` into `dest`, creating it
    async fn clone_branch(&self, locator: &str, branch: &str, dest: &Path) -> GitResult;

    /// Point `remote` of the repository at `url`, adding the remote if missing
    async fn set_remote(&self, repo_dir: &Path, remote: &str, url: &str) -> GitResult;

    /// Overwrite the remote ref unconditionally with the local branch
    async fn force_push(&self, repo_dir: &Path, remote: &str, refspec: &Refspec) -> GitResult;
}

/// Runs the system `git` binary
#[derive(Debug, Clone)]
pub struct GitClient {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl GitClient {
    /// Create a git client. A zero timeout disables the per-call limit.
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_program("git", timeout_secs)
    }

    /// Run a specific git executable instead of the one on `PATH`
    pub fn with_program(program: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run<I, S>(&self, args: I, cwd: Option<&Path>) -> GitResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = AsyncCommand::new(&self.program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = match self.timeout {
            Some(limit) => match timeout(limit, command.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return Err(GitFailure::new(format!(
                        "git timed out after {}s",
                        limit.as_secs()
                    )))
                }
            },
            None => command.output().await,
        };

        let output =
            output.map_err(|e| GitFailure::new(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("git exited with {}", output.status)
            } else {
                stderr
            };
            return Err(GitFailure::new(message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn remote_exists(&self, repo_dir: &Path, remote: &str) -> bool {
        self.run(["remote", "get-url", remote], Some(repo_dir))
            .await
            .is_ok()
    }
}

#[async_trait]
impl VersionControl for GitClient {
    async fn clone_branch(&self, locator: &str, branch: &str, dest: &Path) -> GitResult {
        debug!("git clone -b {} -- {} {}", branch, locator, dest.display());
        self.run(
            [
                OsStr::new("clone"),
                OsStr::new("-b"),
                OsStr::new(branch),
                OsStr::new("--"),
                OsStr::new(locator),
                dest.as_os_str(),
            ],
            None,
        )
        .await
    }

    async fn set_remote(&self, repo_dir: &Path, remote: &str, url: &str) -> GitResult {
        // The url carries the credential, keep it out of the log line
        debug!("Repointing remote {} in {}", remote, repo_dir.display());
        if self.remote_exists(repo_dir, remote).await {
            self.run(["remote", "set-url", remote, url], Some(repo_dir))
                .await
        } else {
            self.run(["remote", "add", remote, url], Some(repo_dir)).await
        }
    }

    async fn force_push(&self, repo_dir: &Path, remote: &str, refspec: &Refspec) -> GitResult {
        debug!("git push --force {} {} in {}", remote, refspec, repo_dir.display());
        let refspec = refspec.to_string();
        self.run(
            ["push", "--force", remote, refspec.as_str()],
            Some(repo_dir),
        )
        .await
    }
}

/// Where pushes go and how they authenticate
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub host: String,
    pub remote_name: String,
    pub token: Option<Secret>,
}

impl PushTarget {
    /// Build the push URL for a destination locator.
    ///
    /// Host-relative paths (`org/repo`) expand to `https://<host>/org/repo.git`;
    /// http(s) URLs keep their shape. Both get the token as userinfo when one is
    /// configured. Local paths, `file://` and scp-style locators pass through.
    pub fn url_for(&self, locator: &str) -> String {
        let locator = locator.trim();

        if locator.starts_with("https://") || locator.starts_with("http://") {
            return self.with_credential(locator);
        }

        if is_host_relative(locator) {
            let path = locator.trim_matches('/');
            let path = if path.ends_with(".git") {
                path.to_string()
            } else {
                format!("{}.git", path)
            };
            return self.with_credential(&format!("https://{}/{}", self.host, path));
        }

        locator.to_string()
    }

    fn with_credential(&self, url: &str) -> String {
        let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) else {
            return url.to_string();
        };

        match Url::parse(url) {
            Ok(mut parsed) => {
                if parsed.set_username(token.expose()).is_err() {
                    return url.to_string();
                }
                parsed.to_string()
            }
            Err(_) => url.to_string(),
        }
    }
}

fn is_host_relative(locator: &str) -> bool {
    !locator.contains("://")
        && !locator.contains('@')
        && !locator.starts_with('/')
        && !locator.starts_with('.')
        && !locator.starts_with('~')
        && !Path::new(locator).exists()
}

/// Directory name for a source locator: last path segment without `.git`
pub fn repo_name(locator: &str) -> String {
    let trimmed = locator.trim().trim_end_matches(['/', '\\']);
    let last = trimmed
        .rsplit(['/', '\\', ':'])
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}
