use anyhow::{Context, Result};
use chrono::FixedOffset;
use dirs::config_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::secret::{Redactor, Secret};

/// Main configuration structure for repomirror
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Common root for local working copies (current directory if unset)
    #[serde(default)]
    pub workspace_root: Option<String>,

    /// Manifest file locations
    #[serde(default)]
    pub manifests: ManifestConfig,

    /// Destination push settings
    #[serde(default)]
    pub push: PushConfig,

    /// Chat notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// External git process settings
    #[serde(default)]
    pub git: GitConfig,

    /// Summary report settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Manifest file locations
#[derive(Debug, Deserialize, Clone)]
pub struct ManifestConfig {
    /// Positional list of source repositories
    #[serde(default = "default_sources_manifest")]
    pub sources: String,

    /// Positional list of destination repositories
    #[serde(default = "default_destinations_manifest")]
    pub destinations: String,

    /// Combined `<source> -> <destination>` manifest. Takes precedence when set.
    #[serde(default)]
    pub pairs: Option<String>,
}

/// Destination push settings
#[derive(Debug, Deserialize, Clone)]
pub struct PushConfig {
    /// Host used for host-relative destination locators like `org/repo`
    #[serde(default = "default_push_host")]
    pub host: String,

    /// Remote that is repointed at the destination before pushing
    #[serde(default = "default_remote_name")]
    pub remote_name: String,

    /// Credential embedded into https push URLs
    #[serde(default)]
    pub token: Option<Secret>,
}

/// Chat notification settings
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    /// Send notifications at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bot API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot access token
    #[serde(default)]
    pub bot_token: Option<Secret>,

    /// Target chat identifier
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Message markup mode
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_notify_timeout")]
    pub timeout: u64,
}

/// External git process settings
#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    /// Timeout for each git invocation in seconds, 0 disables it
    #[serde(default = "default_git_timeout")]
    pub timeout: u64,
}

/// Summary report settings
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Name used in banners and notifications
    #[serde(default = "default_title")]
    pub title: String,

    /// Fixed civil offset for start/end timestamps
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_sources_manifest() -> String {
    "repos/clone_repos.txt".to_string()
}
fn default_destinations_manifest() -> String {
    "repos/push_repos.txt".to_string()
}
fn default_push_host() -> String {
    "github.com".to_string()
}
fn default_remote_name() -> String {
    "origin".to_string()
}
fn default_true() -> bool {
    true
}
fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_parse_mode() -> String {
    "Markdown".to_string()
}
fn default_notify_timeout() -> u64 {
    10
}
fn default_git_timeout() -> u64 {
    1800
}
fn default_title() -> String {
    "Repo Mirror".to_string()
}
fn default_utc_offset() -> String {
    "+05:30".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            sources: default_sources_manifest(),
            destinations: default_destinations_manifest(),
            pairs: None,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            host: default_push_host(),
            remote_name: default_remote_name(),
            token: None,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            api_base: default_api_base(),
            bot_token: None,
            chat_id: None,
            parse_mode: default_parse_mode(),
            timeout: default_notify_timeout(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            timeout: default_git_timeout(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            utc_offset: default_utc_offset(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if no file exists
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        let mut config = if config_path.exists() {
            Self::read(&config_path)?
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Self::default()
        };

        config.finalize()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.finalize()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    fn finalize(&mut self) -> Result<()> {
        self.apply_env_overrides();
        self.expand_paths()?;
        self.validate()?;
        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repomirror").join("config.yml"))
    }

    /// Pull secrets from the environment so they never live in the config file
    pub fn apply_env_overrides(&mut self) {
        let env_secret = |key: &str| {
            std::env::var(key)
                .ok()
                .map(Secret::new)
                .filter(|s| !s.is_empty())
        };

        if let Some(token) = env_secret("REPOMIRROR_PUSH_TOKEN").or_else(|| env_secret("GITHUB_TOKEN")) {
            self.push.token = Some(token);
        }
        if let Some(token) = env_secret("TELEGRAM_BOT_TOKEN") {
            self.notify.bot_token = Some(token);
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.notify.chat_id = Some(chat_id.trim().to_string());
            }
        }
    }

    /// Expand environment variables and `~` in configured paths
    pub fn expand_paths(&mut self) -> Result<()> {
        let expand = |raw: &str, what: &str| -> Result<String> {
            let expanded = shellexpand::full(raw)
                .with_context(|| format!("Failed to expand {} path", what))?;
            Ok(path_clean::clean(&*expanded)
                .to_string_lossy()
                .into_owned())
        };

        if let Some(root) = &self.workspace_root {
            self.workspace_root = Some(expand(root, "workspace_root")?);
        }
        self.manifests.sources = expand(&self.manifests.sources, "manifests.sources")?;
        self.manifests.destinations =
            expand(&self.manifests.destinations, "manifests.destinations")?;
        if let Some(pairs) = &self.manifests.pairs {
            self.manifests.pairs = Some(expand(pairs, "manifests.pairs")?);
        }

        Ok(())
    }

    /// Reject settings that would only fail later, mid-run
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.utc_offset()?;
        if self.push.remote_name.trim().is_empty() {
            return Err(ConfigError::Invalid("push.remote_name must not be empty".into()));
        }
        Ok(())
    }

    /// Parsed report offset
    pub fn utc_offset(&self) -> std::result::Result<FixedOffset, ConfigError> {
        self.report.utc_offset.parse::<FixedOffset>().map_err(|e| {
            ConfigError::Invalid(format!(
                "report.utc_offset {:?} is not a valid offset like +05:30: {}",
                self.report.utc_offset, e
            ))
        })
    }

    /// Workspace root as a path, if configured
    pub fn workspace_root_path(&self) -> Option<PathBuf> {
        self.workspace_root
            .as_deref()
            .filter(|root| !root.is_empty())
            .map(PathBuf::from)
    }

    /// Whether a bot token and chat id are both available
    pub fn notifications_configured(&self) -> bool {
        self.notify.bot_token.as_ref().is_some_and(|t| !t.is_empty())
            && self.notify.chat_id.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Redactor covering every configured credential
    pub fn redactor(&self) -> Redactor {
        Redactor::new(
            self.push
                .token
                .iter()
                .chain(self.notify.bot_token.iter()),
        )
    }
}
