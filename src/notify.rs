//! Chat notifications
//!
//! Notifications are best effort: a failed send is logged and swallowed, it
//! never changes a repository's outcome or aborts the run.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::secret::{Redactor, Secret};

/// Sink for status messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message. Never fails from the caller's point of view.
    async fn send(&self, message: &str);
}

/// Used when no chat channel is configured
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) {
        debug!(notification = %message, "Notification (no channel configured)");
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage` client
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    bot_token: Secret,
    chat_id: String,
    parse_mode: String,
    redactor: Redactor,
}

impl TelegramNotifier {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: Secret,
        chat_id: impl Into<String>,
        parse_mode: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for notifications")?;
        let redactor = Redactor::new([&bot_token]);

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
            chat_id: chat_id.into(),
            parse_mode: parse_mode.into(),
            redactor,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token.expose())
    }

    /// Send and report failures, for callers that want to know
    pub async fn try_send(&self, message: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: &self.parse_mode,
        };

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("request failed: {}", self.redactor.scrub(&e.to_string())))?;

        let status = response.status();
        let body: Option<ApiResponse> = response.json().await.ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse { description, .. }) => Err(anyhow!(
                "API rejected message ({}): {}",
                status,
                description.unwrap_or_else(|| "no description".to_string())
            )),
            None if status.is_success() => Ok(()),
            None => Err(anyhow!("API returned {}", status)),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) {
        if let Err(e) = self.try_send(message).await {
            warn!("Telegram send failed: {}", self.redactor.scrub(&e.to_string()));
        }
    }
}

/// Build the notifier described by the configuration.
///
/// Falls back to [`LogNotifier`] when notifications are disabled or the bot
/// token / chat id are missing.
pub fn from_config(config: &Config) -> Result<Arc<dyn Notifier>> {
    if !config.notify.enabled {
        debug!("Notifications disabled");
        return Ok(Arc::new(LogNotifier));
    }

    match (&config.notify.bot_token, &config.notify.chat_id) {
        (Some(token), Some(chat_id)) if config.notifications_configured() => {
            let notifier = TelegramNotifier::new(
                config.notify.api_base.clone(),
                token.clone(),
                chat_id.clone(),
                config.notify.parse_mode.clone(),
                Duration::from_secs(config.notify.timeout),
            )?;
            Ok(Arc::new(notifier))
        }
        _ => {
            warn!("Notifications enabled but bot token or chat id missing; logging only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Keep a diagnostic inside a Markdown code span
pub fn code_span(text: &str) -> String {
    format!("`{}`", text.replace('`', "'"))
}

/// Escape text placed outside code spans, so names like `platform_build`
/// don't open an unterminated entity in Markdown mode
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
