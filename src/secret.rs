//! Credential handling
//!
//! Tokens are carried in [`Secret`], which never prints its value, and every
//! diagnostic is passed through a [`Redactor`] before it reaches a log line,
//! a notification, or the run summary.

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

const MASK: &str = "***";

/// An opaque credential value
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only the git and HTTP boundaries should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", MASK)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

fn userinfo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*://)[^/\s@]+@").expect("static regex")
    })
}

/// Scrubs known secrets and URL userinfo out of free-form text
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<Secret>,
}

impl Redactor {
    pub fn new<'a>(secrets: impl IntoIterator<Item = &'a Secret>) -> Self {
        let mut secrets: Vec<Secret> = secrets
            .into_iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        // Longest first so a secret containing another is fully masked
        secrets.sort_by_key(|s| std::cmp::Reverse(s.expose().len()));
        Self { secrets }
    }

    pub fn scrub(&self, text: &str) -> String {
        let mut scrubbed = text.to_string();
        for secret in &self.secrets {
            scrubbed = scrubbed.replace(secret.expose(), MASK);
        }
        userinfo_pattern()
            .replace_all(&scrubbed, format!("${{scheme}}{}@", MASK))
            .into_owned()
    }
}
