//! Runtime settings.
//!
//! Settings live in the store and can be edited while the relay runs. The
//! sync engine reads them once at the start of every pass and works from that
//! snapshot until the pass ends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default poll interval in minutes.
pub const DEFAULT_POLL_INTERVAL_MINUTES: u64 = 5;

/// Longest accepted poll interval (one week).
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Minutes between scheduled passes.
    pub poll_interval_minutes: u64,
    /// Skip posts that reply to another post.
    pub ignore_replies: bool,
    /// Skip reposts.
    pub ignore_reposts: bool,
    /// Skip posts whose text contains any of these (case-insensitive).
    #[serde(default)]
    pub ignore_keywords: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL_MINUTES)
    }
}

impl Settings {
    /// Default settings with a specific poll interval.
    #[must_use]
    pub fn with_poll_interval(poll_interval_minutes: u64) -> Self {
        Self {
            poll_interval_minutes: poll_interval_minutes.clamp(1, MAX_POLL_INTERVAL_MINUTES),
            ignore_replies: true,
            ignore_reposts: true,
            ignore_keywords: Vec::new(),
        }
    }

    /// Poll interval as a [`std::time::Duration`].
    ///
    /// Values outside the accepted range (e.g. from a hand-edited settings
    /// file) are clamped into it.
    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        let minutes = self
            .poll_interval_minutes
            .clamp(1, MAX_POLL_INTERVAL_MINUTES);
        std::time::Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// A partial settings update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_replies: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_reposts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_keywords: Option<Vec<String>>,
}

/// A rejected settings update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pollIntervalMinutes must be between 1 and 10080 (got {0})")]
    PollInterval(u64),

    #[error("ignoreKeywords must not contain blank entries")]
    BlankKeyword,
}

impl SettingsPatch {
    /// Check the patch on its own, without a base to apply to.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(minutes) = self.poll_interval_minutes {
            if !(1..=MAX_POLL_INTERVAL_MINUTES).contains(&minutes) {
                return Err(ValidationError::PollInterval(minutes));
            }
        }
        if let Some(keywords) = &self.ignore_keywords {
            if keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ValidationError::BlankKeyword);
            }
        }
        Ok(())
    }

    /// Produce the settings that result from applying this patch to `base`.
    ///
    /// `base` is never modified; the caller persists the returned value.
    pub fn apply_to(&self, base: &Settings) -> Result<Settings, ValidationError> {
        self.validate()?;

        let mut next = base.clone();
        if let Some(minutes) = self.poll_interval_minutes {
            next.poll_interval_minutes = minutes;
        }
        if let Some(ignore) = self.ignore_replies {
            next.ignore_replies = ignore;
        }
        if let Some(ignore) = self.ignore_reposts {
            next.ignore_reposts = ignore;
        }
        if let Some(keywords) = &self.ignore_keywords {
            next.ignore_keywords = keywords.iter().map(|k| k.trim().to_string()).collect();
        }
        Ok(next)
    }
}
