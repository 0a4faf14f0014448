//! Validated run settings resolved from [`Config`] and stored secrets.

use std::fmt;

use super::Config;
use crate::error::ConfigError;
use crate::reconcile::{FeedFormat, FeedFraming, ReconcileConfig};

pub const DEFAULT_INSIGHT_URL: &str = "https://insighttimer.com";
pub const DEFAULT_BEEMINDER_URL: &str = "https://www.beeminder.com/api/v1";

/// Keyring entry consulted when `insight.password` is absent.
pub const INSIGHT_PASSWORD_SECRET: &str = "insight_password";
/// Keyring entry consulted when `beeminder.auth_token` is absent.
pub const BEEMINDER_TOKEN_SECRET: &str = "beeminder_auth_token";

#[derive(Clone)]
pub struct InsightSettings {
    pub username: String,
    pub password: String,
    pub utc_offset_hours: f64,
    pub feed: FeedFormat,
    pub framing: FeedFraming,
    pub base_url: String,
}

#[derive(Clone)]
pub struct BeeminderSettings {
    pub username: String,
    pub auth_token: String,
    pub goal_name: String,
    pub detailed_comment: bool,
    pub base_url: String,
}

/// Everything a sync run needs, checked before any network call.
#[derive(Clone)]
pub struct SyncSettings {
    pub insight: InsightSettings,
    pub beeminder: BeeminderSettings,
}

fn required(key: &str, value: Option<&String>) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

/// Parse the `utc_timezone` string as float hours.
pub fn parse_utc_offset(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "insight.utc_timezone".to_string(),
        message,
    };
    let hours: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("'{raw}' is not a number of hours")))?;
    if !hours.is_finite() || hours.abs() > 24.0 {
        return Err(invalid(format!("'{raw}' is outside -24..=24 hours")));
    }
    Ok(hours)
}

impl SyncSettings {
    /// Validate `config`, falling back to `secret` for the password and token.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingKey`] for the first absent required key,
    /// [`ConfigError::InvalidValue`] for an unparseable UTC offset.
    pub fn resolve<F>(config: &Config, secret: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ic = &config.insight;
        let bc = &config.beeminder;

        let password = ic
            .password
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| secret(INSIGHT_PASSWORD_SECRET));
        let auth_token = bc
            .auth_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| secret(BEEMINDER_TOKEN_SECRET));

        let default_framing = ic.feed.default_framing();
        let framing = FeedFraming {
            header_rows: ic.header_rows.unwrap_or(default_framing.header_rows),
            trailer_rows: ic.trailer_rows.unwrap_or(default_framing.trailer_rows),
        };

        let insight = InsightSettings {
            username: required("insight.username", ic.username.as_ref())?,
            password: required("insight.password", password.as_ref())?,
            utc_offset_hours: parse_utc_offset(&required(
                "insight.utc_timezone",
                ic.utc_timezone.as_ref(),
            )?)?,
            feed: ic.feed,
            framing,
            base_url: ic
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_INSIGHT_URL.to_string()),
        };

        let beeminder = BeeminderSettings {
            username: required("beeminder.username", bc.username.as_ref())?,
            auth_token: required("beeminder.auth_token", auth_token.as_ref())?,
            goal_name: required("beeminder.goal_name", bc.goal_name.as_ref())?,
            detailed_comment: bc.detailed_comment,
            base_url: bc
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BEEMINDER_URL.to_string()),
        };

        Ok(Self { insight, beeminder })
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig::new(self.insight.utc_offset_hours)
            .with_format(self.insight.feed)
            .with_framing(self.insight.framing)
            .with_detailed_comment(self.beeminder.detailed_comment)
    }
}

impl fmt::Debug for InsightSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("feed", &self.feed)
            .field("framing", &self.framing)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for BeeminderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeeminderSettings")
            .field("username", &self.username)
            .field("auth_token", &"<redacted>")
            .field("goal_name", &self.goal_name)
            .field("detailed_comment", &self.detailed_comment)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("insight", &self.insight)
            .field("beeminder", &self.beeminder)
            .finish()
    }
}
