//! Insight Timer integration -- log in and download the session history.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{AuthError, CoreError, GatewayError};
use crate::integrations::traits::SessionSource;
use crate::reconcile::{FeedFormat, SessionRecord};
use crate::storage::InsightSettings;
use crate::time::UNSET_DURATION;

const SERVICE: &str = "insight";
const LOGIN_PATH: &[&str] = &["user_session"];
const CSV_EXPORT_PATH: &[&str] = &["sessions", "export"];
const JSON_LIST_PATH: &[&str] = &["sessions", "all"];

pub struct InsightClient {
    base_url: String,
    username: String,
    password: String,
    feed: FeedFormat,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct SessionListing {
    sessions: Vec<ListedSession>,
}

#[derive(Debug, Deserialize)]
struct ListedSession {
    time: String,
    #[serde(default)]
    duration: Option<serde_json::Value>,
}

impl InsightClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        feed: FeedFormat,
    ) -> Result<Self, GatewayError> {
        // The login sets a session cookie that the export request must carry.
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| GatewayError::transport(SERVICE, e))?;
        Ok(Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            feed,
            http,
        })
    }

    pub fn from_settings(settings: &InsightSettings) -> Result<Self, GatewayError> {
        Self::new(
            settings.base_url.clone(),
            settings.username.clone(),
            settings.password.clone(),
            settings.feed,
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| GatewayError::transport(SERVICE, e))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::transport(SERVICE, "base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn login(&self) -> Result<(), CoreError> {
        let url = self.endpoint(LOGIN_PATH)?;
        debug!(%url, "submitting login");

        let form = [
            ("user_session[email]", self.username.as_str()),
            ("user_session[password]", self.password.as_str()),
        ];
        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .map_err(|e| AuthError::Transport {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        Ok(())
    }

    fn export_url(&self) -> Result<Url, GatewayError> {
        match self.feed {
            FeedFormat::Csv => self.endpoint(CSV_EXPORT_PATH),
            FeedFormat::Json => {
                let mut url = self.endpoint(JSON_LIST_PATH)?;
                url.query_pairs_mut()
                    .append_pair("p1", "1")
                    .append_pair("l1", "999999");
                Ok(url)
            }
        }
    }
}

impl SessionSource for InsightClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn feed_format(&self) -> FeedFormat {
        self.feed
    }

    fn fetch_sessions(&self) -> Result<Vec<SessionRecord>, CoreError> {
        self.login()?;

        let url = self.export_url()?;
        debug!(%url, feed = %self.feed, "fetching sessions");
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| GatewayError::transport(SERVICE, e))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            // Login "succeeded" but the session was not established.
            return Err(AuthError::Rejected {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = resp.text().map_err(|e| GatewayError::transport(SERVICE, e))?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let rows = match self.feed {
            FeedFormat::Csv => parse_csv_feed(&body)?,
            FeedFormat::Json => parse_json_feed(&body)?,
        };
        info!(rows = rows.len(), "fetched session feed");
        Ok(rows)
    }
}

/// Split the tabular export into rows.
///
/// Rows keep their position in the export, framing rows included, and a
/// body ending in a newline gets an empty trailer row. Missing columns
/// become empty strings.
pub fn parse_csv_feed(body: &str) -> Result<Vec<SessionRecord>, GatewayError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| GatewayError::decode(SERVICE, e))?;
        let time = record.get(0).unwrap_or_default();
        let duration = record.get(1).unwrap_or_default();
        rows.push(SessionRecord::new(time, duration));
    }
    // The reader skips blank lines, including the one after the final newline.
    if body.ends_with('\n') {
        rows.push(SessionRecord::new("", ""));
    }
    Ok(rows)
}

/// Decode the JSON session listing.
pub fn parse_json_feed(body: &str) -> Result<Vec<SessionRecord>, GatewayError> {
    let listing: SessionListing =
        serde_json::from_str(body).map_err(|e| GatewayError::decode(SERVICE, e))?;

    Ok(listing
        .sessions
        .into_iter()
        .map(|s| {
            let duration = match s.duration {
                Some(serde_json::Value::String(d)) => d,
                Some(serde_json::Value::Null) | None => UNSET_DURATION.to_string(),
                Some(other) => other.to_string(),
            };
            SessionRecord::new(s.time, duration)
        })
        .collect())
}
