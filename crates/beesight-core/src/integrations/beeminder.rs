//! Beeminder integration -- read and append a goal's datapoints.

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{GatewayError, PostError};
use crate::integrations::traits::GoalGateway;
use crate::reconcile::{Datapoint, GoalDatapoint};
use crate::storage::BeeminderSettings;

const SERVICE: &str = "beeminder";

pub struct BeeminderClient {
    base_url: String,
    username: String,
    auth_token: String,
    goal_name: String,
    http: Client,
}

/// Wire form of a datapoint inside a `create_all` request.
#[derive(Debug, Serialize)]
struct NewDatapoint<'a> {
    timestamp: f64,
    value: f64,
    comment: &'a str,
}

fn require_value(datapoint: &Datapoint) -> Result<f64, PostError> {
    datapoint.value.ok_or(PostError::MissingValue {
        timestamp: datapoint.timestamp,
    })
}

impl BeeminderClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        auth_token: impl Into<String>,
        goal_name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            auth_token: auth_token.into(),
            goal_name: goal_name.into(),
            http: Client::new(),
        }
    }

    pub fn from_settings(settings: &BeeminderSettings) -> Self {
        Self::new(
            settings.base_url.clone(),
            settings.username.clone(),
            settings.auth_token.clone(),
            settings.goal_name.clone(),
        )
    }

    /// `{base}/users/{user}/goals/{goal}/{leaf}`; the token travels separately.
    fn endpoint(&self, leaf: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| "base URL cannot hold a path".to_string())?
            .pop_if_empty()
            .extend(["users", self.username.as_str(), "goals", self.goal_name.as_str()])
            .extend(leaf);
        Ok(url)
    }

    fn send_post(&self, leaf: &[&str], form: &[(&str, String)]) -> Result<(), PostError> {
        let url = self.endpoint(leaf).map_err(PostError::Transport)?;
        debug!(%url, "posting to goal");

        let mut body: Vec<(&str, &str)> = vec![("auth_token", self.auth_token.as_str())];
        body.extend(form.iter().map(|(k, v)| (*k, v.as_str())));

        let resp = self.http.post(url).form(&body).send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(PostError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        info!(response = %text, "posted datapoint");
        Ok(())
    }
}

impl GoalGateway for BeeminderClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn fetch_datapoints(&self) -> Result<Vec<GoalDatapoint>, GatewayError> {
        let url = self
            .endpoint(&["datapoints.json"])
            .map_err(|e| GatewayError::transport(SERVICE, e))?;
        debug!(%url, "fetching goal datapoints");

        let resp = self
            .http
            .get(url)
            .query(&[("auth_token", self.auth_token.as_str())])
            .send()
            // the request URL carries the token
            .map_err(|e| GatewayError::transport(SERVICE, e.without_url()))?;

        let status = resp.status();
        let body = resp.text().map_err(|e| GatewayError::transport(SERVICE, e))?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::decode(SERVICE, e))
    }

    fn post_datapoint(&self, datapoint: &Datapoint) -> Result<(), PostError> {
        let value = require_value(datapoint)?;
        self.send_post(
            &["datapoints.json"],
            &[
                ("timestamp", datapoint.timestamp.to_string()),
                ("value", value.to_string()),
                ("comment", datapoint.comment.clone()),
            ],
        )
    }

    fn post_datapoints(&self, datapoints: &[Datapoint]) -> Result<(), PostError> {
        let batch = datapoints
            .iter()
            .map(|d| {
                Ok(NewDatapoint {
                    timestamp: d.timestamp,
                    value: require_value(d)?,
                    comment: &d.comment,
                })
            })
            .collect::<Result<Vec<_>, PostError>>()?;
        let encoded =
            serde_json::to_string(&batch).map_err(|e| PostError::Transport(e.to_string()))?;

        self.send_post(&["datapoints", "create_all.json"], &[("datapoints", encoded)])
    }
}
