//! Slack Web API client for the export methods

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use super::api::WorkspaceApi;
use super::types::{ConversationQuery, Page, SlackAuthInfo, SlackError};

const SLACK_API_BASE: &str = "https://slack.com/api";
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 2000;

pub struct SlackClient {
    http: Client,
    access_token: String,
    team_id: Option<String>,
    api_base: String,
}

impl SlackClient {
    pub fn new(access_token: String) -> Self {
        Self {
            http: Client::new(),
            access_token,
            team_id: None,
            api_base: SLACK_API_BASE.to_string(),
        }
    }

    /// Set the team ID (required for Enterprise Grid workspaces)
    pub fn with_team_id(mut self, team_id: String) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// Point the client at a different Web API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Test the token and get auth info (team, user)
    pub async fn test_auth(&self) -> Result<SlackAuthInfo, SlackError> {
        let json = self.call("auth.test", &[]).await?;

        Ok(SlackAuthInfo {
            team_id: json["team_id"].as_str().unwrap_or_default().to_string(),
            team_name: json["team"].as_str().unwrap_or_default().to_string(),
            user_id: json["user_id"].as_str().unwrap_or_default().to_string(),
            user_name: json["user"].as_str().unwrap_or_default().to_string(),
        })
    }

    fn page_params(&self, cursor: Option<&str>, limit: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", limit.to_string())];

        if let Some(c) = cursor.filter(|c| !c.is_empty()) {
            params.push(("cursor", c.to_string()));
        }

        params
    }

    fn push_team_id(&self, params: &mut Vec<(&'static str, String)>) {
        // For Enterprise Grid, team_id is required
        if let Some(ref tid) = self.team_id {
            params.push(("team_id", tid.clone()));
        }
    }

    /// GET a Web API method, retrying 429 responses before giving up.
    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value, SlackError> {
        if self.access_token.is_empty() {
            return Err(SlackError::Auth("No access token".into()));
        }

        let mut retries = 0;

        loop {
            let response = self
                .http
                .get(format!("{}/{}", self.api_base, method))
                .bearer_auth(&self.access_token)
                .query(params)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());

                if retries >= MAX_RETRIES {
                    return Err(SlackError::RateLimited { retry_after_secs });
                }
                retries += 1;

                let delay = retry_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| Duration::from_millis(RETRY_BASE_DELAY_MS << (retries - 1)));
                tracing::warn!(
                    "Rate limited (429) on {}, retry {}/{} after {}ms",
                    method,
                    retries,
                    MAX_RETRIES,
                    delay.as_millis()
                );
                sleep(delay).await;
                continue;
            }

            if !response.status().is_success() {
                return Err(SlackError::Api(format!("HTTP {}", response.status())));
            }

            let json: Value = response.json().await?;
            return check_ok(json);
        }
    }
}

/// Slack reports failures in-band with `ok: false`.
fn check_ok(json: Value) -> Result<Value, SlackError> {
    if !json["ok"].as_bool().unwrap_or(false) {
        return Err(SlackError::Api(
            json["error"].as_str().unwrap_or("Unknown error").to_string(),
        ));
    }

    Ok(json)
}

#[async_trait]
impl WorkspaceApi for SlackClient {
    async fn list_members(&self, cursor: Option<&str>, limit: u32) -> Result<Page, SlackError> {
        let mut params = self.page_params(cursor, limit);
        self.push_team_id(&mut params);

        let json = self.call("users.list", &params).await?;
        Ok(Page::from_response(json, "members"))
    }

    async fn list_conversations(
        &self,
        cursor: Option<&str>,
        limit: u32,
        query: &ConversationQuery,
    ) -> Result<Page, SlackError> {
        let mut params = self.page_params(cursor, limit);
        params.push(("exclude_archived", (!query.include_archived).to_string()));
        params.push(("types", query.types_param()));
        self.push_team_id(&mut params);

        let json = self.call("conversations.list", &params).await?;
        Ok(Page::from_response(json, "channels"))
    }

    async fn conversation_history(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page, SlackError> {
        let mut params = vec![("channel", channel_id.to_string())];
        params.extend(self.page_params(cursor, limit));

        let json = self.call("conversations.history", &params).await?;
        Ok(Page::from_response(json, "messages"))
    }
}
