//! Slack data types and error definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited by Slack after exhausting retries")]
    RateLimited { retry_after_secs: Option<u64> },
}

/// One page of records from a cursor-paginated Slack method.
///
/// Records are kept as raw JSON so they can be written out exactly as received.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Build a page from a Slack response body, taking records from `field`.
    ///
    /// A missing array is treated as an empty page, and an empty `next_cursor`
    /// is normalized to `None`.
    pub fn from_response(mut json: Value, field: &str) -> Self {
        let items = match json.get_mut(field).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let next_cursor = json["response_metadata"]["next_cursor"]
            .as_str()
            .filter(|c| !c.is_empty())
            .map(String::from);

        Self { items, next_cursor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    PublicChannel,
    PrivateChannel,
    Mpim,
    Im,
}

impl ConversationKind {
    pub const ALL: [ConversationKind; 4] = [
        ConversationKind::PublicChannel,
        ConversationKind::PrivateChannel,
        ConversationKind::Mpim,
        ConversationKind::Im,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::PublicChannel => "public_channel",
            ConversationKind::PrivateChannel => "private_channel",
            ConversationKind::Mpim => "mpim",
            ConversationKind::Im => "im",
        }
    }
}

/// Filters passed to `conversations.list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationQuery {
    pub include_archived: bool,
    pub kinds: Vec<ConversationKind>,
}

impl ConversationQuery {
    /// Every conversation kind, archived ones included.
    pub fn everything() -> Self {
        Self {
            include_archived: true,
            kinds: ConversationKind::ALL.to_vec(),
        }
    }

    /// Value for the `types` query parameter
    pub fn types_param(&self) -> String {
        self.kinds
            .iter()
            .map(ConversationKind::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Auth test response info
#[derive(Debug, Clone)]
pub struct SlackAuthInfo {
    pub team_id: String,
    pub team_name: String,
    pub user_id: String,
    pub user_name: String,
}
