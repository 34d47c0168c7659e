//! In-memory workspace used by the export tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::slack::{ConversationQuery, Page, SlackError, WorkspaceApi};

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: &'static str,
    pub channel: Option<String>,
    pub cursor: Option<String>,
    pub at: Instant,
}

/// Pages through fixed record lists; the cursor is the offset of the next page.
#[derive(Default)]
pub(crate) struct FakeWorkspace {
    pub members: Vec<Value>,
    pub conversations: Vec<Value>,
    pub histories: HashMap<String, Vec<Value>>,
    /// 1-based conversations.list call that fails
    pub fail_conversations_on_call: Option<usize>,
    pub fail_history_for: Option<String>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeWorkspace {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }

    fn record(&self, method: &'static str, channel: Option<&str>, cursor: Option<&str>) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call {
            method,
            channel: channel.map(String::from),
            cursor: cursor.map(String::from),
            at: Instant::now(),
        });
        calls.iter().filter(|c| c.method == method).count()
    }
}

fn page(items: &[Value], cursor: Option<&str>, limit: u32) -> Result<Page, SlackError> {
    let start = match cursor {
        Some(c) => c
            .parse::<usize>()
            .map_err(|_| SlackError::Api("invalid_cursor".into()))?,
        None => 0,
    };
    let end = (start + limit as usize).min(items.len());

    Ok(Page {
        items: items[start.min(end)..end].to_vec(),
        next_cursor: (end < items.len()).then(|| end.to_string()),
    })
}

#[async_trait]
impl WorkspaceApi for FakeWorkspace {
    async fn list_members(&self, cursor: Option<&str>, limit: u32) -> Result<Page, SlackError> {
        self.record("users.list", None, cursor);
        page(&self.members, cursor, limit)
    }

    async fn list_conversations(
        &self,
        cursor: Option<&str>,
        limit: u32,
        query: &ConversationQuery,
    ) -> Result<Page, SlackError> {
        let call = self.record("conversations.list", None, cursor);
        assert_eq!(query, &ConversationQuery::everything());

        if self.fail_conversations_on_call == Some(call) {
            return Err(SlackError::Api("internal_error".into()));
        }
        page(&self.conversations, cursor, limit)
    }

    async fn conversation_history(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page, SlackError> {
        self.record("conversations.history", Some(channel_id), cursor);

        if self.fail_history_for.as_deref() == Some(channel_id) {
            return Err(SlackError::Api("channel_not_found".into()));
        }
        let messages = self.histories.get(channel_id).map(Vec::as_slice).unwrap_or(&[]);
        page(messages, cursor, limit)
    }
}
