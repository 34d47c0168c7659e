//! The remote surface the exporter consumes

use async_trait::async_trait;

use super::types::{ConversationQuery, Page, SlackError};

/// Cursor-paginated workspace listing methods.
///
/// Every call takes the cursor returned by the previous page (`None` for the
/// first page) and returns one page. Implementations may retry transient
/// failures internally, but never across pages.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// `users.list`
    async fn list_members(&self, cursor: Option<&str>, limit: u32) -> Result<Page, SlackError>;

    /// `conversations.list`
    async fn list_conversations(
        &self,
        cursor: Option<&str>,
        limit: u32,
        query: &ConversationQuery,
    ) -> Result<Page, SlackError>;

    /// `conversations.history`
    async fn conversation_history(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page, SlackError>;
}
