//! Slack integration module
//!
//! This module provides the Web API client and the paginated listing
//! surface the exporter consumes.

mod api;
mod client;
mod types;

pub use api::WorkspaceApi;
pub use client::SlackClient;
pub use types::{ConversationKind, ConversationQuery, Page, SlackAuthInfo, SlackError};
