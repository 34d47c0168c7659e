//! Export configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::export::{ExportError, RateLimiter};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Largest `limit` Slack accepts on the listing methods
pub const MAX_PAGE_SIZE: u32 = 1000;

// Slack tier 2 (users.list, conversations.list) and tier 3 (conversations.history)
pub const DEFAULT_MEMBERS_PER_MINUTE: u32 = 20;
pub const DEFAULT_CONVERSATIONS_PER_MINUTE: u32 = 20;
pub const DEFAULT_HISTORY_PER_MINUTE: u32 = 50;

/// Requests-per-minute budget for each endpoint tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBudgets {
    pub members_per_minute: u32,
    pub conversations_per_minute: u32,
    pub history_per_minute: u32,
}

impl Default for RateBudgets {
    fn default() -> Self {
        Self {
            members_per_minute: DEFAULT_MEMBERS_PER_MINUTE,
            conversations_per_minute: DEFAULT_CONVERSATIONS_PER_MINUTE,
            history_per_minute: DEFAULT_HISTORY_PER_MINUTE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Directory the timestamped working directory and archive are created in
    pub destination: PathBuf,
    pub page_size: u32,
    pub rates: RateBudgets,
}

impl ExportConfig {
    pub fn new(destination: PathBuf) -> Self {
        Self {
            destination,
            page_size: DEFAULT_PAGE_SIZE,
            rates: RateBudgets::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_rates(mut self, rates: RateBudgets) -> Self {
        self.rates = rates;
        self
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ExportError::Config(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        for (tier, budget) in [
            ("members", self.rates.members_per_minute),
            ("conversations", self.rates.conversations_per_minute),
            ("history", self.rates.history_per_minute),
        ] {
            if RateLimiter::safe_rate(budget) == 0 {
                return Err(ExportError::Config(format!(
                    "{} rate budget of {} requests per minute leaves no safe rate",
                    tier, budget
                )));
            }
        }

        Ok(())
    }
}
