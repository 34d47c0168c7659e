//! Cursor-driven page retrieval

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use super::limiter::RateLimiter;
use super::types::ExportError;
use crate::slack::{Page, SlackError};

/// Receives every record of a paginated sequence, in API order.
#[async_trait]
pub trait RecordSink: Send {
    async fn accept(&mut self, record: Value) -> Result<(), ExportError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub pages: usize,
    pub records: usize,
}

/// Fetch pages through `limiter` until the API stops returning a cursor.
///
/// `fetch` is called with the cursor from the previous page (`None` first).
/// The next page is only requested after every record of the current page has
/// been accepted by `sink`. The first error from either side ends the loop.
pub async fn paginate<F, Fut, S>(
    limiter: &RateLimiter,
    resource: &str,
    mut fetch: F,
    sink: &mut S,
) -> Result<PageStats, ExportError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, SlackError>>,
    S: RecordSink + ?Sized,
{
    let mut stats = PageStats::default();
    let mut cursor: Option<String> = None;

    loop {
        stats.pages += 1;
        tracing::debug!(
            "Retrieving {} page {} (cursor: {:?})",
            resource,
            stats.pages,
            cursor
        );

        let request_cursor = cursor.take();
        let page = limiter.schedule(|| fetch(request_cursor)).await?;

        for record in page.items {
            sink.accept(record).await?;
            stats.records += 1;
        }

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::debug!(
        "Finished {} after {} pages, {} records",
        resource,
        stats.pages,
        stats.records
    );
    Ok(stats)
}
