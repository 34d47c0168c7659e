//! Workspace export pipeline
//!
//! Rate-limited, cursor-paginated retrieval of members, conversations and
//! conversation histories into JSON files, packaged as a zip archive.

mod archive;
mod limiter;
mod orchestrator;
mod pager;
mod types;
mod writer;

#[cfg(test)]
mod fake;

pub use archive::{archive_path, Archiver, ZipArchiver};
pub use limiter::RateLimiter;
pub use orchestrator::{
    folder_name, is_member_conversation, ExportJob, Exporter, CONVERSATIONS_FILE, MEMBERS_FILE,
};
pub use pager::{paginate, PageStats, RecordSink};
pub use types::{ExportError, ExportPhase, ExportSummary};
pub use writer::JsonArrayWriter;
