// Library entry point for the exporter binary
pub mod config;
pub mod export;
pub mod slack;

pub use config::{ExportConfig, RateBudgets};
pub use export::{ExportError, ExportSummary, Exporter};
pub use slack::{SlackClient, WorkspaceApi};
