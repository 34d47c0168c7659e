//! Export orchestration
//!
//! A run creates a timestamped working directory under the destination, then
//! exports members and conversations concurrently. Every conversation the
//! caller belongs to gets its own history branch, all sharing one history
//! limiter. Once every branch has finished the directory is zipped next to
//! itself and removed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

use super::archive::{Archiver, ZipArchiver};
use super::limiter::RateLimiter;
use super::pager::{paginate, RecordSink};
use super::types::{ExportError, ExportPhase, ExportSummary};
use super::writer::JsonArrayWriter;
use crate::config::{ExportConfig, RateBudgets};
use crate::slack::{ConversationQuery, WorkspaceApi};

pub const MEMBERS_FILE: &str = "members.json";
pub const CONVERSATIONS_FILE: &str = "conversations.json";

const FOLDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// `YYYY-MM-DD-HH-MM-SS` in UTC, sub-second precision dropped
pub fn folder_name(at: DateTime<Utc>) -> String {
    at.format(FOLDER_TIMESTAMP_FORMAT).to_string()
}

/// DMs don't report `is_member`; every other kind does.
pub fn is_member_conversation(conversation: &Value) -> bool {
    conversation["is_im"].as_bool().unwrap_or(false)
        || conversation["is_member"].as_bool().unwrap_or(false)
}

/// The conversation id, checked to be usable as a file name in the working directory.
fn history_file_stem(conversation: &Value) -> Result<&str, ExportError> {
    let id = conversation["id"]
        .as_str()
        .ok_or_else(|| ExportError::InvalidRecord("conversation without an id".into()))?;

    let reserved = [MEMBERS_FILE, CONVERSATIONS_FILE]
        .iter()
        .any(|file| file.strip_suffix(".json") == Some(id));
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) || reserved {
        return Err(ExportError::InvalidRecord(format!(
            "conversation id {:?} is not a valid file name",
            id
        )));
    }

    Ok(id)
}

/// One limiter per endpoint tier. History is shared with spawned branches.
struct Limiters {
    members: RateLimiter,
    conversations: RateLimiter,
    history: Arc<RateLimiter>,
}

impl Limiters {
    fn from_budgets(rates: &RateBudgets) -> Result<Self, ExportError> {
        Ok(Self {
            members: RateLimiter::per_minute(rates.members_per_minute)?,
            conversations: RateLimiter::per_minute(rates.conversations_per_minute)?,
            history: Arc::new(RateLimiter::per_minute(rates.history_per_minute)?),
        })
    }
}

/// State of a single export run
pub struct ExportJob {
    dir: PathBuf,
    limiters: Limiters,
    phase: ExportPhase,
}

impl ExportJob {
    /// Create the working directory `<root>/<timestamp>`.
    ///
    /// Fails if it already exists; a run never writes into an old directory.
    pub async fn create(root: &Path, rates: &RateBudgets, now: DateTime<Utc>) -> Result<Self, ExportError> {
        let limiters = Limiters::from_budgets(rates)?;
        let dir = root.join(folder_name(now));

        tokio::fs::create_dir(&dir).await?;
        tracing::debug!("Created folder {}", dir.display());

        Ok(Self {
            dir,
            limiters,
            phase: ExportPhase::DirectoryCreated,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    fn enter(&mut self, phase: ExportPhase) {
        tracing::debug!("Export phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }
}

pub struct Exporter {
    config: ExportConfig,
    api: Arc<dyn WorkspaceApi>,
    archiver: Arc<dyn Archiver>,
}

impl Exporter {
    pub fn new(config: ExportConfig, api: Arc<dyn WorkspaceApi>) -> Self {
        Self {
            config,
            api,
            archiver: Arc::new(ZipArchiver::new()),
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub async fn run(&self) -> Result<ExportSummary, ExportError> {
        self.run_at(Utc::now()).await
    }

    /// Run an export whose working directory is named after `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ExportSummary, ExportError> {
        tracing::info!("Begin export into {}", self.config.destination.display());
        self.config.validate()?;

        let mut job = match ExportJob::create(&self.config.destination, &self.config.rates, now).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Export aborted during {}: {}", ExportPhase::Init, e);
                return Err(e);
            }
        };

        match self.drive(&mut job).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::error!(
                    "Export aborted during {}, working directory left at {}: {}",
                    job.phase,
                    job.dir.display(),
                    e
                );
                job.enter(ExportPhase::Aborted);
                Err(e)
            }
        }
    }

    async fn drive(&self, job: &mut ExportJob) -> Result<ExportSummary, ExportError> {
        job.enter(ExportPhase::Running);
        let running: &ExportJob = job;
        let (members, (conversations, messages)) = tokio::try_join!(
            self.export_members(running),
            self.export_conversations(running)
        )?;

        job.enter(ExportPhase::Archiving);
        let archive = self.archiver.archive(&job.dir).await?;

        job.enter(ExportPhase::Cleanup);
        let cleaned_up = match tokio::fs::remove_dir_all(&job.dir).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Archive written but working directory {} could not be removed: {}",
                    job.dir.display(),
                    e
                );
                false
            }
        };

        job.enter(ExportPhase::Done);
        tracing::info!("End export to {}", archive.display());

        Ok(ExportSummary {
            archive,
            members,
            conversations,
            messages,
            cleaned_up,
        })
    }

    async fn export_members(&self, job: &ExportJob) -> Result<usize, ExportError> {
        let file = job.dir.join(MEMBERS_FILE);
        tracing::info!("Begin member export to {}", file.display());

        let mut writer = JsonArrayWriter::create(&file).await?;
        let api = self.api.as_ref();
        let limit = self.config.page_size;

        paginate(
            &job.limiters.members,
            "members",
            move |cursor| async move { api.list_members(cursor.as_deref(), limit).await },
            &mut writer,
        )
        .await?;

        let count = writer.finish().await?;
        tracing::info!("Finished retrieving {} members", count);
        Ok(count)
    }

    /// Returns (conversations written, messages written across all histories).
    async fn export_conversations(&self, job: &ExportJob) -> Result<(usize, usize), ExportError> {
        let file = job.dir.join(CONVERSATIONS_FILE);
        tracing::info!("Begin conversation export to {}", file.display());

        let mut sink = ConversationSink {
            writer: JsonArrayWriter::create(&file).await?,
            histories: JoinSet::new(),
            api: self.api.clone(),
            limiter: job.limiters.history.clone(),
            dir: job.dir.clone(),
            page_size: self.config.page_size,
            started: HashSet::new(),
            messages: 0,
            skipped: 0,
        };

        let api = self.api.as_ref();
        let limit = self.config.page_size;
        let query = ConversationQuery::everything();
        let query = &query;

        paginate(
            &job.limiters.conversations,
            "conversations",
            move |cursor| async move { api.list_conversations(cursor.as_deref(), limit, query).await },
            &mut sink,
        )
        .await?;

        sink.finish().await
    }
}

/// Writes member conversations and starts a history branch for each one.
struct ConversationSink {
    writer: JsonArrayWriter,
    // Dropping the set aborts branches still running
    histories: JoinSet<Result<usize, ExportError>>,
    api: Arc<dyn WorkspaceApi>,
    limiter: Arc<RateLimiter>,
    dir: PathBuf,
    page_size: u32,
    // Ids that already have a history branch writing `<id>.json`
    started: HashSet<String>,
    messages: usize,
    skipped: usize,
}

impl ConversationSink {
    /// Wait for every history branch, then close the conversations file.
    async fn finish(mut self) -> Result<(usize, usize), ExportError> {
        tracing::debug!("Waiting on {} conversation histories", self.histories.len());

        while let Some(joined) = self.histories.join_next().await {
            self.messages += joined??;
        }

        let conversations = self.writer.finish().await?;
        tracing::info!(
            "Finished retrieving {} conversations ({} skipped as non-member)",
            conversations,
            self.skipped
        );
        Ok((conversations, self.messages))
    }
}

#[async_trait]
impl RecordSink for ConversationSink {
    async fn accept(&mut self, conversation: Value) -> Result<(), ExportError> {
        // Stop paging as soon as any finished branch has failed
        while let Some(joined) = self.histories.try_join_next() {
            self.messages += joined??;
        }

        if !is_member_conversation(&conversation) {
            self.skipped += 1;
            return Ok(());
        }

        let channel_id = history_file_stem(&conversation)?.to_string();
        if !self.started.insert(channel_id.clone()) {
            return Err(ExportError::InvalidRecord(format!(
                "conversation {} listed more than once",
                channel_id
            )));
        }
        self.writer.write(&conversation).await?;

        self.histories.spawn(export_history(
            self.api.clone(),
            self.limiter.clone(),
            self.dir.join(format!("{}.json", channel_id)),
            channel_id,
            self.page_size,
        ));
        Ok(())
    }
}

async fn export_history(
    api: Arc<dyn WorkspaceApi>,
    limiter: Arc<RateLimiter>,
    file: PathBuf,
    channel_id: String,
    page_size: u32,
) -> Result<usize, ExportError> {
    tracing::info!("Begin individual conversation export to {}", file.display());

    let mut writer = JsonArrayWriter::create(&file).await?;
    let api = api.as_ref();
    let channel = channel_id.as_str();
    let resource = format!("history {}", channel_id);

    paginate(
        &limiter,
        &resource,
        move |cursor| async move {
            api.conversation_history(channel, cursor.as_deref(), page_size)
                .await
        },
        &mut writer,
    )
    .await?;

    let count = writer.finish().await?;
    tracing::info!("Finished retrieving {} messages from {}", count, channel_id);
    Ok(count)
}
