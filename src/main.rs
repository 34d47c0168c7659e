use clap::Parser;
use slack_export::config::{
    ExportConfig, RateBudgets, DEFAULT_CONVERSATIONS_PER_MINUTE, DEFAULT_HISTORY_PER_MINUTE,
    DEFAULT_MEMBERS_PER_MINUTE, DEFAULT_PAGE_SIZE,
};
use slack_export::{Exporter, SlackClient};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "slack-export", about = "Export a Slack workspace to a zip of JSON files")]
struct Args {
    /// Slack user or bot token
    #[arg(short, long, env = "SLACK_EXPORT_TOKEN", hide_env_values = true)]
    token: String,

    /// Directory the date-time named folder and zip are created in
    #[arg(short, long, env = "SLACK_EXPORT_DESTINATION")]
    destination: PathBuf,

    /// Team ID, required for Enterprise Grid workspaces
    #[arg(long, env = "SLACK_EXPORT_TEAM_ID")]
    team_id: Option<String>,

    /// Override the Slack Web API root
    #[arg(long, env = "SLACK_EXPORT_API_BASE")]
    api_base: Option<String>,

    #[arg(long, env = "SLACK_EXPORT_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// users.list budget in requests per minute
    #[arg(long, default_value_t = DEFAULT_MEMBERS_PER_MINUTE)]
    members_rpm: u32,

    /// conversations.list budget in requests per minute
    #[arg(long, default_value_t = DEFAULT_CONVERSATIONS_PER_MINUTE)]
    conversations_rpm: u32,

    /// conversations.history budget in requests per minute
    #[arg(long, default_value_t = DEFAULT_HISTORY_PER_MINUTE)]
    history_rpm: u32,

    /// Log level used when RUST_LOG is not set
    #[arg(short, long, env = "SLACK_EXPORT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("slack_export={}", args.log_level))
            }),
        )
        .init();

    tracing::info!("Process timer start now");
    let started = Instant::now();

    match run(args).await {
        Ok(()) => {
            tracing::info!(
                "Process finished with elapsed seconds {:.3}",
                started.elapsed().as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let destination = resolve_destination(&args.destination)?;

    let mut client = SlackClient::new(args.token);
    if let Some(team_id) = args.team_id {
        client = client.with_team_id(team_id);
    }
    if let Some(api_base) = args.api_base {
        client = client.with_api_base(api_base);
    }

    let auth = client.test_auth().await?;
    tracing::info!(
        "Authenticated as {} ({}) in workspace {} ({})",
        auth.user_name,
        auth.user_id,
        auth.team_name,
        auth.team_id
    );

    let config = ExportConfig::new(destination)
        .with_page_size(args.page_size)
        .with_rates(RateBudgets {
            members_per_minute: args.members_rpm,
            conversations_per_minute: args.conversations_rpm,
            history_per_minute: args.history_rpm,
        });
    config.validate()?;

    let summary = Exporter::new(config, Arc::new(client)).run().await?;
    tracing::info!(
        "Exported {} members, {} conversations, {} messages to {}",
        summary.members,
        summary.conversations,
        summary.messages,
        summary.archive.display()
    );

    Ok(())
}

/// Absolute path of an existing directory
fn resolve_destination(destination: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let resolved = std::fs::canonicalize(destination)
        .map_err(|e| format!("Unable to resolve destination {}: {}", destination.display(), e))?;

    if !resolved.is_dir() {
        return Err(format!("Destination {} is not a directory", resolved.display()).into());
    }

    tracing::debug!("Resolved destination {}", resolved.display());
    Ok(resolved)
}
