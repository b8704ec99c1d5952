//! Command line client for a running recommender server.
//!
//! Every call goes through the resilient outbound pipeline, so it gets a
//! correlation id, request logging and retries on idempotent reads.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use music_recommender_server::config::{FileConfig, OutboundSettings};
use music_recommender_server::outbound::{RecommenderClient, RequestContext};
use music_recommender_server::telemetry::{FeedbackItem, FeedbackPayload};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Base URL of the server, e.g. http://127.0.0.1:5080.
    #[clap(long)]
    pub base_url: Option<String>,

    /// Optional TOML config file, only its `[outbound]` table is used.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Correlation id to send instead of a generated one.
    #[clap(long)]
    pub correlation_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Uploads an audio file and prints the predicted genre and recommendations.
    RecommendFile {
        #[clap(value_parser = parse_path)]
        path: PathBuf,
    },

    /// Runs the recommendation on a song from the server's library.
    RecommendSong { song_id: String },

    /// Sends feedback on recommended songs.
    Feedback {
        /// Overall verdict, used only when no song is voted.
        #[clap(long)]
        liked: Option<bool>,

        /// Rating from 1 to 5.
        #[clap(long)]
        rating: Option<i32>,

        /// Predicted genre the feedback refers to.
        #[clap(long)]
        genre: Option<String>,

        /// Song ids the listener liked.
        #[clap(long = "like")]
        likes: Vec<String>,

        /// Song ids the listener disliked.
        #[clap(long = "dislike")]
        dislikes: Vec<String>,

        #[clap(long)]
        comment: Option<String>,
    },

    /// Prints the aggregated listening statistics.
    Stats,

    /// Prints which inference paths the server can see.
    Health,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(client: &RecommenderClient, command: Command, ctx: &RequestContext) -> Result<()> {
    match command {
        Command::RecommendFile { path } => {
            print_json(&client.recommend_file(&path, ctx).await?)?;
        }
        Command::RecommendSong { song_id } => {
            print_json(&client.recommend_song(&song_id, ctx).await?)?;
        }
        Command::Feedback {
            liked,
            rating,
            genre,
            likes,
            dislikes,
            comment,
        } => {
            let items = likes
                .into_iter()
                .map(|id| FeedbackItem::vote(id, Some(true)))
                .chain(
                    dislikes
                        .into_iter()
                        .map(|id| FeedbackItem::vote(id, Some(false))),
                )
                .collect();
            let feedback = FeedbackPayload {
                genre,
                liked,
                rating,
                comment,
                items,
                ..FeedbackPayload::new_session()
            };
            client.send_feedback(&feedback, ctx).await?;
            info!("Feedback sent");
        }
        Command::Stats => print_json(&client.stats(ctx).await?)?,
        Command::Health => {
            let report = client.health(ctx).await?;
            if !report.is_ready() {
                warn!("Server is missing required inference paths");
            }
            print_json(&report)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let settings = OutboundSettings::resolve(cli_args.base_url, file_config.as_ref())?;
    let client = RecommenderClient::new(&settings).context("Failed to build HTTP client")?;

    let mut ctx = RequestContext::new();
    if let Some(id) = cli_args.correlation_id {
        ctx = ctx.with_correlation_id(id);
    }

    let cancel = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request...");
            cancel.cancel();
        }
    });

    execute(&client, cli_args.command, &ctx)
        .await
        .with_context(|| format!("Request to {} failed", settings.base_url))
}
