use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use botwit::notion::NOTION_API_URL;
use botwit::twitter::TWITTER_API_URL;
use botwit::{ArchiveReport, Archiver, BotwitError, NotionClient, TokenCache, TwitterClient};
use clap::Parser;
use reqwest::Client;
use time::UtcOffset;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Account whose self-mentions mark conversations to archive
    #[arg(long, env = "BOTWIT_USERNAME", default_value = "@gjeusel")]
    username: String,

    /// Twitter app consumer key
    #[arg(long, env = "TWITTER_CONSUMER_KEY", hide_env_values = true)]
    consumer_key: String,

    /// Twitter app consumer secret
    #[arg(long, env = "TWITTER_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: String,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    notion_token: String,

    /// Notion database receiving the archived conversations
    #[arg(long, env = "NOTION_DATABASE_ID")]
    database_id: String,

    /// UTC offset in hours used to date archived mentions
    #[arg(
        long,
        env = "BOTWIT_UTC_OFFSET",
        default_value_t = 1,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i8).range(-23..=23)
    )]
    utc_offset: i8,

    /// Seconds a bearer token is reused before requesting a new one
    #[arg(long, env = "BOTWIT_TOKEN_TTL", default_value_t = 24 * 60 * 60)]
    token_ttl: u64,

    /// Request timeout in seconds
    #[arg(long, env = "BOTWIT_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    #[arg(long, env = "TWITTER_API_URL", default_value = TWITTER_API_URL, hide = true)]
    twitter_api_url: String,

    #[arg(long, env = "NOTION_API_URL", default_value = NOTION_API_URL, hide = true)]
    notion_api_url: String,

    /// Log the pages that would be created instead of creating them
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging and full error chains on failure
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();
    init_logging(args.debug);

    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "loaded environment file");
    }

    match run(&args).await {
        Ok(report) => {
            info!(
                seen = report.seen,
                skipped = report.skipped,
                created = report.created,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            if args.debug {
                let mut source = std::error::Error::source(&e);
                while let Some(cause) = source {
                    eprintln!("caused by: {}", cause);
                    source = cause.source();
                }
                eprintln!("{:#?}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<ArchiveReport, BotwitError> {
    let utc_offset = UtcOffset::from_hms(args.utc_offset, 0, 0)
        .map_err(|e| BotwitError::Config(e.to_string()))?;

    let client = Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let twitter = TwitterClient::builder()
        .client(client.clone())
        .consumer_key(args.consumer_key.as_str())
        .consumer_secret(args.consumer_secret.as_str())
        .base_url(args.twitter_api_url.as_str())
        .token_cache(Arc::new(TokenCache::new(Duration::from_secs(args.token_ttl))))
        .build();
    let notion = NotionClient::builder()
        .client(client)
        .token(args.notion_token.as_str())
        .base_url(args.notion_api_url.as_str())
        .build();

    Archiver::builder()
        .twitter(&twitter)
        .notion(&notion)
        .database_id(args.database_id.as_str())
        .username(args.username.as_str())
        .utc_offset(utc_offset)
        .dry_run(args.dry_run)
        .build()
        .archive_recent_memos()
        .await
}

fn init_logging(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}
