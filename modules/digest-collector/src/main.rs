use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use digest_common::AppConfig;
use digest_collector::sources::{
    ApifyDetailViews, ApifyResolver, ApifyTimelineFeed, CaptureFeed, InlineOnly, NoDetailViews,
};
use digest_collector::store::{DatedFileSink, StdoutSink};
use digest_collector::traits::{CandidateFeed, DetailViewFetcher, OriginalResolver, ResultSink};
use digest_collector::{DigestDeps, DigestRun};

#[derive(Parser, Debug)]
#[command(
    name = "digest-collector",
    about = "Rank the most-viewed original posts surfaced on a timeline within a time window"
)]
struct Args {
    /// Replay a JSON-lines timeline capture instead of scraping
    #[arg(long, conflicts_with = "handles")]
    capture: Option<PathBuf>,

    /// Comma-separated handles to pull through Apify
    #[arg(long, value_delimiter = ',')]
    handles: Vec<String>,

    /// Tweets requested per handle
    #[arg(long, default_value_t = 100)]
    per_handle: u32,

    #[arg(long)]
    window_hours: Option<u32>,

    #[arg(long)]
    top_n: Option<usize>,

    #[arg(long)]
    max_scrolls: Option<u32>,

    #[arg(long)]
    max_candidates: Option<u32>,

    /// Wall-clock budget for collection, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Consecutive out-of-window cards before stopping (0 disables)
    #[arg(long)]
    early_exit_streak: Option<u32>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Print the result as JSON instead of writing dated files
    #[arg(long)]
    stdout: bool,

    /// Rank originals even if an earlier day already published them
    #[arg(long)]
    no_history: bool,

    #[arg(long, value_delimiter = ',')]
    keywords: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    priority_accounts: Vec<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("digest={}", args.log_level).parse()?)
                .add_directive(format!("apify_client={}", args.log_level).parse()?),
        )
        .init();

    info!("Digest collector starting...");

    let mut config = AppConfig::from_env()?;
    apply_overrides(&mut config, &args);
    config.run.validate()?;
    config.log_redacted();

    let run_time = Utc::now();
    let reference = run_time.with_timezone(&config.utc_offset);
    let file_sink = DatedFileSink::new(&config.output_dir, config.utc_offset);

    let client = config
        .apify_api_key
        .clone()
        .map(|key| Arc::new(ApifyClient::new(key)));

    let mut feed: Box<dyn CandidateFeed> = match (&args.capture, &client) {
        (Some(path), _) => Box::new(CaptureFeed::open(path, reference).await?),
        (None, Some(client)) if !args.handles.is_empty() => Box::new(ApifyTimelineFeed::new(
            client.clone(),
            args.handles.clone(),
            args.per_handle,
        )),
        (None, None) if !args.handles.is_empty() => bail!("--handles needs APIFY_API_KEY"),
        _ => bail!("nothing to collect: pass --capture or --handles"),
    };

    let (resolver, detail_views): (Arc<dyn OriginalResolver>, Arc<dyn DetailViewFetcher>) =
        match &client {
            Some(client) => (
                Arc::new(ApifyResolver::new(client.clone())),
                Arc::new(ApifyDetailViews::new(client.clone())),
            ),
            None => (Arc::new(InlineOnly), Arc::new(NoDetailViews)),
        };

    let published = if args.no_history {
        Default::default()
    } else {
        file_sink.load_published(run_time)?
    };

    let deps = DigestDeps::builder()
        .resolver(resolver)
        .detail_views(detail_views)
        .config(config.run.clone())
        .topics(config.topics.clone())
        .published(published)
        .build();

    let sink: Box<dyn ResultSink> = if args.stdout {
        Box::new(StdoutSink)
    } else {
        Box::new(file_sink)
    };

    match DigestRun::new(deps).execute(feed.as_mut(), run_time).await {
        Ok(result) => {
            sink.publish(&result).await?;
            info!("{result}");
            Ok(())
        }
        Err(failure) => {
            sink.publish(&failure.partial).await?;
            info!("{}", failure.partial);
            error!(error = %failure.error, "Run ended early; partial result saved");
            Err(failure.into())
        }
    }
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    let run = &mut config.run;
    if let Some(v) = args.window_hours {
        run.window_hours = v;
    }
    if let Some(v) = args.top_n {
        run.top_n = v;
    }
    if let Some(v) = args.max_scrolls {
        run.max_scrolls = v;
    }
    if let Some(v) = args.max_candidates {
        run.max_candidates = v;
    }
    if let Some(secs) = args.timeout {
        run.max_duration = Duration::from_secs(secs);
    }
    if let Some(v) = args.early_exit_streak {
        run.early_exit_streak = v;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if !args.keywords.is_empty() {
        config.topics.keywords = args.keywords.clone();
    }
    if !args.priority_accounts.is_empty() {
        config.topics.priority_accounts = args.priority_accounts.clone();
    }
}
