use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::DigestError;

/// Parameters for one collection run. Every field has a default and can be
/// overridden per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Length of the rolling window ending at run time.
    pub window_hours: u32,
    /// Maximum number of originals in the result.
    pub top_n: usize,
    pub max_scrolls: u32,
    pub max_candidates: u32,
    pub max_duration: Duration,
    /// Consecutive out-of-window candidates that end collection early. 0 disables.
    pub early_exit_streak: u32,
    /// Parallel detail-page lookups.
    pub detail_concurrency: usize,
    /// Upper bound on detail-page lookups per run.
    pub max_detail_lookups: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            top_n: 20,
            max_scrolls: 40,
            max_candidates: 400,
            max_duration: Duration::from_secs(180),
            early_exit_streak: 20,
            detail_concurrency: 4,
            max_detail_lookups: 50,
        }
    }
}

impl RunConfig {
    /// Defaults with `DIGEST_*` environment overrides applied.
    pub fn from_env() -> Result<Self, DigestError> {
        let mut config = Self::default();
        if let Some(v) = env_override("DIGEST_WINDOW_HOURS")? {
            config.window_hours = v;
        }
        if let Some(v) = env_override("DIGEST_TOP_N")? {
            config.top_n = v;
        }
        if let Some(v) = env_override("DIGEST_MAX_SCROLLS")? {
            config.max_scrolls = v;
        }
        if let Some(v) = env_override("DIGEST_MAX_CANDIDATES")? {
            config.max_candidates = v;
        }
        if let Some(secs) = env_override("DIGEST_MAX_DURATION_SECS")? {
            config.max_duration = Duration::from_secs(secs);
        }
        if let Some(v) = env_override("DIGEST_EARLY_EXIT_STREAK")? {
            config.early_exit_streak = v;
        }
        if let Some(v) = env_override("DIGEST_DETAIL_CONCURRENCY")? {
            config.detail_concurrency = v;
        }
        if let Some(v) = env_override("DIGEST_MAX_DETAIL_LOOKUPS")? {
            config.max_detail_lookups = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DigestError> {
        if self.window_hours == 0 {
            return Err(DigestError::Config("window_hours must be positive".into()));
        }
        if self.detail_concurrency == 0 {
            return Err(DigestError::Config("detail_concurrency must be positive".into()));
        }
        Ok(())
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.window_hours))
    }
}

/// Optional topic admission: keep originals whose text mentions a keyword
/// or whose author is a priority account. Empty lists disable the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilterConfig {
    pub keywords: Vec<String>,
    pub priority_accounts: Vec<String>,
}

impl TopicFilterConfig {
    pub fn is_enabled(&self) -> bool {
        !self.keywords.is_empty() || !self.priority_accounts.is_empty()
    }
}

/// Process-level configuration loaded from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub apify_api_key: Option<String>,
    pub output_dir: PathBuf,
    /// Local offset for dated file names and display-date parsing.
    pub utc_offset: FixedOffset,
    pub run: RunConfig,
    pub topics: TopicFilterConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, DigestError> {
        dotenvy::dotenv().ok();

        let offset_hours: i32 = env_override("DIGEST_UTC_OFFSET_HOURS")?.unwrap_or(9);
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            DigestError::Config(format!("DIGEST_UTC_OFFSET_HOURS out of range: {offset_hours}"))
        })?;

        let config = Self {
            apify_api_key: env::var("APIFY_API_KEY").ok().filter(|k| !k.is_empty()),
            output_dir: env::var("DIGEST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            utc_offset,
            run: RunConfig::from_env()?,
            topics: TopicFilterConfig {
                keywords: list_env("DIGEST_KEYWORDS"),
                priority_accounts: list_env("DIGEST_PRIORITY_ACCOUNTS"),
            },
        };
        Ok(config)
    }

    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => format!("{}...({} chars)", v.chars().take(5).collect::<String>(), v.len()),
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  APIFY_API_KEY: {}", preview_opt(&self.apify_api_key));
        tracing::info!("  DIGEST_OUTPUT_DIR: {}", self.output_dir.display());
        tracing::info!("  UTC offset: {}", self.utc_offset);
        tracing::info!(
            window_hours = self.run.window_hours,
            top_n = self.run.top_n,
            max_scrolls = self.run.max_scrolls,
            max_candidates = self.run.max_candidates,
            max_duration_secs = self.run.max_duration.as_secs(),
            early_exit_streak = self.run.early_exit_streak,
            "  Run parameters"
        );
        if self.topics.is_enabled() {
            tracing::info!(
                keywords = self.topics.keywords.len(),
                priority_accounts = self.topics.priority_accounts.len(),
                "  Topic filter enabled"
            );
        }
    }
}

fn env_override<T: FromStr>(key: &str) -> Result<Option<T>, DigestError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DigestError::Config(format!("{key} has an invalid value: {raw:?}"))),
        _ => Ok(None),
    }
}

fn list_env(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
