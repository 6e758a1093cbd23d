// Test mocks for the digest pipeline.
//
// One mock per capability boundary:
// - MockFeed (CandidateFeed): scripted scrolls, cards, stalls and failures
// - MockResolver (OriginalResolver): HashMap-based card URL→original
// - MockDetailViews (DetailViewFetcher): HashMap-based URL→view text, with call counts
// - MockSink (ResultSink): records what was published
//
// Plus builders for timeline cards relative to a fixed run time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use digest_common::{post_id, EventKind, OriginalRef, RawCandidate, ResultSet};

use crate::traits::{CandidateFeed, DetailViewFetcher, OriginalResolver, ResultSink};

// ---------------------------------------------------------------------------
// Card builders
// ---------------------------------------------------------------------------

/// Fixed run time for tests: 2026-01-25 10:00 KST.
pub fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 25, 1, 0, 0).unwrap()
}

pub fn status_url(handle: &str, id: u64) -> String {
    format!("https://x.com/{handle}/status/{id}")
}

fn handle_of(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1)?;
    rest.split('/').nth(1).map(|h| h.to_lowercase())
}

fn card(
    url: &str,
    kind: EventKind,
    original: Option<&str>,
    minutes_ago: i64,
    views: Option<&str>,
) -> RawCandidate {
    let author = match kind {
        EventKind::Quote | EventKind::Post => handle_of(url),
        EventKind::Repost => original.and_then(handle_of),
    };
    RawCandidate {
        url: url.to_string(),
        kind,
        event_time: run_time() - chrono::Duration::minutes(minutes_ago),
        views_text: views.map(str::to_string),
        post_id: post_id(url).unwrap_or(url).to_string(),
        original: original.map(|o| OriginalRef {
            url: o.to_string(),
            id: post_id(o).unwrap_or(o).to_string(),
        }),
        author,
        text: None,
    }
}

/// An original post, `minutes_ago` before [`run_time`].
pub fn post(url: &str, minutes_ago: i64, views: Option<&str>) -> RawCandidate {
    card(url, EventKind::Post, None, minutes_ago, views)
}

/// A repost card; `views` is the original's count as the card shows it.
pub fn repost(url: &str, original: Option<&str>, minutes_ago: i64, views: Option<&str>) -> RawCandidate {
    card(url, EventKind::Repost, original, minutes_ago, views)
}

/// A quote card; `views` is the quote's own count.
pub fn quote(url: &str, original: Option<&str>, minutes_ago: i64, views: Option<&str>) -> RawCandidate {
    card(url, EventKind::Quote, original, minutes_ago, views)
}

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum FeedStep {
    Scroll,
    Card(RawCandidate),
    Stall(Duration),
    Fail(String),
}

/// Scripted feed. Steps replay in order: `.scroll()` loads a batch, `.card()`
/// yields a card, `.stall()` sleeps inside the pull, `.fail()` errors.
#[derive(Debug, Default)]
pub struct MockFeed {
    steps: VecDeque<FeedStep>,
    scrolls: u32,
    pulls: u32,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// One scroll followed by all cards.
    pub fn from_cards(cards: Vec<RawCandidate>) -> Self {
        cards.into_iter().fold(Self::new().scroll(), |feed, c| feed.card(c))
    }

    pub fn scroll(mut self) -> Self {
        self.steps.push_back(FeedStep::Scroll);
        self
    }

    pub fn card(mut self, candidate: RawCandidate) -> Self {
        self.steps.push_back(FeedStep::Card(candidate));
        self
    }

    pub fn stall(mut self, duration: Duration) -> Self {
        self.steps.push_back(FeedStep::Stall(duration));
        self
    }

    pub fn fail(mut self, message: &str) -> Self {
        self.steps.push_back(FeedStep::Fail(message.to_string()));
        self
    }

    /// Calls to `next_candidate` so far.
    pub fn pulls(&self) -> u32 {
        self.pulls
    }
}

#[async_trait]
impl CandidateFeed for MockFeed {
    async fn next_candidate(&mut self) -> Result<Option<RawCandidate>> {
        self.pulls += 1;
        while let Some(step) = self.steps.pop_front() {
            match step {
                FeedStep::Scroll => self.scrolls += 1,
                FeedStep::Card(candidate) => return Ok(Some(candidate)),
                FeedStep::Stall(duration) => tokio::time::sleep(duration).await,
                FeedStep::Fail(message) => bail!(message),
            }
        }
        Ok(None)
    }

    fn scrolls(&self) -> u32 {
        self.scrolls
    }

    fn pending(&self) -> usize {
        self.steps
            .iter()
            .take_while(|step| matches!(step, FeedStep::Card(_)))
            .count()
    }
}

// ---------------------------------------------------------------------------
// MockResolver
// ---------------------------------------------------------------------------

/// Card URL → original URL. Unregistered cards resolve to `None`.
pub struct MockResolver {
    originals: HashMap<String, String>,
    failing: bool,
    delay: Option<Duration>,
    calls: Mutex<u32>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self {
            originals: HashMap::new(),
            failing: false,
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn resolves(mut self, card_url: &str, original_url: &str) -> Self {
        self.originals
            .insert(card_url.to_string(), original_url.to_string());
        self
    }

    /// Every lookup returns an error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Each lookup sleeps before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OriginalResolver for MockResolver {
    async fn resolve_original(&self, candidate: &RawCandidate) -> Result<Option<OriginalRef>> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            bail!("detail page did not load");
        }
        Ok(self.originals.get(&candidate.url).map(|url| OriginalRef {
            url: url.clone(),
            id: post_id(url).unwrap_or(url).to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// MockDetailViews
// ---------------------------------------------------------------------------

/// URL → view-count text from a detail page. Unregistered URLs return `None`.
pub struct MockDetailViews {
    views: HashMap<String, String>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockDetailViews {
    pub fn new() -> Self {
        Self {
            views: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_url(mut self, url: &str, views_text: &str) -> Self {
        self.views.insert(url.to_string(), views_text.to_string());
        self
    }

    /// Lookups of `url` return an error.
    pub fn failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Each lookup sleeps before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls_for(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Default for MockDetailViews {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DetailViewFetcher for MockDetailViews {
    async fn fetch_detail_views(&self, url: &str) -> Result<Option<String>> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(url) {
            return Err(anyhow!("detail page for {url} timed out"));
        }
        Ok(self.views.get(url).cloned())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Keeps every published result in memory.
#[derive(Default)]
pub struct MockSink {
    published: Mutex<Vec<ResultSet>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<ResultSet> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for MockSink {
    async fn publish(&self, result: &ResultSet) -> Result<()> {
        self.published.lock().unwrap().push(result.clone());
        Ok(())
    }
}
