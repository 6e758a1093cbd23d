//! Timeline cards and detail lookups through the Apify tweet scraper.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use apify_client::{ApifyClient, Tweet};
use async_trait::async_trait;
use tracing::{info, warn};

use digest_common::{canonical_post_url, post_id, EventKind, OriginalRef, RawCandidate};

use crate::traits::{CandidateFeed, DetailViewFetcher, OriginalResolver};

/// Map one scraped tweet to a timeline card. Reposts carry the original's
/// view count, author and text; quotes carry their own.
pub fn candidate_from_tweet(tweet: &Tweet) -> Option<RawCandidate> {
    let url = canonical_post_url(tweet.permalink()?)?;
    let id = tweet
        .id
        .clone()
        .or_else(|| post_id(&url).map(str::to_string))?;
    let event_time = tweet.created_at_utc()?;

    let (kind, shown) = match (tweet.retweet.as_deref(), tweet.quote.as_deref()) {
        (Some(original), _) => (EventKind::Repost, Some(original)),
        (None, Some(quoted)) => (EventKind::Quote, Some(quoted)),
        (None, None) if tweet.is_retweet => (EventKind::Repost, None),
        (None, None) if tweet.is_quote => (EventKind::Quote, None),
        (None, None) => (EventKind::Post, None),
    };

    let original = shown.and_then(original_ref);
    let content = match kind {
        EventKind::Repost => shown,
        EventKind::Post | EventKind::Quote => Some(tweet),
    };

    Some(RawCandidate {
        url,
        kind,
        event_time,
        views_text: content.and_then(|t| t.view_count).map(|v| v.to_string()),
        post_id: id,
        original,
        author: content.and_then(|t| t.author_handle()).map(str::to_lowercase),
        text: content.and_then(|t| t.content()).map(str::to_string),
    })
}

fn original_ref(tweet: &Tweet) -> Option<OriginalRef> {
    let url = canonical_post_url(tweet.permalink()?)?;
    let id = tweet
        .id
        .clone()
        .or_else(|| post_id(&url).map(str::to_string))?;
    Some(OriginalRef { url, id })
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Pulls each handle's latest tweets in turn. One handle's batch is one
/// scroll.
pub struct ApifyTimelineFeed {
    client: Arc<ApifyClient>,
    handles: VecDeque<String>,
    per_handle: u32,
    buffer: VecDeque<RawCandidate>,
    scrolls: u32,
}

impl ApifyTimelineFeed {
    pub fn new(client: Arc<ApifyClient>, handles: Vec<String>, per_handle: u32) -> Self {
        Self {
            client,
            handles: handles
                .into_iter()
                .map(|h| h.trim().trim_start_matches('@').to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            per_handle,
            buffer: VecDeque::new(),
            scrolls: 0,
        }
    }
}

#[async_trait]
impl CandidateFeed for ApifyTimelineFeed {
    async fn next_candidate(&mut self) -> Result<Option<RawCandidate>> {
        loop {
            if let Some(candidate) = self.buffer.pop_front() {
                return Ok(Some(candidate));
            }
            let Some(handle) = self.handles.pop_front() else {
                return Ok(None);
            };

            let tweets = self.client.scrape_x_timeline(&handle, self.per_handle).await?;
            self.scrolls += 1;
            let before = self.buffer.len();
            self.buffer
                .extend(tweets.iter().filter_map(candidate_from_tweet));
            info!(
                handle = %handle,
                tweets = tweets.len(),
                cards = self.buffer.len() - before,
                "Timeline batch loaded"
            );
        }
    }

    fn scrolls(&self) -> u32 {
        self.scrolls
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ---------------------------------------------------------------------------
// Detail lookups
// ---------------------------------------------------------------------------

/// Resolves a repost's or quote's original by scraping the card's own URL.
pub struct ApifyResolver {
    client: Arc<ApifyClient>,
}

impl ApifyResolver {
    pub fn new(client: Arc<ApifyClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OriginalResolver for ApifyResolver {
    async fn resolve_original(&self, candidate: &RawCandidate) -> Result<Option<OriginalRef>> {
        let Some(tweet) = self.client.fetch_x_post(&candidate.url).await? else {
            warn!(url = %candidate.url, "Scraper returned nothing for card");
            return Ok(None);
        };
        let nested = match candidate.kind {
            EventKind::Repost => tweet.retweet.as_deref(),
            EventKind::Quote => tweet.quote.as_deref(),
            EventKind::Post => None,
        };
        Ok(nested.and_then(original_ref))
    }
}

/// Reads an original's view count from the scraped post.
pub struct ApifyDetailViews {
    client: Arc<ApifyClient>,
}

impl ApifyDetailViews {
    pub fn new(client: Arc<ApifyClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DetailViewFetcher for ApifyDetailViews {
    async fn fetch_detail_views(&self, url: &str) -> Result<Option<String>> {
        let tweet = self.client.fetch_x_post(url).await?;
        Ok(tweet.and_then(|t| t.view_count).map(|v| v.to_string()))
    }
}
