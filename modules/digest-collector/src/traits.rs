//! Capabilities the pipeline consumes. Scraping, detail lookups and output
//! all live behind these so the core stays testable without a browser or
//! the network.

use async_trait::async_trait;
use digest_common::{OriginalRef, RawCandidate, ResultSet};

/// Lazy, possibly unbounded stream of timeline cards. Pulling may trigger
/// further loading (a scroll) as a side effect.
#[async_trait]
pub trait CandidateFeed: Send {
    /// Next card, `None` once the feed is exhausted. An error means the
    /// feed became unavailable mid-run.
    async fn next_candidate(&mut self) -> anyhow::Result<Option<RawCandidate>>;

    /// Loads performed so far, the initial view included.
    fn scrolls(&self) -> u32;

    /// Cards already loaded and not yet yielded. A feed at its scroll cap
    /// keeps serving these before collection stops.
    fn pending(&self) -> usize {
        0
    }
}

/// Finds the original behind a repost or quote that carried no inline
/// identity, typically by opening the card's detail page.
#[async_trait]
pub trait OriginalResolver: Send + Sync {
    async fn resolve_original(&self, candidate: &RawCandidate)
        -> anyhow::Result<Option<OriginalRef>>;
}

/// Reads the view-count text shown on a post's detail page.
#[async_trait]
pub trait DetailViewFetcher: Send + Sync {
    async fn fetch_detail_views(&self, url: &str) -> anyhow::Result<Option<String>>;
}

/// Where a finished (or partial) result goes.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, result: &ResultSet) -> anyhow::Result<()>;
}
