use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::views::{format_views, parse_views};

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// What the card on the timeline represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An original post by the account shown.
    Post,
    /// Someone reposted an original; the card shows the original.
    Repost,
    /// A post quoting another post.
    Quote,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Post => write!(f, "post"),
            EventKind::Repost => write!(f, "repost"),
            EventKind::Quote => write!(f, "quote"),
        }
    }
}

/// Identity of the original post behind a repost or quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalRef {
    pub url: String,
    pub id: String,
}

/// One card as the scraping side produced it. Ephemeral: consumed within a
/// single collection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    /// URL of the card itself (the quote's own URL for a quote).
    pub url: String,
    pub kind: EventKind,
    /// When the action happened: repost time for reposts, quote time for quotes.
    pub event_time: DateTime<Utc>,
    /// View-count text exactly as rendered, if the card showed one.
    pub views_text: Option<String>,
    pub post_id: String,
    /// Inline original identity for reposts and quotes, when the card carried it.
    pub original: Option<OriginalRef>,
    pub author: Option<String>,
    pub text: Option<String>,
}

impl RawCandidate {
    /// Key used to skip a card the feed shows more than once.
    pub fn seen_key(&self) -> (EventKind, String) {
        (self.kind, self.post_id.clone())
    }
}

/// View count of an original: an exact number, or not yet known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewCount {
    Confirmed(u64),
    #[default]
    Unconfirmed,
}

impl ViewCount {
    /// Absent or unparsable text leaves the count unconfirmed.
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(parse_views) {
            Some(Ok(count)) => ViewCount::Confirmed(count),
            _ => ViewCount::Unconfirmed,
        }
    }

    pub fn count(self) -> Option<u64> {
        match self {
            ViewCount::Confirmed(count) => Some(count),
            ViewCount::Unconfirmed => None,
        }
    }

    pub fn is_confirmed(self) -> bool {
        matches!(self, ViewCount::Confirmed(_))
    }
}

impl Serialize for ViewCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.count().serialize(serializer)
    }
}

/// A candidate with its canonical original identity resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCandidate {
    pub raw: RawCandidate,
    /// Canonical dedup identity, whichever event kind surfaced it.
    pub original_url: String,
    pub original_id: String,
    /// Views attributable to the original (never a quote's own count).
    pub views: ViewCount,
    pub in_window: bool,
}

impl ClassifiedCandidate {
    pub fn kind(&self) -> EventKind {
        self.raw.kind
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        self.raw.event_time
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Quote URLs in discovery order, without duplicates. Equality ignores order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct QuoteSet(Vec<String>);

impl QuoteSet {
    /// Returns false when the URL was already present.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.0.iter().any(|existing| existing == url) {
            return false;
        }
        self.0.push(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|existing| existing == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl PartialEq for QuoteSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().collect::<HashSet<_>>() == other.0.iter().collect::<HashSet<_>>()
    }
}

impl Eq for QuoteSet {}

/// Everything known about one distinct original post during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginalRecord {
    pub url: String,
    pub id: String,
    pub views: ViewCount,
    /// Earliest in-window event that referenced this original.
    pub first_seen: DateTime<Utc>,
    pub quotes: QuoteSet,
    pub surfaced_by: BTreeSet<EventKind>,
    /// Author and text as shown on a Post or Repost card.
    pub author: Option<String>,
    pub text: Option<String>,
}

/// Original URL → quote URLs, in ranked order of the originals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteMapping {
    entries: Vec<(String, Vec<String>)>,
}

impl QuoteMapping {
    pub fn insert(&mut self, original: String, quotes: Vec<String>) {
        match self.entries.iter_mut().find(|(url, _)| *url == original) {
            Some((_, existing)) => *existing = quotes,
            None => self.entries.push((original, quotes)),
        }
    }

    pub fn get(&self, original: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(url, _)| url == original)
            .map(|(_, quotes)| quotes.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(url, _)| url.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(url, quotes)| (url.as_str(), quotes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_quotes(&self) -> usize {
        self.entries.iter().map(|(_, quotes)| quotes.len()).sum()
    }
}

impl Serialize for QuoteMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (original, quotes) in &self.entries {
            map.serialize_entry(original, quotes)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Collection state and run statistics
// ---------------------------------------------------------------------------

/// Which hard cap ended collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cap {
    Scrolls,
    Candidates,
}

/// Collection controller state. Every state but `Collecting` is terminal.
/// A run whose feed failed mid-collection reports `Collecting`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    #[default]
    Collecting,
    StoppedByCap(Cap),
    StoppedByTimeout,
    StoppedByEarlyExit,
    Done,
}

impl CollectionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CollectionState::Collecting)
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionState::Collecting => write!(f, "interrupted"),
            CollectionState::StoppedByCap(Cap::Scrolls) => write!(f, "scroll cap reached"),
            CollectionState::StoppedByCap(Cap::Candidates) => write!(f, "candidate cap reached"),
            CollectionState::StoppedByTimeout => write!(f, "timed out"),
            CollectionState::StoppedByEarlyExit => write!(f, "early exit"),
            CollectionState::Done => write!(f, "feed exhausted"),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub candidates_seen: u32,
    pub duplicates_skipped: u32,
    pub in_window: u32,
    pub out_of_window: u32,
    pub unresolved: u32,
    pub unconfirmed: u32,
    pub detail_lookups: u32,
    pub historical_excluded: u32,
    pub topic_filtered: u32,
    /// Quotes dropped because they surfaced only as another quote's original.
    pub nested_quotes: u32,
    pub distinct_originals: u32,
    pub final_count: u32,
    pub scrolls: u32,
    pub collection: CollectionState,
    pub elapsed_ms: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Digest Run Complete ===")?;
        writeln!(f, "Collection:         {}", self.collection)?;
        writeln!(f, "Scrolls:            {}", self.scrolls)?;
        writeln!(f, "Elapsed:            {:.1}s", self.elapsed_ms as f64 / 1000.0)?;
        writeln!(f, "Candidates seen:    {}", self.candidates_seen)?;
        writeln!(f, "Duplicate cards:    {}", self.duplicates_skipped)?;
        writeln!(f, "In window:          {}", self.in_window)?;
        writeln!(f, "Out of window:      {}", self.out_of_window)?;
        writeln!(f, "Unresolved:         {}", self.unresolved)?;
        writeln!(f, "Detail lookups:     {}", self.detail_lookups)?;
        writeln!(f, "Unconfirmed views:  {}", self.unconfirmed)?;
        if self.historical_excluded > 0 {
            writeln!(f, "Already published:  {}", self.historical_excluded)?;
        }
        if self.topic_filtered > 0 {
            writeln!(f, "Off-topic:          {}", self.topic_filtered)?;
        }
        if self.nested_quotes > 0 {
            writeln!(f, "Nested quotes:      {}", self.nested_quotes)?;
        }
        writeln!(f, "Distinct originals: {}", self.distinct_originals)?;
        writeln!(f, "Final:              {}", self.final_count)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One ranked original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedOriginal {
    pub url: String,
    pub views: u64,
    pub first_seen: DateTime<Utc>,
}

/// The pipeline's only externally visible output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub generated_at: DateTime<Utc>,
    pub window_hours: u32,
    /// Views descending; ties by earliest event, then URL.
    pub originals: Vec<RankedOriginal>,
    pub quotes: QuoteMapping,
    pub stats: RunStats,
}

impl ResultSet {
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.originals.iter().map(|o| o.url.as_str())
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        writeln!(
            f,
            "\nQuotes:             {} across {} originals",
            self.quotes.total_quotes(),
            self.quotes.iter().filter(|(_, q)| !q.is_empty()).count()
        )?;
        writeln!(f, "\nTop {} by views (last {}h):", self.originals.len(), self.window_hours)?;
        for (rank, original) in self.originals.iter().enumerate() {
            writeln!(
                f,
                "{:>3}. [{:>7}] {}",
                rank + 1,
                format_views(original.views),
                original.url
            )?;
        }
        Ok(())
    }
}
