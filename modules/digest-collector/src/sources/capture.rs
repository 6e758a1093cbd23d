//! Replays a recorded timeline session.
//!
//! A capture is JSON lines: each line is one scroll snapshot, an array of the
//! cards visible after that scroll, with times and view counts as rendered.
//! Cards repeat across snapshots the way a real timeline repeats them.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

use digest_common::{canonical_post_url, parse_display_time, post_id, EventKind, OriginalRef, RawCandidate};

use crate::traits::CandidateFeed;

/// One card as recorded from the page.
#[derive(Debug, Clone, Deserialize)]
pub struct CapturedCard {
    pub url: String,
    #[serde(default = "default_kind")]
    pub kind: EventKind,
    /// Displayed time ("5h", "Jan 24") or an RFC 3339 timestamp.
    pub time: String,
    #[serde(default)]
    pub views: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

fn default_kind() -> EventKind {
    EventKind::Post
}

impl CapturedCard {
    /// `None` when the card has no usable link or time.
    pub fn into_candidate(self, reference: DateTime<FixedOffset>) -> Option<RawCandidate> {
        let url = canonical_post_url(&self.url)?;
        let id = post_id(&url)?.to_string();
        let event_time = parse_display_time(&self.time, reference).or_else(|| {
            DateTime::parse_from_rfc3339(self.time.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc))
        })?;
        let original = self
            .original_url
            .as_deref()
            .and_then(canonical_post_url)
            .and_then(|url| {
                let id = post_id(&url)?.to_string();
                Some(OriginalRef { url, id })
            });

        Some(RawCandidate {
            url,
            kind: self.kind,
            event_time,
            views_text: self.views.filter(|v| !v.trim().is_empty()),
            post_id: id,
            original,
            author: self.author,
            text: self.text,
        })
    }
}

/// [`CandidateFeed`] over a capture file. Each snapshot line counts as one
/// scroll.
pub struct CaptureFeed<R> {
    lines: Lines<R>,
    line_no: usize,
    reference: DateTime<FixedOffset>,
    buffer: VecDeque<RawCandidate>,
    scrolls: u32,
    skipped: u32,
}

impl CaptureFeed<BufReader<File>> {
    pub async fn open(path: &Path, reference: DateTime<FixedOffset>) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("opening capture {}", path.display()))?;
        info!(path = %path.display(), "Replaying timeline capture");
        Ok(Self::new(BufReader::new(file), reference))
    }
}

impl<R: AsyncBufRead + Unpin + Send> CaptureFeed<R> {
    /// `reference` is the run time in the viewer's offset, used to resolve
    /// relative and year-less card times.
    pub fn new(reader: R, reference: DateTime<FixedOffset>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            reference,
            buffer: VecDeque::new(),
            scrolls: 0,
            skipped: 0,
        }
    }

    /// Cards dropped for a missing link or unreadable time.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    async fn load_snapshot(&mut self) -> Result<bool> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(false);
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let cards: Vec<CapturedCard> = serde_json::from_str(&line)
                .with_context(|| format!("capture line {} is not a card snapshot", self.line_no))?;
            self.scrolls += 1;

            let total = cards.len();
            for card in cards {
                match card.into_candidate(self.reference) {
                    Some(candidate) => self.buffer.push_back(candidate),
                    None => self.skipped += 1,
                }
            }
            debug!(scroll = self.scrolls, cards = total, "Loaded snapshot");
            return Ok(true);
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> CandidateFeed for CaptureFeed<R> {
    async fn next_candidate(&mut self) -> Result<Option<RawCandidate>> {
        loop {
            if let Some(candidate) = self.buffer.pop_front() {
                return Ok(Some(candidate));
            }
            if !self.load_snapshot().await? {
                return Ok(None);
            }
        }
    }

    fn scrolls(&self) -> u32 {
        self.scrolls
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reference() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 25, 10, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn replays_snapshots_as_scrolls() {
        let capture = concat!(
            r#"[{"url": "/Alice/status/1", "time": "2h", "views": "500"}]"#,
            "\n\n",
            r#"[{"url": "https://x.com/bob/status/7", "kind": "repost", "time": "1h", "views": "1.2K", "original_url": "https://x.com/carol/status/2"},"#,
            r#" {"url": "https://x.com/dave/status/9", "kind": "quote", "time": "30m", "original_url": "/alice/status/1"}]"#,
            "\n"
        );
        let mut feed = CaptureFeed::new(capture.as_bytes(), reference());

        let first = feed.next_candidate().await.unwrap().unwrap();
        assert_eq!(first.url, "https://x.com/alice/status/1");
        assert_eq!(first.kind, EventKind::Post);
        assert_eq!(first.post_id, "1");
        assert_eq!(first.event_time, reference().with_timezone(&Utc) - Duration::hours(2));
        assert_eq!(feed.scrolls(), 1);
        assert_eq!(feed.pending(), 0);

        let second = feed.next_candidate().await.unwrap().unwrap();
        assert_eq!(second.kind, EventKind::Repost);
        assert_eq!(second.original.unwrap().url, "https://x.com/carol/status/2");
        assert_eq!(feed.scrolls(), 2);
        assert_eq!(feed.pending(), 1);

        let third = feed.next_candidate().await.unwrap().unwrap();
        assert_eq!(third.original.unwrap().id, "1");
        assert_eq!(third.views_text, None);

        assert!(feed.next_candidate().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skips_cards_without_link_or_time() {
        let capture = r#"[{"url": "https://x.com/alice", "time": "1h"}, {"url": "/a/status/1", "time": "soon"}, {"url": "/a/status/2", "time": "2026-01-24T12:00:00Z"}]"#;
        let mut feed = CaptureFeed::new(capture.as_bytes(), reference());

        let only = feed.next_candidate().await.unwrap().unwrap();
        assert_eq!(only.post_id, "2");
        assert!(feed.next_candidate().await.unwrap().is_none());
        assert_eq!(feed.skipped(), 2);
    }

    #[tokio::test]
    async fn corrupt_line_fails_the_feed() {
        let capture = "[{\"url\": \"/a/status/1\", \"time\": \"1h\"}]\nnot json\n";
        let mut feed = CaptureFeed::new(capture.as_bytes(), reference());

        assert!(feed.next_candidate().await.unwrap().is_some());
        let err = feed.next_candidate().await.unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
