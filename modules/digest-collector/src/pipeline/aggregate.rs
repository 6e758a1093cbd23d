use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use digest_common::{ClassifiedCandidate, EventKind, OriginalRecord, QuoteMapping, QuoteSet, ViewCount};

/// Folds classified candidates into one record per distinct original.
///
/// The merge is order-independent: the first confirmed view count sticks,
/// `first_seen` is a minimum and quotes are a set. Author and text come from
/// the highest-priority card: a Post over a Repost, then the earliest, then
/// the smallest card URL. Run it single-threaded; concurrent work (detail
/// lookups) feeds back through [`Aggregator::confirm`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregator {
    records: HashMap<String, OriginalRecord>,
    content_source: HashMap<String, ContentSource>,
}

/// Priority key of the card an original's author and text were taken from.
/// Smaller wins.
type ContentSource = (u8, DateTime<Utc>, String);

impl Aggregator {
    /// Merge one candidate. Out-of-window candidates are ignored.
    /// Returns true when the candidate introduced a new original.
    pub fn fold(&mut self, candidate: ClassifiedCandidate) -> bool {
        if !candidate.in_window {
            return false;
        }

        let kind = candidate.kind();
        let event_time = candidate.event_time();
        let mut created = false;
        let record = self
            .records
            .entry(candidate.original_url.clone())
            .or_insert_with(|| {
                created = true;
                OriginalRecord {
                    url: candidate.original_url.clone(),
                    id: candidate.original_id.clone(),
                    views: ViewCount::Unconfirmed,
                    first_seen: event_time,
                    quotes: QuoteSet::default(),
                    surfaced_by: Default::default(),
                    author: None,
                    text: None,
                }
            });

        merge_views(&mut record.views, candidate.views);
        record.first_seen = record.first_seen.min(event_time);
        record.surfaced_by.insert(kind);

        match kind {
            EventKind::Quote => {
                if candidate.raw.url != record.url {
                    record.quotes.insert(&candidate.raw.url);
                }
            }
            EventKind::Post | EventKind::Repost => {
                let rank = u8::from(kind == EventKind::Repost);
                let source = (rank, event_time, candidate.raw.url);
                let current = self.content_source.get(&record.url);
                if current.map_or(true, |current| source < *current) {
                    record.author = candidate.raw.author;
                    record.text = candidate.raw.text;
                    self.content_source.insert(record.url.clone(), source);
                }
            }
        }

        created
    }

    /// Apply a view count learned outside the feed. Only replaces an
    /// unconfirmed count.
    pub fn confirm(&mut self, url: &str, views: ViewCount) {
        if let Some(record) = self.records.get_mut(url) {
            merge_views(&mut record.views, views);
        }
    }

    /// URLs still lacking a confirmed count, earliest seen first.
    pub fn unconfirmed(&self) -> Vec<String> {
        let mut pending: Vec<&OriginalRecord> = self
            .records
            .values()
            .filter(|r| !r.views.is_confirmed())
            .collect();
        pending.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.url.cmp(&b.url)));
        pending.into_iter().map(|r| r.url.clone()).collect()
    }

    /// Drop records the predicate rejects. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&OriginalRecord) -> bool) -> u32 {
        let before = self.records.len();
        self.records.retain(|_, record| keep(record));
        self.content_source.retain(|url, _| self.records.contains_key(url));
        (before - self.records.len()) as u32
    }

    /// Drop quotes that surfaced only as the original of another quote.
    /// A record stays when a Post or Repost card also showed it, or when
    /// no kept record lists it as a quote. Returns how many were dropped.
    pub fn drop_nested_quotes(&mut self) -> u32 {
        let quoted: HashSet<String> = self
            .records
            .values()
            .flat_map(|r| r.quotes.iter().map(str::to_string))
            .collect();
        self.retain(|record| {
            record.surfaced_by.contains(&EventKind::Post)
                || record.surfaced_by.contains(&EventKind::Repost)
                || !quoted.contains(&record.url)
        })
    }

    /// Quote lists for the given originals, in the order given. Originals
    /// without quotes map to an empty list.
    pub fn quote_mapping<'a>(&self, originals: impl IntoIterator<Item = &'a str>) -> QuoteMapping {
        let mut mapping = QuoteMapping::default();
        for url in originals {
            let quotes = self
                .records
                .get(url)
                .map(|r| r.quotes.to_vec())
                .unwrap_or_default();
            mapping.insert(url.to_string(), quotes);
        }
        mapping
    }

    pub fn get(&self, url: &str) -> Option<&OriginalRecord> {
        self.records.get(url)
    }

    pub fn records(&self) -> impl Iterator<Item = &OriginalRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn merge_views(current: &mut ViewCount, incoming: ViewCount) {
    if !current.is_confirmed() && incoming.is_confirmed() {
        *current = incoming;
    }
}
