use std::collections::{HashMap, HashSet};

use digest_common::{OriginalRecord, TopicFilterConfig};
use tracing::debug;

use super::Aggregator;

/// Drop originals already published on an earlier day. Returns how many
/// were dropped.
pub fn exclude_published(aggregator: &mut Aggregator, published: &HashSet<String>) -> u32 {
    if published.is_empty() {
        return 0;
    }
    let excluded = aggregator.retain(|record| !published.contains(&record.url));
    if excluded > 0 {
        debug!(excluded, "Skipped originals from earlier digests");
    }
    excluded
}

/// Keeps originals whose text mentions a keyword or whose author is a
/// priority account. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    keywords: Vec<String>,
    priority: HashSet<String>,
}

impl TopicFilter {
    /// `None` when the configuration names neither keywords nor accounts.
    pub fn from_config(config: &TopicFilterConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        Some(Self {
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            priority: config
                .priority_accounts
                .iter()
                .map(|a| a.trim_start_matches('@').to_lowercase())
                .collect(),
        })
    }

    pub fn admits(&self, record: &OriginalRecord) -> bool {
        let author = record
            .author
            .as_deref()
            .map(|a| a.trim_start_matches('@').to_lowercase())
            .or_else(|| handle_from_url(&record.url));
        if author.is_some_and(|a| self.priority.contains(&a)) {
            return true;
        }

        let Some(text) = record.text.as_deref() else {
            return false;
        };
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Apply to every record. Returns how many were dropped.
    pub fn retain(&self, aggregator: &mut Aggregator) -> u32 {
        let dropped = aggregator.retain(|record| self.admits(record));
        debug!(dropped, kept = aggregator.len(), "Topic filter applied");
        dropped
    }

    /// Keyword hit counts over the given records, for the run log.
    pub fn keyword_hits<'a>(
        &self,
        records: impl IntoIterator<Item = &'a OriginalRecord>,
    ) -> HashMap<String, u32> {
        let mut hits = HashMap::new();
        for record in records {
            let Some(text) = record.text.as_deref() else {
                continue;
            };
            let text = text.to_lowercase();
            for keyword in &self.keywords {
                if text.contains(keyword.as_str()) {
                    *hits.entry(keyword.clone()).or_insert(0) += 1;
                }
            }
        }
        hits
    }
}

fn handle_from_url(url: &str) -> Option<String> {
    let path = url.strip_prefix("https://x.com/")?;
    let (handle, _) = path.split_once('/')?;
    Some(handle.to_lowercase())
}
