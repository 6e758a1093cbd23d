use chrono::{DateTime, Utc};
use digest_common::{QuoteMapping, RankedOriginal, ResultSet, RunStats};

/// Package the ranked originals, their quotes and run statistics.
pub fn assemble(
    originals: Vec<RankedOriginal>,
    quotes: QuoteMapping,
    mut stats: RunStats,
    generated_at: DateTime<Utc>,
    window_hours: u32,
) -> ResultSet {
    stats.final_count = originals.len() as u32;
    ResultSet {
        generated_at,
        window_hours,
        originals,
        quotes,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn final_count_tracks_originals() {
        let at = Utc.with_ymd_and_hms(2026, 1, 25, 1, 0, 0).unwrap();
        let original = RankedOriginal {
            url: "https://x.com/a/status/1".into(),
            views: 10,
            first_seen: at,
        };
        let mut quotes = QuoteMapping::default();
        quotes.insert(original.url.clone(), vec![]);

        let result = assemble(vec![original], quotes, RunStats::default(), at, 24);

        assert_eq!(result.stats.final_count, 1);
        assert_eq!(result.window_hours, 24);
        assert_eq!(result.urls().collect::<Vec<_>>(), vec!["https://x.com/a/status/1"]);
        assert_eq!(result.quotes.get("https://x.com/a/status/1"), Some(&[][..]));
    }
}
