use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Apify wraps single-object responses in `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Lifecycle of an actor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum RunStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    TimingOut,
    TimedOut,
    Aborting,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::TimedOut | RunStatus::Aborted
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The parts of an actor run the client needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRun {
    pub id: String,
    pub status: RunStatus,
    pub default_dataset_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Input for the apidojo/tweet-scraper actor, timeline mode.
#[derive(Debug, Clone, Serialize)]
pub struct TweetScraperInput {
    #[serde(rename = "twitterHandles")]
    pub twitter_handles: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    /// "Latest" keeps the timeline in reverse-chronological order.
    pub sort: String,
}

/// Input for apidojo/tweet-scraper, single-post mode.
#[derive(Debug, Clone, Serialize)]
pub struct TweetUrlInput {
    #[serde(rename = "startUrls")]
    pub start_urls: Vec<String>,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
}

/// Author info nested inside a Tweet.
#[derive(Debug, Clone, Deserialize)]
pub struct TweetAuthor {
    #[serde(rename = "userName")]
    pub user_name: Option<String>,
    pub name: Option<String>,
}

/// A single tweet from the Apify dataset.
///
/// Retweets carry the retweeted post in `retweet`; quotes carry the quoted
/// post in `quote`. Both nest the same shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "fullText")]
    pub full_text: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "twitterUrl")]
    pub twitter_url: Option<String>,
    /// Twitter's legacy format: "Wed Oct 10 20:19:24 +0000 2018".
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub author: Option<TweetAuthor>,
    #[serde(rename = "viewCount")]
    pub view_count: Option<u64>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<i64>,
    #[serde(rename = "retweetCount")]
    pub retweet_count: Option<i64>,
    #[serde(rename = "isRetweet", default)]
    pub is_retweet: bool,
    #[serde(rename = "isQuote", default)]
    pub is_quote: bool,
    pub retweet: Option<Box<Tweet>>,
    pub quote: Option<Box<Tweet>>,
}

impl Tweet {
    /// Returns whichever text field is populated, preferring `full_text`.
    pub fn content(&self) -> Option<&str> {
        self.full_text.as_deref().or(self.text.as_deref())
    }

    /// Public URL, whichever field carries it.
    pub fn permalink(&self) -> Option<&str> {
        self.url.as_deref().or(self.twitter_url.as_deref())
    }

    pub fn author_handle(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.user_name.as_deref())
    }

    /// Parsed `created_at`, if present and well-formed.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_retweet_with_nested_original() {
        let json = r#"{
            "id": "2",
            "url": "https://x.com/bob/status/2",
            "createdAt": "Wed Oct 10 20:19:24 +0000 2018",
            "isRetweet": true,
            "retweet": {
                "id": "1",
                "url": "https://x.com/alice/status/1",
                "viewCount": 1200,
                "author": {"userName": "alice"}
            }
        }"#;
        let tweet: Tweet = serde_json::from_str(json).unwrap();
        assert!(tweet.is_retweet);
        assert!(!tweet.is_quote);
        let original = tweet.retweet.as_deref().unwrap();
        assert_eq!(original.view_count, Some(1200));
        assert_eq!(original.author_handle(), Some("alice"));
        assert_eq!(
            tweet.created_at_utc(),
            Some(Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap())
        );
    }

    #[test]
    fn run_status_parses_apify_spelling() {
        let run: Envelope<ActorRun> = serde_json::from_str(
            r#"{"data": {"id": "r1", "status": "TIMED-OUT", "defaultDatasetId": "d1"}}"#,
        )
        .unwrap();
        assert_eq!(run.data.status, RunStatus::TimedOut);
        assert!(run.data.status.is_terminal());
        assert!(!RunStatus::TimingOut.is_terminal());
    }

    #[test]
    fn permalink_falls_back_to_twitter_url() {
        let tweet: Tweet =
            serde_json::from_str(r#"{"twitterUrl": "https://twitter.com/a/status/3"}"#).unwrap();
        assert_eq!(tweet.permalink(), Some("https://twitter.com/a/status/3"));
        assert_eq!(tweet.created_at_utc(), None);
    }
}
