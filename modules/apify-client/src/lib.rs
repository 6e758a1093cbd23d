//! Minimal client for the apidojo tweet-scraper actor: start a run, wait for
//! it to finish, read its dataset.

pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{ActorRun, RunStatus, Tweet, TweetAuthor, TweetScraperInput, TweetUrlInput};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use types::Envelope;

const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Seconds the server holds each status request open while a run is busy.
const WAIT_FOR_FINISH_SECS: u32 = 60;

pub struct ApifyClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different API root, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ApifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Start the scraper and block until it reaches a terminal status. The
    /// server long-polls, so each iteration waits up to a minute.
    async fn run_scraper<I: Serialize>(&self, input: &I) -> Result<Vec<Tweet>> {
        let resp = self
            .http
            .post(format!("{}/acts/{TWEET_SCRAPER}/runs", self.base_url))
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;
        let mut run = Self::decode::<Envelope<ActorRun>>(resp).await?.data;
        info!(run_id = %run.id, "Scraper run started");

        while !run.status.is_terminal() {
            debug!(run_id = %run.id, status = %run.status, "Waiting for scraper run");
            run = self
                .get::<Envelope<ActorRun>>(&format!(
                    "/actor-runs/{}?waitForFinish={WAIT_FOR_FINISH_SECS}",
                    run.id
                ))
                .await?
                .data;
        }

        if run.status != RunStatus::Succeeded {
            return Err(ApifyError::RunEnded {
                run_id: run.id,
                status: run.status,
            });
        }

        let tweets: Vec<Tweet> = self
            .get(&format!(
                "/datasets/{}/items?format=json&clean=true",
                run.default_dataset_id
            ))
            .await?;
        info!(run_id = %run.id, items = tweets.len(), "Scraper run finished");
        Ok(tweets)
    }

    /// Latest posts, reposts and quotes on one account's timeline, newest first.
    pub async fn scrape_x_timeline(&self, handle: &str, limit: u32) -> Result<Vec<Tweet>> {
        info!(handle, limit, "Scraping X timeline");
        self.run_scraper(&TweetScraperInput {
            twitter_handles: vec![handle.to_string()],
            max_items: limit,
            sort: "Latest".to_string(),
        })
        .await
    }

    /// Look up a single post by URL. `None` when the scraper returned nothing.
    pub async fn fetch_x_post(&self, post_url: &str) -> Result<Option<Tweet>> {
        debug!(post_url, "Fetching single X post");
        let tweets = self
            .run_scraper(&TweetUrlInput {
                start_urls: vec![post_url.to_string()],
                max_items: 1,
            })
            .await?;
        Ok(tweets.into_iter().next())
    }
}
