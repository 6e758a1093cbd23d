use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use digest_common::ViewCount;
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Aggregator;
use crate::traits::DetailViewFetcher;

/// Memoizes detail-page lookups so each original URL is fetched at most
/// once per run, even when concurrent callers ask for it together.
pub struct CachedDetailViews {
    inner: Arc<dyn DetailViewFetcher>,
    cells: Mutex<HashMap<String, Arc<OnceCell<ViewCount>>>>,
    lookups: AtomicU32,
}

impl CachedDetailViews {
    pub fn new(inner: Arc<dyn DetailViewFetcher>) -> Self {
        Self {
            inner,
            cells: Mutex::new(HashMap::new()),
            lookups: AtomicU32::new(0),
        }
    }

    /// View count from the detail page. Failures and unparsable text
    /// resolve to `Unconfirmed` and are cached like any other answer.
    pub async fn views(&self, url: &str) -> ViewCount {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells.entry(url.to_string()).or_default().clone()
        };

        *cell
            .get_or_init(|| async {
                self.lookups.fetch_add(1, Ordering::Relaxed);
                match self.inner.fetch_detail_views(url).await {
                    Ok(Some(text)) => {
                        let views = ViewCount::from_token(Some(&text));
                        if !views.is_confirmed() {
                            debug!(url, text = %text, "Detail page view count unparsable");
                        }
                        views
                    }
                    Ok(None) => ViewCount::Unconfirmed,
                    Err(e) => {
                        warn!(url, error = %e, "Detail page lookup failed");
                        ViewCount::Unconfirmed
                    }
                }
            })
            .await
    }

    /// Underlying fetches issued so far.
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::Relaxed)
    }
}

/// Confirm views for originals that only reached the aggregator unconfirmed.
///
/// At most `max_lookups` originals are looked up, earliest seen first, with
/// up to `concurrency` lookups in flight. A lookup still running at
/// `deadline` is abandoned and leaves its original unconfirmed. Results are
/// applied by the caller's task once all lookups finish. Returns the number
/// of originals attempted.
pub async fn confirm_views(
    aggregator: &mut Aggregator,
    detail: &CachedDetailViews,
    concurrency: usize,
    max_lookups: usize,
    deadline: Instant,
) -> u32 {
    let pending: Vec<String> = aggregator.unconfirmed().into_iter().take(max_lookups).collect();
    if pending.is_empty() {
        return 0;
    }

    let attempted = pending.len() as u32;
    info!(count = attempted, concurrency, "Confirming views from detail pages");

    let results: Vec<(String, ViewCount)> = stream::iter(pending)
        .map(|url| async move {
            match tokio::time::timeout_at(deadline, detail.views(&url)).await {
                Ok(views) => (url, views),
                Err(_) => {
                    debug!(url = %url, "Detail page lookup outlived run budget");
                    (url, ViewCount::Unconfirmed)
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut confirmed = 0;
    for (url, views) in results {
        if views.is_confirmed() {
            confirmed += 1;
        }
        aggregator.confirm(&url, views);
    }
    info!(attempted, confirmed, "Detail page confirmation complete");

    attempted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Classifier;
    use crate::testing::{post, quote, status_url, MockDetailViews, MockResolver};
    use std::time::Duration;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    async fn aggregator_with(raws: Vec<digest_common::RawCandidate>) -> Aggregator {
        let resolver = MockResolver::new();
        let classifier = Classifier::new(&resolver);
        let mut agg = Aggregator::default();
        for raw in raws {
            agg.fold(classifier.classify(raw, true).await.unwrap());
        }
        agg
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_lookup() {
        let url = status_url("alice", 1);
        let fetcher = Arc::new(
            MockDetailViews::new()
                .on_url(&url, "2.5K")
                .with_delay(Duration::from_millis(20)),
        );
        let cache = CachedDetailViews::new(fetcher.clone());

        let (a, b, c) = tokio::join!(cache.views(&url), cache.views(&url), cache.views(&url));

        assert_eq!(a, ViewCount::Confirmed(2_500));
        assert_eq!(b, a);
        assert_eq!(c, a);
        assert_eq!(fetcher.calls_for(&url), 1);
        assert_eq!(cache.lookups(), 1);
    }

    #[tokio::test]
    async fn failures_are_cached_as_unconfirmed() {
        let url = status_url("alice", 1);
        let fetcher = Arc::new(MockDetailViews::new().failing_url(&url));
        let cache = CachedDetailViews::new(fetcher.clone());

        assert_eq!(cache.views(&url).await, ViewCount::Unconfirmed);
        assert_eq!(cache.views(&url).await, ViewCount::Unconfirmed);
        assert_eq!(fetcher.calls_for(&url), 1);
    }

    #[tokio::test]
    async fn confirms_only_unconfirmed_originals() {
        let quoted = status_url("alice", 1);
        let known = status_url("bob", 2);
        let mut agg = aggregator_with(vec![
            quote(&status_url("q", 3), Some(&quoted), 10, Some("50")),
            post(&known, 20, Some("900")),
        ])
        .await;
        let fetcher = Arc::new(
            MockDetailViews::new()
                .on_url(&quoted, "1,234")
                .on_url(&known, "1M"),
        );
        let cache = CachedDetailViews::new(fetcher.clone());

        let attempted = confirm_views(&mut agg, &cache, 4, 10, far_deadline()).await;

        assert_eq!(attempted, 1);
        assert_eq!(agg.get(&quoted).unwrap().views, ViewCount::Confirmed(1_234));
        assert_eq!(agg.get(&known).unwrap().views, ViewCount::Confirmed(900));
        assert_eq!(fetcher.calls_for(&known), 0);
    }

    #[tokio::test]
    async fn lookup_budget_prefers_earliest_seen() {
        let early = status_url("alice", 1);
        let late = status_url("bob", 2);
        let mut agg = aggregator_with(vec![post(&late, 10, None), post(&early, 300, None)]).await;
        let fetcher = Arc::new(MockDetailViews::new().on_url(&early, "7").on_url(&late, "8"));
        let cache = CachedDetailViews::new(fetcher.clone());

        confirm_views(&mut agg, &cache, 2, 1, far_deadline()).await;

        assert_eq!(agg.get(&early).unwrap().views, ViewCount::Confirmed(7));
        assert_eq!(agg.get(&late).unwrap().views, ViewCount::Unconfirmed);
        assert_eq!(fetcher.total_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_lookups_stop_at_the_deadline() {
        let a = status_url("alice", 1);
        let b = status_url("bob", 2);
        let mut agg = aggregator_with(vec![post(&a, 20, None), post(&b, 10, None)]).await;
        let fetcher = Arc::new(
            MockDetailViews::new()
                .on_url(&a, "7")
                .on_url(&b, "8")
                .with_delay(Duration::from_secs(3600)),
        );
        let cache = CachedDetailViews::new(fetcher.clone());
        let started = Instant::now();

        let attempted =
            confirm_views(&mut agg, &cache, 1, 10, started + Duration::from_secs(30)).await;

        assert_eq!(attempted, 2);
        assert!(started.elapsed() <= Duration::from_secs(30));
        assert_eq!(agg.get(&a).unwrap().views, ViewCount::Unconfirmed);
        assert_eq!(agg.get(&b).unwrap().views, ViewCount::Unconfirmed);
        assert_eq!(agg.unconfirmed().len(), 2);
    }
}
