use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use digest_common::{DigestError, ResultSet, RunConfig, RunStats, TopicFilterConfig};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::pipeline::{
    assemble, confirm_views, exclude_published, select_top, Aggregator, CachedDetailViews,
    Classifier, CollectionController, Pull, TimeWindow, TopicFilter,
};
use crate::traits::{CandidateFeed, DetailViewFetcher, OriginalResolver};

/// Collaborators and settings for a run.
#[derive(Clone, TypedBuilder)]
pub struct DigestDeps {
    pub resolver: Arc<dyn OriginalResolver>,
    pub detail_views: Arc<dyn DetailViewFetcher>,
    #[builder(default)]
    pub config: RunConfig,
    #[builder(default)]
    pub topics: TopicFilterConfig,
    /// Originals already published on earlier days.
    #[builder(default)]
    pub published: HashSet<String>,
}

/// The feed became unavailable mid-run. `partial` holds the ranking of
/// everything aggregated before the failure.
#[derive(Debug, thiserror::Error)]
#[error("collection interrupted: {error}")]
pub struct RunFailure {
    #[source]
    pub error: DigestError,
    pub partial: Box<ResultSet>,
}

/// One pass from feed to ranked result.
pub struct DigestRun {
    deps: DigestDeps,
}

impl DigestRun {
    pub fn new(deps: DigestDeps) -> Self {
        Self { deps }
    }

    pub async fn execute(
        &self,
        feed: &mut dyn CandidateFeed,
        run_time: DateTime<Utc>,
    ) -> Result<ResultSet, RunFailure> {
        let config = &self.deps.config;
        let run_id = Uuid::new_v4();
        let window = TimeWindow::ending_at(run_time, config.window_hours);
        info!(
            %run_id,
            window_start = %window.start(),
            window_end = %window.end(),
            top_n = config.top_n,
            "Starting digest run"
        );

        let classifier = Classifier::new(self.deps.resolver.as_ref());
        let mut controller = CollectionController::new(config);
        let mut aggregator = Aggregator::default();
        let mut stats = RunStats::default();
        let mut seen = HashSet::new();

        // Collection
        let feed_error = loop {
            let raw = match controller.pull(feed).await {
                Ok(Pull::Candidate(raw)) => raw,
                Ok(Pull::Stopped(state)) => {
                    info!(%run_id, %state, collected = controller.collected(), "Collection stopped");
                    break None;
                }
                Err(e) => {
                    warn!(%run_id, error = %e, "Feed failed, ranking what was collected");
                    break Some(e);
                }
            };

            stats.candidates_seen += 1;
            if !seen.insert(raw.seen_key()) {
                stats.duplicates_skipped += 1;
                continue;
            }

            let in_window = window.contains(raw.event_time);
            controller.record(in_window);
            if !in_window {
                stats.out_of_window += 1;
                continue;
            }
            stats.in_window += 1;

            let card_url = raw.url.clone();
            let deadline = controller.deadline();
            let classified = tokio::time::timeout_at(deadline, classifier.classify(raw, in_window));
            let Ok(classified) = classified.await else {
                stats.unresolved += 1;
                controller.expire();
                info!(
                    %run_id,
                    url = %card_url,
                    collected = controller.collected(),
                    "Resolving an original outlived the run budget, collection stopped"
                );
                break None;
            };
            match classified {
                Ok(candidate) => {
                    if aggregator.fold(candidate) {
                        debug!(originals = aggregator.len(), "New original");
                    }
                }
                Err(rejection) => {
                    stats.unresolved += 1;
                    debug!(%rejection, "Dropping candidate");
                }
            }
        };
        stats.scrolls = feed.scrolls();
        stats.collection = controller.state();
        stats.nested_quotes = aggregator.drop_nested_quotes();
        stats.distinct_originals = aggregator.len() as u32;

        // Filtering happens before detail lookups so they are spent only on
        // originals that can still rank.
        stats.historical_excluded = exclude_published(&mut aggregator, &self.deps.published);
        if let Some(filter) = TopicFilter::from_config(&self.deps.topics) {
            stats.topic_filtered = filter.retain(&mut aggregator);
            for (keyword, hits) in filter.keyword_hits(aggregator.records()) {
                debug!(keyword = %keyword, hits, "Keyword matches");
            }
        }

        let detail = CachedDetailViews::new(self.deps.detail_views.clone());
        stats.detail_lookups = confirm_views(
            &mut aggregator,
            &detail,
            config.detail_concurrency,
            config.max_detail_lookups,
            controller.deadline(),
        )
        .await;
        stats.unconfirmed = aggregator.unconfirmed().len() as u32;

        let ranked = select_top(aggregator.records(), config.top_n);
        let quotes = aggregator.quote_mapping(ranked.iter().map(|r| r.url.as_str()));
        stats.elapsed_ms = controller.elapsed().as_millis() as u64;

        let result = assemble(ranked, quotes, stats, run_time, config.window_hours);
        info!(
            %run_id,
            final_count = result.stats.final_count,
            quotes = result.quotes.total_quotes(),
            "Digest run finished"
        );

        match feed_error {
            None => Ok(result),
            Some(e) => Err(RunFailure {
                error: DigestError::FeedUnavailable(format!("{e:#}")),
                partial: Box::new(result),
            }),
        }
    }
}
