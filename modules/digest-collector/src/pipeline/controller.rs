use std::time::Duration;

use digest_common::{Cap, CollectionState, RawCandidate, RunConfig};
use tokio::time::Instant;
use tracing::debug;

use crate::traits::CandidateFeed;

/// Outcome of one pull from the feed.
#[derive(Debug)]
pub enum Pull {
    Candidate(RawCandidate),
    Stopped(CollectionState),
}

/// Decides, before every pull, whether collection continues.
///
/// Checks run in a fixed order: wall-clock budget, candidate cap, scroll
/// cap, then the out-of-window streak. The first that trips moves the
/// controller into the matching terminal state, which it never leaves.
#[derive(Debug)]
pub struct CollectionController {
    max_scrolls: u32,
    max_candidates: u32,
    early_exit_streak: u32,
    started: Instant,
    deadline: Instant,
    collected: u32,
    streak: u32,
    state: CollectionState,
}

impl CollectionController {
    pub fn new(config: &RunConfig) -> Self {
        let started = Instant::now();
        Self {
            max_scrolls: config.max_scrolls,
            max_candidates: config.max_candidates,
            early_exit_streak: config.early_exit_streak,
            started,
            // A budget too large to represent is treated as thirty years.
            deadline: started
                .checked_add(config.max_duration)
                .unwrap_or_else(|| started + Duration::from_secs(86_400 * 365 * 30)),
            collected: 0,
            streak: 0,
            state: CollectionState::Collecting,
        }
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Distinct candidates recorded so far.
    pub fn collected(&self) -> u32 {
        self.collected
    }

    /// Current run of consecutive out-of-window candidates.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Instant at which the run's wall-clock budget runs out. Every phase
    /// that waits on a collaborator is bounded by it.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Stop collection because work outside the pull outlived the budget.
    pub fn expire(&mut self) {
        if !self.state.is_terminal() {
            self.state = CollectionState::StoppedByTimeout;
        }
    }

    /// Evaluate the stop conditions against the feed's progress.
    pub fn check(&mut self, scrolls: u32, pending: usize) -> CollectionState {
        if self.state.is_terminal() {
            return self.state;
        }

        self.state = if self.remaining().is_zero() {
            CollectionState::StoppedByTimeout
        } else if self.collected >= self.max_candidates {
            CollectionState::StoppedByCap(Cap::Candidates)
        } else if scrolls >= self.max_scrolls && pending == 0 {
            CollectionState::StoppedByCap(Cap::Scrolls)
        } else if self.early_exit_streak > 0 && self.streak >= self.early_exit_streak {
            CollectionState::StoppedByEarlyExit
        } else {
            CollectionState::Collecting
        };
        self.state
    }

    /// Pull the next card unless a stop condition holds. A pull that
    /// outlives the remaining budget is abandoned as a timeout. Feed errors
    /// are returned as-is and leave the state `Collecting`.
    pub async fn pull(&mut self, feed: &mut dyn CandidateFeed) -> anyhow::Result<Pull> {
        let state = self.check(feed.scrolls(), feed.pending());
        if state.is_terminal() {
            return Ok(Pull::Stopped(state));
        }

        match tokio::time::timeout_at(self.deadline, feed.next_candidate()).await {
            Ok(Ok(Some(candidate))) => Ok(Pull::Candidate(candidate)),
            Ok(Ok(None)) => {
                self.state = CollectionState::Done;
                Ok(Pull::Stopped(self.state))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(elapsed_ms = self.elapsed().as_millis() as u64, "Pull outlived run budget");
                self.state = CollectionState::StoppedByTimeout;
                Ok(Pull::Stopped(self.state))
            }
        }
    }

    /// Count a distinct candidate and update the out-of-window streak.
    pub fn record(&mut self, in_window: bool) {
        self.collected += 1;
        if in_window {
            self.streak = 0;
        } else {
            self.streak += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post, status_url, MockFeed};

    fn config() -> RunConfig {
        RunConfig {
            max_scrolls: 5,
            max_candidates: 10,
            max_duration: Duration::from_secs(60),
            early_exit_streak: 3,
            ..RunConfig::default()
        }
    }

    fn cards(n: u64) -> Vec<RawCandidate> {
        (1..=n).map(|i| post(&status_url("alice", i), 10, Some("1"))).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_feed_is_exhausted() {
        let mut controller = CollectionController::new(&config());
        let mut feed = MockFeed::from_cards(cards(2));

        assert!(matches!(controller.pull(&mut feed).await.unwrap(), Pull::Candidate(_)));
        controller.record(true);
        assert!(matches!(controller.pull(&mut feed).await.unwrap(), Pull::Candidate(_)));
        controller.record(true);
        assert!(matches!(
            controller.pull(&mut feed).await.unwrap(),
            Pull::Stopped(CollectionState::Done)
        ));
        assert_eq!(controller.state(), CollectionState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn candidate_cap_is_never_exceeded() {
        let mut controller = CollectionController::new(&RunConfig {
            max_candidates: 3,
            ..config()
        });
        let mut feed = MockFeed::from_cards(cards(8));

        let mut pulled = 0;
        while let Pull::Candidate(_) = controller.pull(&mut feed).await.unwrap() {
            controller.record(true);
            pulled += 1;
        }

        assert_eq!(pulled, 3);
        assert_eq!(controller.state(), CollectionState::StoppedByCap(Cap::Candidates));
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_cap_drains_loaded_cards_first() {
        let mut controller = CollectionController::new(&RunConfig {
            max_scrolls: 2,
            ..config()
        });
        let mut feed = MockFeed::new()
            .scroll()
            .card(post(&status_url("a", 1), 1, None))
            .scroll()
            .card(post(&status_url("a", 2), 1, None))
            .card(post(&status_url("a", 3), 1, None))
            .scroll()
            .card(post(&status_url("a", 4), 1, None));

        let mut pulled = 0;
        while let Pull::Candidate(_) = controller.pull(&mut feed).await.unwrap() {
            controller.record(true);
            pulled += 1;
        }

        assert_eq!(pulled, 3);
        assert_eq!(controller.state(), CollectionState::StoppedByCap(Cap::Scrolls));
        assert_eq!(feed.scrolls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn early_exit_after_streak_of_stale_candidates() {
        let mut controller = CollectionController::new(&config());
        let mut feed = MockFeed::from_cards(cards(8));

        let mut pulled = 0;
        while let Pull::Candidate(_) = controller.pull(&mut feed).await.unwrap() {
            controller.record(false);
            pulled += 1;
        }

        assert_eq!(pulled, 3);
        assert_eq!(controller.state(), CollectionState::StoppedByEarlyExit);
    }

    #[tokio::test(start_paused = true)]
    async fn in_window_candidate_resets_streak() {
        let mut controller = CollectionController::new(&config());
        controller.record(false);
        controller.record(false);
        controller.record(true);
        assert_eq!(controller.streak(), 0);
        controller.record(false);
        assert_eq!(controller.check(1, 0), CollectionState::Collecting);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_streak_disables_early_exit() {
        let mut controller = CollectionController::new(&RunConfig {
            early_exit_streak: 0,
            ..config()
        });
        for _ in 0..9 {
            controller.record(false);
        }
        assert_eq!(controller.check(1, 0), CollectionState::Collecting);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_feed_times_out() {
        let mut controller = CollectionController::new(&config());
        let mut feed = MockFeed::new()
            .scroll()
            .card(post(&status_url("a", 1), 1, None))
            .stall(Duration::from_secs(600))
            .card(post(&status_url("a", 2), 1, None));

        assert!(matches!(controller.pull(&mut feed).await.unwrap(), Pull::Candidate(_)));
        controller.record(true);
        assert!(matches!(
            controller.pull(&mut feed).await.unwrap(),
            Pull::Stopped(CollectionState::StoppedByTimeout)
        ));
        assert!(controller.elapsed() <= Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_checked_before_pulling() {
        let mut controller = CollectionController::new(&config());
        tokio::time::advance(Duration::from_secs(61)).await;
        let mut feed = MockFeed::from_cards(cards(1));

        assert!(matches!(
            controller.pull(&mut feed).await.unwrap(),
            Pull::Stopped(CollectionState::StoppedByTimeout)
        ));
        assert_eq!(feed.scrolls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_stops_collection_once() {
        let mut controller = CollectionController::new(&config());
        assert_eq!(controller.remaining(), Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(controller.remaining(), Duration::from_secs(40));

        controller.expire();
        assert_eq!(controller.state(), CollectionState::StoppedByTimeout);
        let mut feed = MockFeed::from_cards(cards(1));
        assert!(matches!(
            controller.pull(&mut feed).await.unwrap(),
            Pull::Stopped(CollectionState::StoppedByTimeout)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_keeps_earlier_stop_reason() {
        let mut controller = CollectionController::new(&RunConfig {
            max_candidates: 1,
            ..config()
        });
        controller.record(true);
        controller.check(0, 0);
        controller.expire();
        assert_eq!(controller.state(), CollectionState::StoppedByCap(Cap::Candidates));
    }

    #[tokio::test(start_paused = true)]
    async fn feed_error_leaves_state_collecting() {
        let mut controller = CollectionController::new(&config());
        let mut feed = MockFeed::new().scroll().fail("browser crashed");

        assert!(controller.pull(&mut feed).await.is_err());
        assert_eq!(controller.state(), CollectionState::Collecting);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_state_is_sticky() {
        let mut controller = CollectionController::new(&RunConfig {
            max_candidates: 1,
            ..config()
        });
        controller.record(true);
        assert!(controller.check(0, 1).is_terminal());
        assert_eq!(
            controller.check(0, 1),
            CollectionState::StoppedByCap(Cap::Candidates)
        );
    }
}
