use chrono::{DateTime, Duration, Utc};

/// The rolling window `[run_time - window, run_time]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn ending_at(run_time: DateTime<Utc>, window_hours: u32) -> Self {
        Self {
            start: run_time - Duration::hours(i64::from(window_hours)),
            end: run_time,
        }
    }

    pub fn contains(&self, event_time: DateTime<Utc>) -> bool {
        self.start <= event_time && event_time <= self.end
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Whether an event at `event_time` qualifies for a run at `run_time`.
/// Events after the run time never qualify.
pub fn in_window(event_time: DateTime<Utc>, run_time: DateTime<Utc>, window_hours: u32) -> bool {
    TimeWindow::ending_at(run_time, window_hours).contains(event_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 25, 1, 0, 0).unwrap()
    }

    #[test]
    fn both_boundaries_are_inclusive() {
        assert!(in_window(run_time(), run_time(), 24));
        assert!(in_window(run_time() - Duration::hours(24), run_time(), 24));
        assert!(!in_window(
            run_time() - Duration::hours(24) - Duration::seconds(1),
            run_time(),
            24
        ));
    }

    #[test]
    fn future_events_are_excluded() {
        assert!(!in_window(run_time() + Duration::seconds(1), run_time(), 24));
    }

    #[test]
    fn widening_the_window_never_drops_an_event() {
        let events: Vec<_> = (0..60).map(|h| run_time() - Duration::minutes(h * 47)).collect();
        for narrow in 1..30u32 {
            for event in &events {
                if in_window(*event, run_time(), narrow) {
                    assert!(in_window(*event, run_time(), narrow + 1), "{event} at {narrow}h");
                }
            }
        }
    }
}
