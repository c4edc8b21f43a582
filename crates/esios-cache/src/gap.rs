//! Decides which sub-ranges of a request must be fetched from the network
//! rather than served from the cache.
//!
//! Three kinds of gap are distinguished, mirroring the original Python
//! implementation this crate's cache semantics are ported from:
//!
//! - a **pre-gap**, when the request starts before anything cached,
//! - a **post-gap**, when it ends after anything cached (or in any hole
//!   between two cached sub-ranges),
//! - a **recent-refresh** sub-range: ESIOS indicator values published in the
//!   last `recent_refresh_window` are allowed to change (revisions,
//!   late settlement data), so the tail of the cache inside that window is
//!   always re-fetched even though it isn't, strictly, a hole.

use chrono::{DateTime, Duration, Utc};
use esios_types::{merge_ranges, DateRange};

/// Tunables for one planning call. `recent_refresh_window` is the spec's
/// "data may still be revised" horizon (48h for ESIOS indicators).
#[derive(Debug, Clone, Copy)]
pub struct GapPlannerConfig {
    pub recent_refresh_window: Duration,
}

impl Default for GapPlannerConfig {
    fn default() -> Self {
        Self {
            recent_refresh_window: Duration::hours(48),
        }
    }
}

/// Compute the sub-ranges of `requested` that must be fetched, given what's
/// already cached (`cached`, which need not be sorted or merged) and the
/// current instant `now`.
///
/// Returns ranges sorted by `start`, already merged where adjacent or
/// overlapping. An empty result means the cache fully satisfies the
/// request and nothing needs fetching.
pub fn plan(
    requested: DateRange,
    cached: &[DateRange],
    now: DateTime<Utc>,
    config: GapPlannerConfig,
) -> Vec<DateRange> {
    let merged_cached = merge_ranges(cached.to_vec(), Duration::zero());

    let overlapping: Vec<DateRange> = merged_cached
        .iter()
        .filter(|r| r.overlaps(&requested))
        .copied()
        .collect();

    let mut gaps = Vec::new();

    // Triggers compare calendar dates, not raw instants: cached coverage
    // tops out at the last *observation* (e.g. 23:00 for hourly data), while
    // a calendar-date request is expanded to the literal end of day
    // (23:59:59.999999999). Comparing instants directly would treat every
    // warm repeat of a sub-day-granularity request as a one-hour gap.
    if overlapping.is_empty() {
        gaps.push(requested);
    } else {
        let first = overlapping.first().unwrap();
        if requested.start.date_naive() < first.start.date_naive() {
            gaps.push(DateRange::new(requested.start, first.start - Duration::nanoseconds(1)));
        }

        for pair in overlapping.windows(2) {
            let [left, right] = pair else { unreachable!() };
            if right.start.date_naive() > left.end.date_naive() {
                gaps.push(DateRange::new(
                    left.end + Duration::nanoseconds(1),
                    right.start - Duration::nanoseconds(1),
                ));
            }
        }

        let last = overlapping.last().unwrap();
        if requested.end.date_naive() > last.end.date_naive() {
            gaps.push(DateRange::new(last.end + Duration::nanoseconds(1), requested.end));
        }
    }

    // Recent-refresh: the literal original comparison is `cached_end >
    // cutoff and end > cutoff`, evaluated against the cached coverage's
    // tail regardless of whether `requested.end` itself sits inside the
    // cutoff window. See DESIGN.md for why the alternative (only refresh
    // when the request's own end is within the window) was rejected.
    let cutoff = now - config.recent_refresh_window;
    if let Some(last) = overlapping.last() {
        let cached_end = last.end.min(requested.end);
        if last.end > cutoff && requested.end > cutoff {
            let refresh_start = cutoff.max(requested.start);
            if refresh_start <= cached_end {
                gaps.push(DateRange::new(refresh_start, cached_end));
            }
        }
    }

    merge_ranges(gaps, Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_cache_is_one_full_gap() {
        let requested = DateRange::new(ts(1), ts(10));
        let gaps = plan(requested, &[], ts(100), GapPlannerConfig::default());
        assert_eq!(gaps, vec![requested]);
    }

    #[test]
    fn pre_and_post_gaps_around_cached_middle() {
        let requested = DateRange::new(ts(1), ts(10));
        let cached = vec![DateRange::new(ts(4), ts(6))];
        let now = ts(100);
        let gaps = plan(requested, &cached, now, GapPlannerConfig::default());

        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].start, ts(1));
        assert_eq!(gaps[1].end, ts(10));
    }

    #[test]
    fn mid_gap_between_two_cached_ranges() {
        let requested = DateRange::new(ts(1), ts(10));
        let cached = vec![DateRange::new(ts(1), ts(3)), DateRange::new(ts(7), ts(10))];
        let now = ts(100);
        let gaps = plan(requested, &cached, now, GapPlannerConfig::default());

        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].start > ts(3));
        assert!(gaps[0].end < ts(7));
    }

    #[test]
    fn fully_covered_old_range_needs_no_fetch() {
        let requested = DateRange::new(ts(1), ts(10));
        let cached = vec![DateRange::new(ts(1), ts(10))];
        // `now` far beyond the refresh window, so the tail isn't "recent".
        let now = ts(1) + Duration::days(365);
        let gaps = plan(requested, &cached, now, GapPlannerConfig::default());
        assert!(gaps.is_empty());
    }

    #[test]
    fn recent_tail_is_refetched_even_when_fully_cached() {
        let now = Utc::now_dummy();
        let requested = DateRange::new(now - Duration::days(5), now);
        let cached = vec![requested];
        let gaps = plan(requested, &cached, now, GapPlannerConfig::default());

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].end, requested.end);
        assert!(gaps[0].start >= now - Duration::hours(48));
    }

    /// `Utc::now()` is a real clock call; tests here want a fixed "now" so
    /// assertions are deterministic, hence this tiny shim instead.
    trait DummyNow {
        fn now_dummy() -> DateTime<Utc>;
    }

    impl DummyNow for Utc {
        fn now_dummy() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
        }
    }

    #[test]
    fn warm_repeat_of_hourly_data_triggers_no_gap() {
        // Cached coverage tops out at 23:00 (last hourly observation), but
        // the calendar-date request expands its end to 23:59:59.999999999.
        // That gap is within the same day and must not count as a post-gap.
        let cached_end = Utc.with_ymd_and_hms(2025, 1, 3, 23, 0, 0).unwrap();
        let cached = vec![DateRange::new(ts(1), cached_end)];
        let requested = DateRange::new(
            ts(1),
            ts(3) + Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59) + Duration::nanoseconds(999_999_999),
        );
        let now = ts(10);
        let gaps = plan(requested, &cached, now, GapPlannerConfig::default());
        assert!(gaps.is_empty());
    }
}
