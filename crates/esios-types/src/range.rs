use std::cmp::{max, min};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// An inclusive instant range `[start, end]`, always stored in UTC.
///
/// Every component that plans or detects gaps (`esios-cache`) works in
/// terms of this type. CLI- and API-facing code deals in calendar dates
/// and converts at the boundary via [`DateRange::from_dates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a range directly from UTC instants. `start` must be `<= end`;
    /// callers that can't guarantee this should use [`DateRange::from_dates`].
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "DateRange::new requires start <= end");
        Self { start, end }
    }

    /// Build a range from two naive calendar dates in `tz`. The upper bound
    /// is expanded to the end of that day (`23:59:59.999999999`), per the
    /// "date-only upper bound means the whole day" rule.
    pub fn from_dates<Tz: TimeZone>(start: NaiveDate, end: NaiveDate, tz: &Tz) -> Self {
        let start = start
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid");
        let end = end
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .expect("end of day is always valid");

        let start_utc = tz
            .from_local_datetime(&start)
            .single()
            .unwrap_or_else(|| tz.from_utc_datetime(&start))
            .with_timezone(&Utc);
        let end_utc = tz
            .from_local_datetime(&end)
            .single()
            .unwrap_or_else(|| tz.from_utc_datetime(&end))
            .with_timezone(&Utc);

        Self::new(start_utc, end_utc)
    }

    pub fn single_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Self {
        Self::from_dates(day, day, tz)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// True if the two ranges overlap or are separated by no more than `gap`.
    pub fn touches(&self, other: &Self, gap: Duration) -> bool {
        self.overlaps(other) || (other.start - self.end) <= gap || (self.start - other.end) <= gap
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(min(self.start, other.start), max(self.end, other.end))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Sort and merge overlapping or near-adjacent ranges (gap at most
/// `merge_within`) into a minimal covering set, ordered by `start`.
pub fn merge_ranges(mut ranges: Vec<DateRange>, merge_within: Duration) -> Vec<DateRange> {
    if ranges.is_empty() {
        return ranges;
    }
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<DateRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.touches(&range, merge_within) => *last = last.union(&range),
            _ => merged.push(range),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dates_expands_end_to_end_of_day() {
        let range = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            &Utc,
        );
        assert_eq!(range.start.format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!(range.end.format("%H:%M:%S").to_string(), "23:59:59");
    }

    #[test]
    fn merge_adjacent_within_one_day() {
        let tz = Utc;
        let a = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            &tz,
        );
        let b = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2025, 1, 4).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            &tz,
        );
        let merged = merge_ranges(vec![b, a], Duration::days(1));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].start, a.start);
        assert_eq!(merged[0].end, b.end);
    }

    #[test]
    fn no_merge_when_far_apart() {
        let tz = Utc;
        let a = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            &tz,
        );
        let b = DateRange::from_dates(
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            &tz,
        );
        let merged = merge_ranges(vec![a, b], Duration::days(1));
        assert_eq!(merged.len(), 2);
    }
}
