//! Splits a date range into sub-ranges no wider than a server-imposed cap,
//! so a multi-year backfill becomes a sequence of requests ESIOS will
//! actually answer instead of one that times out or gets truncated.

use chrono::{DateTime, Duration, Utc};
use esios_types::DateRange;

/// Indicator history requests are capped by calendar day; archive bundle
/// listings are capped by calendar month. Both ultimately produce
/// `DateRange`s, just measured in different units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkUnit {
    Days(u32),
    Months(u32),
}

/// Split `range` into consecutive, non-overlapping chunks of at most `unit`
/// each, covering `range` exactly with no remainder chunk longer than
/// `unit`. Always returns at least one chunk (the whole range, if it
/// already fits).
pub fn chunk(range: DateRange, unit: ChunkUnit) -> Vec<DateRange> {
    match unit {
        ChunkUnit::Days(n) => chunk_by_days(range, n),
        ChunkUnit::Months(n) => chunk_by_months(range, n),
    }
}

fn chunk_by_days(range: DateRange, days: u32) -> Vec<DateRange> {
    let step = Duration::days(i64::from(days));
    let mut chunks = Vec::new();
    let mut cursor = range.start;
    while cursor <= range.end {
        let chunk_end = (cursor + step - Duration::nanoseconds(1)).min(range.end);
        chunks.push(DateRange::new(cursor, chunk_end));
        cursor += step;
    }
    chunks
}

fn chunk_by_months(range: DateRange, months: u32) -> Vec<DateRange> {
    let mut chunks = Vec::new();
    let mut cursor = range.start;
    while cursor <= range.end {
        let chunk_end = add_months(cursor, months) - Duration::nanoseconds(1);
        let chunk_end = chunk_end.min(range.end);
        chunks.push(DateRange::new(cursor, chunk_end));
        cursor = add_months(cursor, months);
    }
    chunks
}

fn add_months(instant: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    use chrono::Datelike;
    let total_months = instant.month0() + months;
    let years_to_add = total_months / 12;
    let new_month0 = total_months % 12;
    instant
        .with_year(instant.year() + years_to_add as i32)
        .and_then(|d| d.with_month0(new_month0))
        .unwrap_or(instant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn day_chunks_cover_range_without_overlap() {
        let range = DateRange::new(ts(2025, 1, 1), ts(2025, 1, 10));
        let chunks = chunk(range, ChunkUnit::Days(3));

        assert_eq!(chunks.first().unwrap().start, range.start);
        assert_eq!(chunks.last().unwrap().end, range.end);
        for pair in chunks.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }

    #[test]
    fn range_smaller_than_unit_is_one_chunk() {
        let range = DateRange::new(ts(2025, 1, 1), ts(2025, 1, 2));
        let chunks = chunk(range, ChunkUnit::Days(30));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], range);
    }

    #[test]
    fn month_chunks_cross_year_boundary() {
        let range = DateRange::new(ts(2024, 11, 1), ts(2025, 2, 28));
        let chunks = chunk(range, ChunkUnit::Months(1));
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.last().unwrap().end, range.end);
    }
}
