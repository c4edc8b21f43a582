use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A table with a strictly increasing, duplicate-free UTC timestamp index
/// and one `f64` column per geography (or the literal column `"value"` for
/// ungeo'd series). Absent observations are holes, represented as `None`,
/// never as `NaN` or `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideFrame {
    index: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

/// The literal column name used for a series that carries no geo dimension.
pub const VALUE_COLUMN: &str = "value";

impl WideFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn min_index(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    pub fn max_index(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// Build a frame from `(timestamp, column, value)` observations.
    ///
    /// Per spec.md §4.4 step 8: the index is the union of distinct
    /// timestamps, sorted; when multiple rows share a `(timestamp, column)`
    /// pair, the first one encountered wins.
    pub fn from_observations<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, String, f64)>,
    {
        let mut by_ts: BTreeMap<DateTime<Utc>, BTreeMap<String, f64>> = BTreeMap::new();
        for (ts, col, value) in rows {
            by_ts.entry(ts).or_default().entry(col).or_insert(value);
        }

        let index: Vec<DateTime<Utc>> = by_ts.keys().copied().collect();
        let mut column_names: Vec<String> = by_ts
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect();
        column_names.sort();
        column_names.dedup();

        let mut columns: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for name in column_names {
            let values = by_ts
                .values()
                .map(|row| row.get(&name).copied())
                .collect();
            columns.insert(name, values);
        }

        Self { index, columns }
    }

    /// Build a frame from a pre-sorted index and a set of equal-length
    /// column vectors. Used by the on-disk codec when reading back a frame.
    pub fn from_columns(
        index: Vec<DateTime<Utc>>,
        columns: BTreeMap<String, Vec<Option<f64>>>,
    ) -> Self {
        debug_assert!(columns.values().all(|c| c.len() == index.len()));
        Self { index, columns }
    }

    pub fn into_parts(self) -> (Vec<DateTime<Utc>>, BTreeMap<String, Vec<Option<f64>>>) {
        (self.index, self.columns)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        self.columns.get(column).and_then(|c| c[row])
    }

    /// Restrict to rows with `start <= t <= end`.
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let lo = self.index.partition_point(|t| *t < start);
        let hi = self.index.partition_point(|t| *t <= end);
        if lo >= hi {
            return Self::empty();
        }

        let index = self.index[lo..hi].to_vec();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), values[lo..hi].to_vec()))
            .collect();
        Self { index, columns }
    }

    /// Restrict to the given columns, dropping all others. Columns absent
    /// from `self` are silently skipped — callers check `has_column` first
    /// when "missing column" must be an error (see the gap planner).
    pub fn select_columns(&self, names: &[&str]) -> Self {
        let columns = names
            .iter()
            .filter_map(|name| self.columns.get(*name).map(|v| ((*name).to_string(), v.clone())))
            .collect();
        Self {
            index: self.index.clone(),
            columns,
        }
    }

    /// Merge `other` into `self`: union of indices and columns, with
    /// `other`'s non-hole cells taking precedence over `self`'s on overlap,
    /// sorted by index. This is the cache's write-merge semantics (spec.md
    /// §4.1 "Merge semantics").
    pub fn merge(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let mut index: Vec<DateTime<Utc>> = self
            .index
            .iter()
            .chain(other.index.iter())
            .copied()
            .collect();
        index.sort();
        index.dedup();

        let mut column_names: Vec<&String> =
            self.columns.keys().chain(other.columns.keys()).collect();
        column_names.sort();
        column_names.dedup();

        let self_pos = |t: &DateTime<Utc>| self.index.binary_search(t).ok();
        let other_pos = |t: &DateTime<Utc>| other.index.binary_search(t).ok();

        let mut columns = BTreeMap::new();
        for name in column_names {
            let values: Vec<Option<f64>> = index
                .iter()
                .map(|t| {
                    let from_other = other_pos(t).and_then(|i| other.columns.get(name).and_then(|c| c[i]));
                    from_other.or_else(|| self_pos(t).and_then(|i| self.columns.get(name).and_then(|c| c[i])))
                })
                .collect();
            columns.insert(name.clone(), values);
        }

        Self { index, columns }
    }

    /// Rename the sole column to `new_name`. Used by `ItemHandle::historical`
    /// when a request has no geo filter and a single result column — the
    /// column is then named after the item id.
    pub fn rename_single_column(&mut self, new_name: &str) {
        if self.columns.len() != 1 {
            return;
        }
        let old_name = self.columns.keys().next().cloned().unwrap();
        if old_name == new_name {
            return;
        }
        let values = self.columns.remove(&old_name).unwrap();
        self.columns.insert(new_name.to_string(), values);
    }

    /// True if every row in `[start, end]` has a non-hole value for `column`.
    /// A column that doesn't exist at all is never dense.
    pub fn column_is_dense_over(&self, column: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let Some(values) = self.columns.get(column) else {
            return false;
        };
        let lo = self.index.partition_point(|t| *t < start);
        let hi = self.index.partition_point(|t| *t <= end);
        if lo >= hi {
            return false;
        }
        values[lo..hi].iter().all(Option::is_some)
    }

    /// The range the gap planner treats as "already cached" for a given
    /// column set, per spec step 2-4: `None` if any requested column is
    /// entirely absent (the whole request is then a gap), or if no row has
    /// all requested columns present; otherwise the span between the first
    /// and last row where every requested column is non-hole. An empty
    /// `columns` means "the whole frame", not "no columns".
    pub fn dense_coverage(&self, columns: &[&str]) -> Option<crate::range::DateRange> {
        if self.index.is_empty() {
            return None;
        }
        if columns.is_empty() {
            return Some(crate::range::DateRange::new(
                *self.index.first()?,
                *self.index.last()?,
            ));
        }
        if columns.iter().any(|name| !self.columns.contains_key(*name)) {
            return None;
        }

        let mut lo = None;
        let mut hi = None;
        for (i, t) in self.index.iter().enumerate() {
            let all_present = columns
                .iter()
                .all(|name| self.columns[*name][i].is_some());
            if all_present {
                lo.get_or_insert(*t);
                hi = Some(*t);
            }
        }
        Some(crate::range::DateRange::new(lo?, hi?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn sparse_column_preserved_on_merge() {
        let a = WideFrame::from_observations([(ts(0), "A".to_string(), 1.0)]);
        let b = WideFrame::from_observations([(ts(0), "B".to_string(), 2.0)]);
        let merged = a.merge(&b);
        assert_eq!(merged.get(0, "A"), Some(1.0));
        assert_eq!(merged.get(0, "B"), Some(2.0));
    }

    #[test]
    fn new_values_win_on_overlap() {
        let old = WideFrame::from_observations([(ts(0), "A".to_string(), 1.0)]);
        let new = WideFrame::from_observations([(ts(0), "A".to_string(), 2.0)]);
        let merged = old.merge(&new);
        assert_eq!(merged.get(0, "A"), Some(2.0));
    }

    #[test]
    fn duplicate_timestamp_keeps_first() {
        let frame = WideFrame::from_observations([
            (ts(0), "A".to_string(), 1.0),
            (ts(0), "A".to_string(), 99.0),
        ]);
        assert_eq!(frame.get(0, "A"), Some(1.0));
    }

    #[test]
    fn dense_coverage_absent_column_is_none() {
        let frame = WideFrame::from_observations([(ts(0), "A".to_string(), 1.0)]);
        assert!(frame.dense_coverage(&["B"]).is_none());
    }

    #[test]
    fn dense_coverage_spans_rows_with_all_columns_present() {
        let frame = WideFrame::from_observations([
            (ts(0), "A".to_string(), 1.0),
            (ts(1), "A".to_string(), 2.0),
            (ts(1), "B".to_string(), 2.0),
            (ts(2), "A".to_string(), 3.0),
            (ts(2), "B".to_string(), 3.0),
        ]);
        let coverage = frame.dense_coverage(&["A", "B"]).unwrap();
        assert_eq!(coverage.start, ts(1));
        assert_eq!(coverage.end, ts(2));
    }

    #[test]
    fn slice_is_inclusive() {
        let frame = WideFrame::from_observations([
            (ts(0), "A".to_string(), 1.0),
            (ts(1), "A".to_string(), 2.0),
            (ts(2), "A".to_string(), 3.0),
        ]);
        let sliced = frame.slice(ts(1), ts(2));
        assert_eq!(sliced.index().len(), 2);
    }
}
