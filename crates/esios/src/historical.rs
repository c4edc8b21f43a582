//! `IndicatorHandle::historical` — spec.md §4.4's 9-step algorithm: resolve
//! a column set, consult the cache, plan the remaining gaps, fetch only
//! those, enrich geo metadata, and merge the result back into the cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use esios_cache::{chunk, plan_gaps, CacheStore, ChunkUnit, GapPlannerConfig};
use esios_client::{ApiValues, GeoValue, PlainValue, Transport};
use esios_types::{DateRange, Endpoint, EsiosError, GeoId, GeoRegistry, ItemMetadata, WideFrame};
use tracing::info;

use crate::config::Config;

/// Options for one `historical` call. Built incrementally, in the style of
/// a request builder, rather than a single wide function signature.
#[derive(Debug, Clone, Default)]
pub struct HistoryRequest {
    geo_ids: Option<Vec<GeoId>>,
    time_agg: Option<String>,
    geo_agg: Option<String>,
}

impl HistoryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geo_ids(mut self, ids: Vec<GeoId>) -> Self {
        self.geo_ids = Some(ids);
        self
    }

    pub fn time_aggregation(mut self, agg: impl Into<String>) -> Self {
        self.time_agg = Some(agg.into());
        self
    }

    pub fn geo_aggregation(mut self, agg: impl Into<String>) -> Self {
        self.geo_agg = Some(agg.into());
        self
    }

    /// Server-side aggregation views are not stable across calls and are
    /// never cached (spec.md §4.4 step 1).
    fn bypasses_cache(&self) -> bool {
        self.time_agg.is_some() || self.geo_agg.is_some()
    }
}

pub struct IndicatorHandle<'a> {
    pub endpoint: Endpoint,
    pub item_id: u32,
    pub transport: &'a dyn Transport,
    pub store: &'a CacheStore,
    pub config: &'a Config,
}

impl<'a> IndicatorHandle<'a> {
    pub fn new(endpoint: Endpoint, item_id: u32, transport: &'a dyn Transport, store: &'a CacheStore, config: &'a Config) -> Self {
        Self {
            endpoint,
            item_id,
            transport,
            store,
            config,
        }
    }

    pub async fn historical(&self, range: DateRange, request: HistoryRequest, now: DateTime<Utc>) -> Result<WideFrame, EsiosError> {
        // `config set enabled false` turns the whole cache off, same as the
        // original's `use_cache = cache.config.enabled and not time_agg and
        // not geo_agg` — every fetch goes straight to the network uncached.
        if !self.config.enabled || request.bypasses_cache() {
            return self.fetch_uncached(range, &request).await;
        }

        let columns = self.resolve_columns(&request, now)?;
        let column_refs: Vec<&str> = columns.iter().map(String::as_str).collect();

        let cached_frame = self.store.read_frame(self.endpoint, self.item_id)?.unwrap_or_default();
        let coverage = cached_frame.dense_coverage(&column_refs);
        let cached_ranges: Vec<DateRange> = coverage.into_iter().collect();

        let gaps = plan_gaps(
            range,
            &cached_ranges,
            now,
            GapPlannerConfig {
                recent_refresh_window: self.config.recent_ttl(),
            },
        );

        if gaps.is_empty() {
            info!(endpoint = %self.endpoint, item_id = self.item_id, "historical served entirely from cache");
            return Ok(self.finalize(cached_frame.slice(range.start, range.end), &column_refs));
        }

        let mut metadata = self
            .store
            .read_meta(self.endpoint, self.item_id, now, self.config.meta_ttl())
            .unwrap_or_else(|| ItemMetadata {
                id: self.item_id,
                name: self.item_id.to_string(),
                short_name: None,
                geos: Vec::new(),
                cached_at: now,
            });

        let mut observations: Vec<(DateTime<Utc>, String, f64)> = Vec::new();
        let mut observed_geos: Vec<(GeoId, String)> = Vec::new();

        for gap in &gaps {
            for chunk_range in chunk(*gap, ChunkUnit::Days(self.config.chunk_max_days)) {
                match self.fetch_chunk(chunk_range, &request).await {
                    Ok(values) => {
                        let (rows, geos) = shape_to_rows(values);
                        observations.extend(rows);
                        observed_geos.extend(geos);
                    }
                    Err(err) => {
                        // An indicator fetch's sub-range failures must be
                        // surfaced, unlike archive chunk failures (spec.md §7).
                        return Err(err);
                    }
                }
            }
        }

        if observations.is_empty() && cached_frame.is_empty() {
            return Ok(WideFrame::empty());
        }

        let newly_added = metadata.enrich_geos(&observed_geos);
        if !newly_added.is_empty() {
            self.store.write_meta(self.endpoint, self.item_id, &metadata)?;
            let mut registry = GeoRegistry::new();
            for (id, name) in &newly_added {
                registry.insert(*id, name.clone());
            }
            self.store.merge_geos(&registry)?;
        }

        let fresh_frame = WideFrame::from_observations(observations);
        self.store.write_frame(self.endpoint, self.item_id, &fresh_frame)?;

        // Names resolved before the fetch may have fallen back to a
        // stringified geo id for geos not yet known; re-resolve now that
        // enrichment has (possibly) taught the store their real names.
        let final_columns = self.resolve_columns(&request, now)?;
        let final_column_refs: Vec<&str> = final_columns.iter().map(String::as_str).collect();

        let merged = self.store.read_frame(self.endpoint, self.item_id)?.unwrap_or_default();
        Ok(self.finalize(merged.slice(range.start, range.end), &final_column_refs))
    }

    fn finalize(&self, mut frame: WideFrame, columns: &[&str]) -> WideFrame {
        if !columns.is_empty() {
            frame = frame.select_columns(columns);
        }
        frame.rename_single_column(&self.item_id.to_string());
        frame
    }

    /// Resolve requested geo ids to column names: item metadata first, then
    /// the global registry, then the stringified id (spec.md §4.4 step 2).
    fn resolve_columns(&self, request: &HistoryRequest, now: DateTime<Utc>) -> Result<Vec<String>, EsiosError> {
        let Some(geo_ids) = &request.geo_ids else {
            return Ok(Vec::new());
        };

        let metadata = self.store.read_meta(self.endpoint, self.item_id, now, self.config.meta_ttl());
        let registry = self.store.read_geos();

        Ok(geo_ids
            .iter()
            .map(|id| {
                metadata
                    .as_ref()
                    .and_then(|m| m.geos.iter().find(|(gid, _)| gid == id).map(|(_, n)| n.clone()))
                    .or_else(|| registry.get(*id).map(str::to_string))
                    .unwrap_or_else(|| id.column_name())
            })
            .collect())
    }

    async fn fetch_chunk(&self, range: DateRange, request: &HistoryRequest) -> Result<ApiValues, EsiosError> {
        let values = self.fetch_raw(range, request).await?;
        esios_client::parse_values(&values)
    }

    async fn fetch_uncached(&self, range: DateRange, request: &HistoryRequest) -> Result<WideFrame, EsiosError> {
        let mut observations = Vec::new();
        for chunk_range in chunk(range, ChunkUnit::Days(self.config.chunk_max_days)) {
            let values = self.fetch_chunk(chunk_range, request).await?;
            let (rows, _) = shape_to_rows(values);
            observations.extend(rows);
        }
        Ok(WideFrame::from_observations(observations))
    }

    async fn fetch_raw(&self, range: DateRange, request: &HistoryRequest) -> Result<serde_json::Value, EsiosError> {
        let path = format!("{}/{}", self.endpoint.path_segment(), self.item_id);
        let mut query = vec![
            ("start_date", range.start.to_rfc3339()),
            ("end_date", range.end.to_rfc3339()),
        ];
        if let Some(ids) = &request.geo_ids {
            let joined = ids.iter().map(|id| id.0.to_string()).collect::<Vec<_>>().join(",");
            query.push(("geo_ids", joined));
        }
        if let Some(agg) = &request.time_agg {
            query.push(("time_agg", agg.clone()));
        }
        if let Some(agg) = &request.geo_agg {
            query.push(("geo_agg", agg.clone()));
        }

        let refs: Vec<(&str, String)> = query.into_iter().collect();
        self.transport.get_json(&path, &refs).await
    }
}

fn shape_to_rows(values: ApiValues) -> (Vec<(DateTime<Utc>, String, f64)>, Vec<(GeoId, String)>) {
    match values {
        ApiValues::WithoutGeo(rows) => (
            rows.into_iter()
                .map(|PlainValue { datetime, value }| (datetime, esios_types::VALUE_COLUMN.to_string(), value))
                .collect(),
            Vec::new(),
        ),
        ApiValues::WithGeo(rows) => geo_rows(rows),
        ApiValues::Aggregated { national, by_geo } => {
            let mut out: Vec<(DateTime<Utc>, String, f64)> = national
                .into_iter()
                .map(|PlainValue { datetime, value }| (datetime, esios_types::VALUE_COLUMN.to_string(), value))
                .collect();
            let (geo_out, geos) = geo_rows(by_geo);
            out.extend(geo_out);
            (out, geos)
        }
    }
}

fn geo_rows(rows: Vec<GeoValue>) -> (Vec<(DateTime<Utc>, String, f64)>, Vec<(GeoId, String)>) {
    let mut geos = BTreeMap::new();
    let mut out = Vec::with_capacity(rows.len());
    for GeoValue {
        datetime,
        geo_id,
        geo_name,
        value,
    } in rows
    {
        if let Some(name) = &geo_name {
            geos.insert(geo_id, name.clone());
        }
        let column = geo_name.unwrap_or_else(|| geo_id.column_name());
        out.push((datetime, column, value));
    }
    (out, geos.into_iter().collect())
}
