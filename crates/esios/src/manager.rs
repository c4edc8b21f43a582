//! `Manager::list`/`search`/`get` (spec.md §4.5): catalogue caching plus
//! item handle construction, for a single endpoint.

use chrono::{DateTime, Utc};
use esios_cache::CacheStore;
use esios_client::Transport;
use esios_types::{Catalog, CatalogEntry, DateRange, Endpoint, EsiosError, GeoRegistry, ItemMetadata, WideFrame};

use crate::config::Config;
use crate::historical::{HistoryRequest, IndicatorHandle};

pub struct Manager<'a> {
    endpoint: Endpoint,
    transport: &'a dyn Transport,
    store: &'a CacheStore,
    config: &'a Config,
}

impl<'a> Manager<'a> {
    pub fn new(endpoint: Endpoint, transport: &'a dyn Transport, store: &'a CacheStore, config: &'a Config) -> Self {
        Self {
            endpoint,
            transport,
            store,
            config,
        }
    }

    /// Return the cached catalogue if fresh, else fetch, store, and return.
    pub async fn list(&self, now: DateTime<Utc>) -> Result<Vec<CatalogEntry>, EsiosError> {
        if let Some(catalog) = self.store.read_catalog(self.endpoint, now, self.config.catalog_ttl()) {
            return Ok(catalog.entries);
        }

        let body = self.transport.get_json(self.endpoint.path_segment(), &[]).await?;
        let entries = parse_catalog_entries(&body)?;
        let catalog = Catalog::new(self.endpoint, now, entries.clone());
        self.store.write_catalog(&catalog)?;
        Ok(entries)
    }

    pub async fn search(&self, query: &str, now: DateTime<Utc>) -> Result<Vec<CatalogEntry>, EsiosError> {
        let entries = self.list(now).await?;
        let needle = query.to_lowercase();
        Ok(entries
            .into_iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.short_name.as_deref().is_some_and(|s| s.to_lowercase().contains(&needle))
            })
            .collect())
    }

    /// Return a handle for `item_id`. If metadata is cached and fresh, no
    /// network call is made; otherwise fetch, store, and merge any
    /// declared geos into the global registry.
    pub async fn get(&self, item_id: u32, now: DateTime<Utc>) -> Result<IndicatorHandle<'a>, EsiosError> {
        if self.store.read_meta(self.endpoint, item_id, now, self.config.meta_ttl()).is_none() {
            let body = self
                .transport
                .get_json(&format!("{}/{}", self.endpoint.path_segment(), item_id), &[])
                .await?;
            let meta = parse_item_metadata(item_id, &body, now)?;

            if !meta.geos.is_empty() {
                let mut registry = GeoRegistry::new();
                for (id, name) in &meta.geos {
                    registry.insert(*id, name.clone());
                }
                self.store.merge_geos(&registry)?;
            }
            self.store.write_meta(self.endpoint, item_id, &meta)?;
        }

        Ok(IndicatorHandle::new(self.endpoint, item_id, self.transport, self.store, self.config))
    }

    /// Fetch several items over the same range and merge them into a
    /// single frame, one column per item named after its metadata name
    /// rather than its id. Grounded in
    /// `original_source/src/esios/managers/indicators.py::compare`.
    pub async fn compare(&self, item_ids: &[u32], range: DateRange, now: DateTime<Utc>) -> Result<WideFrame, EsiosError> {
        let mut combined = WideFrame::empty();
        for &item_id in item_ids {
            let handle = self.get(item_id, now).await?;
            let mut frame = handle.historical(range, HistoryRequest::new(), now).await?;
            if let Some(meta) = self.store.read_meta(self.endpoint, item_id, now, self.config.meta_ttl()) {
                frame.rename_single_column(&meta.name);
            }
            combined = combined.merge(&frame);
        }
        Ok(combined)
    }
}

fn parse_catalog_entries(body: &serde_json::Value) -> Result<Vec<CatalogEntry>, EsiosError> {
    let items = body
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or_else(|| EsiosError::transport("response missing `items` array", false))?;

    items
        .iter()
        .map(|item| {
            let id = item
                .get("id")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| EsiosError::transport("catalog entry missing `id`", false))?;
            let name = item
                .get("name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| EsiosError::transport("catalog entry missing `name`", false))?
                .to_string();
            let short_name = item
                .get("short_name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            Ok(CatalogEntry {
                id: id as u32,
                name,
                short_name,
            })
        })
        .collect()
}

fn parse_item_metadata(item_id: u32, body: &serde_json::Value, now: DateTime<Utc>) -> Result<ItemMetadata, EsiosError> {
    let item = body
        .get("indicator")
        .or_else(|| body.get("item"))
        .ok_or_else(|| EsiosError::transport("response missing item description", false))?;

    let name = item
        .get("name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let short_name = item
        .get("short_name")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let geos = item
        .get("geos")
        .and_then(serde_json::Value::as_array)
        .map(|geos| {
            geos.iter()
                .filter_map(|g| {
                    let id = g.get("geo_id").and_then(serde_json::Value::as_u64)?;
                    let name = g.get("geo_name").and_then(serde_json::Value::as_str)?;
                    Some((esios_types::GeoId(id as u32), name.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ItemMetadata {
        id: item_id,
        name,
        short_name,
        geos,
        cached_at: now,
    })
}
