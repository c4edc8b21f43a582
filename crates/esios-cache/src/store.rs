//! The on-disk cache: one directory tree under a configured root, holding
//! a wide-frame file and an item metadata record per `(endpoint, item id)`,
//! a catalogue snapshot per endpoint, a shared geo-name registry, and
//! downloaded archive bundles.
//!
//! Layout (mirrors the original cache's directory shape):
//!
//! ```text
//! <root>/
//!   indicators/
//!     <item-id>/
//!       data.arrow
//!       meta.json
//!     catalog.json
//!   offer-indicators/
//!     ...
//!   geos.json
//!   archives/
//!     <archive-id>/
//!       <YYYY-MM-DD>/
//!         ... extracted files ...
//! ```

use std::path::{Path, PathBuf};

use esios_types::{BundleKey, Catalog, Endpoint, EsiosError, GeoRegistry, ItemMetadata, WideFrame};
use tracing::{debug, warn};

use crate::codec;

const DATA_FILE: &str = "data.arrow";
const META_FILE: &str = "meta.json";
const CATALOG_FILE: &str = "catalog.json";
const GEOS_FILE: &str = "geos.json";
const ARCHIVES_DIR: &str = "archives";

/// Aggregate counters returned by [`CacheStore::status`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStatus {
    pub item_count: usize,
    pub archive_bundle_count: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_dir(&self, endpoint: Endpoint, item_id: u32) -> PathBuf {
        self.root.join(endpoint.path_segment()).join(item_id.to_string())
    }

    fn catalog_path(&self, endpoint: Endpoint) -> PathBuf {
        self.root.join(endpoint.path_segment()).join(CATALOG_FILE)
    }

    fn geos_path(&self) -> PathBuf {
        self.root.join(GEOS_FILE)
    }

    pub fn archive_dir(&self, archive_id: u32, bundle: BundleKey) -> PathBuf {
        self.root
            .join(ARCHIVES_DIR)
            .join(archive_id.to_string())
            .join(bundle.folder_name())
    }

    pub fn archive_exists(&self, archive_id: u32, bundle: BundleKey) -> bool {
        esios_fs::dir_is_non_empty(self.archive_dir(archive_id, bundle))
    }

    /// Read the cached frame for one item. Returns `Ok(None)` when nothing
    /// is cached yet, or when the file fails to decode: a corrupt file is
    /// removed so the next fetch starts clean, and the read comes back
    /// empty rather than as an error (spec.md §4.1, "corrupt reads delete
    /// the offending file and return empty"), matching `read_meta`/
    /// `read_catalog`.
    pub fn read_frame(&self, endpoint: Endpoint, item_id: u32) -> Result<Option<WideFrame>, EsiosError> {
        let data_path = self.item_dir(endpoint, item_id).join(DATA_FILE);
        if !data_path.exists() {
            return Ok(None);
        }

        let bytes = fs_err::read(&data_path).map_err(EsiosError::from)?;
        match codec::decode(&bytes) {
            Ok(frame) => Ok(Some(frame)),
            Err(err) => {
                warn!(path = %data_path.display(), error = %err, "cache frame failed to decode, removing and treating as empty");
                let _ = esios_fs::remove_file_if_exists(&data_path);
                Ok(None)
            }
        }
    }

    /// Merge `fresh` into whatever is cached for this item and persist the
    /// result. New values win on overlap (spec.md §4.1 merge semantics).
    /// An empty `fresh` frame is a no-op.
    pub fn write_frame(&self, endpoint: Endpoint, item_id: u32, fresh: &WideFrame) -> Result<(), EsiosError> {
        if fresh.is_empty() {
            return Ok(());
        }

        let existing = self.read_frame(endpoint, item_id)?;
        let merged = match existing {
            Some(old) => old.merge(fresh),
            None => fresh.clone(),
        };

        let dir = self.item_dir(endpoint, item_id);
        let bytes = codec::encode(&merged).map_err(EsiosError::from)?;
        esios_fs::write_atomic(dir.join(DATA_FILE), &bytes).map_err(EsiosError::from)?;

        debug!(endpoint = %endpoint, item_id, rows = merged.index().len(), "wrote cache frame");
        Ok(())
    }

    /// Read the item metadata record, or `None` if missing, corrupt, or
    /// stale (the caller supplies `now`/`ttl`; a stale record is treated
    /// exactly like a missing one per spec.md §4.1).
    pub fn read_meta(
        &self,
        endpoint: Endpoint,
        item_id: u32,
        now: chrono::DateTime<chrono::Utc>,
        ttl: chrono::Duration,
    ) -> Option<ItemMetadata> {
        let meta_path = self.item_dir(endpoint, item_id).join(META_FILE);
        let meta: ItemMetadata = esios_fs::read_json(&meta_path)?;
        if meta.is_stale(now, ttl) {
            return None;
        }
        Some(meta)
    }

    pub fn write_meta(&self, endpoint: Endpoint, item_id: u32, meta: &ItemMetadata) -> Result<(), EsiosError> {
        let dir = self.item_dir(endpoint, item_id);
        esios_fs::write_atomic_json(dir.join(META_FILE), meta).map_err(EsiosError::from)
    }

    /// Read the endpoint catalogue, or `None` if missing, corrupt, or
    /// stale.
    pub fn read_catalog(
        &self,
        endpoint: Endpoint,
        now: chrono::DateTime<chrono::Utc>,
        ttl: chrono::Duration,
    ) -> Option<Catalog> {
        let catalog: Catalog = esios_fs::read_json(self.catalog_path(endpoint))?;
        if now - catalog.updated_at > ttl {
            return None;
        }
        Some(catalog)
    }

    pub fn write_catalog(&self, catalog: &Catalog) -> Result<(), EsiosError> {
        esios_fs::write_atomic_json(self.catalog_path(catalog.endpoint), catalog).map_err(EsiosError::from)
    }

    pub fn read_geos(&self) -> GeoRegistry {
        esios_fs::read_json(self.geos_path()).unwrap_or_default()
    }

    /// Merge `fresh` geo names into the persisted registry, last-write-wins
    /// per entry. Best-effort: a corrupt existing file is treated as empty
    /// rather than propagated, since the registry is a pure cache.
    pub fn merge_geos(&self, fresh: &GeoRegistry) -> Result<(), EsiosError> {
        if fresh.is_empty() {
            return Ok(());
        }
        let mut registry = self.read_geos();
        registry.merge(fresh);
        esios_fs::write_atomic_json(self.geos_path(), &registry).map_err(EsiosError::from)
    }

    /// Remove everything under the cache root for one endpoint, or the
    /// whole cache when `endpoint` is `None`. Returns the number of files
    /// removed.
    pub fn clear(&self, endpoint: Option<Endpoint>) -> Result<usize, EsiosError> {
        let target = match endpoint {
            Some(e) => self.root.join(e.path_segment()),
            None => self.root.clone(),
        };
        esios_fs::remove_tree_pruning_empty_dirs(&target, &self.root).map_err(EsiosError::from)
    }

    /// Walk the cache root and summarize it. Used by `cache status`.
    pub fn status(&self) -> CacheStatus {
        let mut status = CacheStatus::default();
        if !self.root.exists() {
            return status;
        }

        for entry in walkdir::WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                status.total_bytes += meta.len();
            }
            if entry.file_name().to_str() == Some(DATA_FILE) {
                status.item_count += 1;
            }
        }

        let archives_root = self.root.join(ARCHIVES_DIR);
        if archives_root.exists() {
            status.archive_bundle_count = walkdir::WalkDir::new(&archives_root)
                .min_depth(2)
                .max_depth(2)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_dir())
                .count();
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn ts(h: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let frame = WideFrame::from_observations([(ts(0), "8".to_string(), 1.0)]);
        store.write_frame(Endpoint::Indicators, 600, &frame).unwrap();

        let read_frame = store.read_frame(Endpoint::Indicators, 600).unwrap().unwrap();
        assert_eq!(read_frame.get(0, "8"), Some(1.0));
    }

    #[test]
    fn second_write_merges_with_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let first = WideFrame::from_observations([(ts(0), "8".to_string(), 1.0)]);
        store.write_frame(Endpoint::Indicators, 600, &first).unwrap();

        let second = WideFrame::from_observations([(ts(1), "8".to_string(), 2.0)]);
        store.write_frame(Endpoint::Indicators, 600, &second).unwrap();

        let merged = store.read_frame(Endpoint::Indicators, 600).unwrap().unwrap();
        assert_eq!(merged.index().len(), 2);
    }

    #[test]
    fn missing_item_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.read_frame(Endpoint::Indicators, 1).unwrap().is_none());
    }

    #[test]
    fn stale_meta_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let meta = ItemMetadata {
            id: 600,
            name: "Demanda".to_string(),
            short_name: None,
            geos: Vec::new(),
            cached_at: ts(0),
        };
        store.write_meta(Endpoint::Indicators, 600, &meta).unwrap();

        assert!(store
            .read_meta(Endpoint::Indicators, 600, ts(0) + Duration::hours(1), Duration::days(7))
            .is_some());
        assert!(store
            .read_meta(Endpoint::Indicators, 600, ts(0) + Duration::days(8), Duration::days(7))
            .is_none());
    }

    #[test]
    fn clear_one_endpoint_leaves_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let frame = WideFrame::from_observations([(ts(0), "8".to_string(), 1.0)]);
        store.write_frame(Endpoint::Indicators, 600, &frame).unwrap();
        store.write_frame(Endpoint::OfferIndicators, 700, &frame).unwrap();

        store.clear(Some(Endpoint::Indicators)).unwrap();

        assert!(store.read_frame(Endpoint::Indicators, 600).unwrap().is_none());
        assert!(store.read_frame(Endpoint::OfferIndicators, 700).unwrap().is_some());
    }

    #[test]
    fn corrupt_data_file_reads_as_none_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let frame = WideFrame::from_observations([(ts(0), "8".to_string(), 1.0)]);
        store.write_frame(Endpoint::Indicators, 600, &frame).unwrap();

        let data_path = store.item_dir(Endpoint::Indicators, 600).join(DATA_FILE);
        fs_err::write(&data_path, b"not a valid arrow file").unwrap();

        assert!(store.read_frame(Endpoint::Indicators, 600).unwrap().is_none());
        assert!(!data_path.exists());
    }
}
