use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoId;

/// The server's description of an item, minus its time-series values, plus
/// the instant it was fetched. One of these lives alongside an item's
/// cached frame; `meta_ttl_days` governs when it's treated as stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub id: u32,
    pub name: String,
    pub short_name: Option<String>,
    /// Every `(geo_id, geo_name)` pair this item's responses have ever
    /// reported, used by geo enrichment (spec.md §4.8) to detect novel
    /// pairs worth appending.
    pub geos: Vec<(GeoId, String)>,
    pub cached_at: DateTime<Utc>,
}

impl ItemMetadata {
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.cached_at > ttl
    }

    pub fn has_geo(&self, geo_id: GeoId) -> bool {
        self.geos.iter().any(|(id, _)| *id == geo_id)
    }

    /// Append any `(id, name)` pairs not already known. Returns the newly
    /// added pairs, for the caller to also merge into the global registry.
    pub fn enrich_geos(&mut self, observed: &[(GeoId, String)]) -> Vec<(GeoId, String)> {
        let mut added = Vec::new();
        for (id, name) in observed {
            if !self.has_geo(*id) {
                self.geos.push((*id, name.clone()));
                added.push((*id, name.clone()));
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stale_after_ttl() {
        let written = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let meta = ItemMetadata {
            id: 600,
            name: "Demanda".to_string(),
            short_name: None,
            geos: Vec::new(),
            cached_at: written,
        };
        let now = written + Duration::days(8);
        assert!(meta.is_stale(now, Duration::days(7)));
        assert!(!meta.is_stale(now, Duration::days(30)));
    }

    #[test]
    fn enrich_geos_only_adds_novel_pairs() {
        let mut meta = ItemMetadata {
            id: 600,
            name: "Demanda".to_string(),
            short_name: None,
            geos: vec![(GeoId(8), "Madrid".to_string())],
            cached_at: Utc::now_dummy(),
        };
        let added = meta.enrich_geos(&[
            (GeoId(8), "Madrid".to_string()),
            (GeoId(9), "Ceuta".to_string()),
        ]);
        assert_eq!(added, vec![(GeoId(9), "Ceuta".to_string())]);
        assert_eq!(meta.geos.len(), 2);
    }

    trait DummyNow {
        fn now_dummy() -> DateTime<Utc>;
    }
    impl DummyNow for Utc {
        fn now_dummy() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        }
    }
}
