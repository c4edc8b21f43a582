use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A geography identifier as ESIOS assigns it (e.g. peninsula, an autonomous
/// community, a Balearic or Canary island). Newtype over `u32` so it can't
/// be confused with an item id or a plain column index at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeoId(pub u32);

impl GeoId {
    /// The column name a `GeoId` is stored under in a `WideFrame`.
    pub fn column_name(self) -> String {
        self.0.to_string()
    }
}

/// A process-wide, append-only `geo_id -> geo_name` map persisted once per
/// cache root. Entries are last-write-wins and never removed: ESIOS
/// geographies are a small, slowly-growing, never-shrinking set, so the
/// registry is a cache, not a source of truth, and reads are best-effort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoRegistry {
    names: BTreeMap<GeoId, String>,
}

impl GeoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: GeoId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn insert(&mut self, id: GeoId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Merge `other` into `self`, with `other`'s names winning on conflict —
    /// the caller passes freshly-fetched names as `other` so a renamed
    /// geography picks up its new label without a manual cache clear.
    pub fn merge(&mut self, other: &Self) {
        for (id, name) in &other.names {
            self.names.insert(*id, name.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeoId, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_other() {
        let mut base = GeoRegistry::new();
        base.insert(GeoId(8), "Madrid (old)");

        let mut fresh = GeoRegistry::new();
        fresh.insert(GeoId(8), "Madrid");
        fresh.insert(GeoId(9), "Ceuta");

        base.merge(&fresh);
        assert_eq!(base.get(GeoId(8)), Some("Madrid"));
        assert_eq!(base.get(GeoId(9)), Some("Ceuta"));
    }
}
