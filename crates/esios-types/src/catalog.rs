use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;

/// One row of the indicator/archive catalogue: enough to list and search
/// items without fetching their time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u32,
    pub name: String,
    pub short_name: Option<String>,
}

/// The full catalogue for one endpoint, plus when it was last refreshed so
/// `Manager::list`/`search` can apply `catalog_ttl_hours` (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub endpoint: Endpoint,
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(endpoint: Endpoint, updated_at: DateTime<Utc>, entries: Vec<CatalogEntry>) -> Self {
        Self {
            endpoint,
            updated_at,
            entries,
        }
    }

    pub fn find(&self, id: u32) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Case-insensitive substring search over name and short name.
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let query = query.to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&query)
                    || e.short_name
                        .as_deref()
                        .is_some_and(|s| s.to_lowercase().contains(&query))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Catalog {
        Catalog::new(
            Endpoint::Indicators,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            vec![
                CatalogEntry {
                    id: 600,
                    name: "Demanda real".to_string(),
                    short_name: Some("Demanda".to_string()),
                },
                CatalogEntry {
                    id: 601,
                    name: "Generacion eolica".to_string(),
                    short_name: None,
                },
            ],
        )
    }

    #[test]
    fn search_is_case_insensitive() {
        let catalog = sample();
        let hits = catalog.search("DEMANDA");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 600);
    }

    #[test]
    fn find_by_id() {
        let catalog = sample();
        assert_eq!(catalog.find(601).unwrap().name, "Generacion eolica");
        assert!(catalog.find(999).is_none());
    }
}
