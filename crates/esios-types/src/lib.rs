//! Shared data model for the ESIOS client: the wide time-series frame, the
//! date-range arithmetic the gap planner runs on, and the small value types
//! (`Endpoint`, `GeoId`, catalogue rows, bundle keys) that the cache,
//! client, and CLI crates all need without depending on each other.

pub mod bundle;
pub mod catalog;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod geo;
pub mod metadata;
pub mod range;

pub use bundle::{ArchiveKind, BundleKey, Horizon};
pub use catalog::{Catalog, CatalogEntry};
pub use endpoint::Endpoint;
pub use error::EsiosError;
pub use frame::{WideFrame, VALUE_COLUMN};
pub use geo::{GeoId, GeoRegistry};
pub use metadata::ItemMetadata;
pub use range::{merge_ranges, DateRange};
