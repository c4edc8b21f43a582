//! Client library and CLI for ESIOS electricity-market indicator time
//! series and archive bundles, backed by a persistent local cache.

pub mod archives;
pub mod cli;
pub mod config;
pub mod historical;
pub mod manager;
pub mod output;

pub use archives::ArchiveHandle;
pub use config::Config;
pub use historical::{HistoryRequest, IndicatorHandle};
pub use manager::Manager;
pub use output::{render, write_output, OutputFormat};
