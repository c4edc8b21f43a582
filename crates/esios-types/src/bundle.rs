use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// How an archive's publication date keys its download URL: daily archives
/// are keyed by a single date, monthly ones by the month's first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizon {
    Daily,
    Monthly,
}

impl Horizon {
    /// The date-key ESIOS expects for `day`, per this horizon.
    pub fn date_key(self, day: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => day,
            Self::Monthly => day.with_day(1).unwrap_or(day),
        }
    }
}

/// The archive's on-the-wire content type, which decides how it's unpacked
/// once downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    Zip,
    Excel,
}

impl ArchiveKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.contains("zip") {
            Some(Self::Zip)
        } else if content_type.contains("spreadsheet") || content_type.contains("excel") {
            Some(Self::Excel)
        } else {
            None
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Excel => "xlsx",
        }
    }
}

/// Identifies one downloadable bundle folder: an archive id and the
/// publication date it was issued for, narrowed to the horizon's date-key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleKey {
    pub archive_id: u32,
    pub date_key: NaiveDate,
}

impl BundleKey {
    pub fn new(archive_id: u32, horizon: Horizon, day: NaiveDate) -> Self {
        Self {
            archive_id,
            date_key: horizon.date_key(day),
        }
    }

    /// The folder name this bundle is stored under, e.g. `2025-01-01`.
    pub fn folder_name(&self) -> String {
        self.date_key.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_horizon_keys_to_first_of_month() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let key = BundleKey::new(42, Horizon::Monthly, day);
        assert_eq!(key.folder_name(), "2025-03-01");
    }

    #[test]
    fn daily_horizon_keeps_exact_day() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let key = BundleKey::new(42, Horizon::Daily, day);
        assert_eq!(key.folder_name(), "2025-03-17");
    }
}
