//! Configuration precedence: built-in defaults, then a user config file,
//! then environment variables, then explicit builder overrides — each
//! layer only replacing fields the one before it didn't set.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use esios_types::EsiosError;
use serde::{Deserialize, Serialize};

const DEFAULT_RECENT_TTL_HOURS: i64 = 48;
const DEFAULT_META_TTL_DAYS: i64 = 7;
const DEFAULT_CATALOG_TTL_HOURS: i64 = 24;
const DEFAULT_CHUNK_MAX_DAYS: u32 = 21;
const DEFAULT_TIMEZONE: &str = "Europe/Madrid";

/// Every option spec.md §6 names, with the precedence described above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub cache_dir: Option<PathBuf>,
    pub recent_ttl_hours: i64,
    pub meta_ttl_days: i64,
    pub catalog_ttl_hours: i64,
    pub chunk_max_days: u32,
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: None,
            recent_ttl_hours: DEFAULT_RECENT_TTL_HOURS,
            meta_ttl_days: DEFAULT_META_TTL_DAYS,
            catalog_ttl_hours: DEFAULT_CATALOG_TTL_HOURS,
            chunk_max_days: DEFAULT_CHUNK_MAX_DAYS,
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then overlay `config_path` (if it exists), then
    /// `ESIOS_*` environment variables.
    pub fn load(config_path: &Path) -> Result<Self, EsiosError> {
        let mut config = Self::default();

        if let Ok(contents) = fs_err::read_to_string(config_path) {
            let from_file: Self = toml::from_str(&contents)
                .map_err(|err| EsiosError::Config(format!("invalid config file {}: {err}", config_path.display())))?;
            config = from_file;
        }

        if let Ok(dir) = std::env::var("ESIOS_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// The resolved cache root: the configured override, or
    /// `directories::ProjectDirs`' cache dir, matching the teacher's own
    /// use of the `directories` crate for platform-appropriate paths.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "esios")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".esios-cache"))
    }

    pub fn timezone(&self) -> Result<Tz, EsiosError> {
        self.timezone
            .parse()
            .map_err(|_| EsiosError::Config(format!("unknown timezone: {}", self.timezone)))
    }

    pub fn recent_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.recent_ttl_hours)
    }

    pub fn meta_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.meta_ttl_days)
    }

    pub fn catalog_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.catalog_ttl_hours)
    }

    /// Read a single key for `esios config get <key>`, by field name.
    pub fn get(&self, key: &str) -> Result<String, EsiosError> {
        Ok(match key {
            "enabled" => self.enabled.to_string(),
            "cache_dir" => self.resolved_cache_dir().display().to_string(),
            "recent_ttl_hours" => self.recent_ttl_hours.to_string(),
            "meta_ttl_days" => self.meta_ttl_days.to_string(),
            "catalog_ttl_hours" => self.catalog_ttl_hours.to_string(),
            "chunk_max_days" => self.chunk_max_days.to_string(),
            "timezone" => self.timezone.clone(),
            other => return Err(EsiosError::UserInput(format!("unknown config key: {other}"))),
        })
    }

    /// Set a single key for `esios config set <key> <value>`, then persist
    /// the whole config back to `config_path` atomically.
    pub fn set(&mut self, key: &str, value: &str, config_path: &Path) -> Result<(), EsiosError> {
        match key {
            "enabled" => self.enabled = parse_bool(value)?,
            "cache_dir" => self.cache_dir = Some(PathBuf::from(value)),
            "recent_ttl_hours" => self.recent_ttl_hours = parse_i64(value)?,
            "meta_ttl_days" => self.meta_ttl_days = parse_i64(value)?,
            "catalog_ttl_hours" => self.catalog_ttl_hours = parse_i64(value)?,
            "chunk_max_days" => self.chunk_max_days = parse_u32(value)?,
            "timezone" => {
                value
                    .parse::<Tz>()
                    .map_err(|_| EsiosError::UserInput(format!("unknown timezone: {value}")))?;
                self.timezone = value.to_string();
            }
            other => return Err(EsiosError::UserInput(format!("unknown config key: {other}"))),
        }
        self.save(config_path)
    }

    fn save(&self, config_path: &Path) -> Result<(), EsiosError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|err| EsiosError::Config(format!("failed to serialize config: {err}")))?;
        esios_fs::write_atomic(config_path, toml.as_bytes()).map_err(EsiosError::from)
    }
}

fn parse_bool(value: &str) -> Result<bool, EsiosError> {
    value
        .parse()
        .map_err(|_| EsiosError::UserInput(format!("expected true/false, got `{value}`")))
}

fn parse_i64(value: &str) -> Result<i64, EsiosError> {
    value
        .parse()
        .map_err(|_| EsiosError::UserInput(format!("expected an integer, got `{value}`")))
}

fn parse_u32(value: &str) -> Result<u32, EsiosError> {
    value
        .parse()
        .map_err(|_| EsiosError::UserInput(format!("expected an integer, got `{value}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.recent_ttl_hours, 48);
        assert_eq!(config.meta_ttl_days, 7);
        assert_eq!(config.catalog_ttl_hours, 24);
        assert_eq!(config.chunk_max_days, 21);
    }

    #[test]
    fn get_unknown_key_is_user_input_error() {
        let config = Config::default();
        assert!(matches!(config.get("nonsense"), Err(EsiosError::UserInput(_))));
    }

    #[test]
    fn set_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.set("chunk_max_days", "10", &path).unwrap();
        assert_eq!(config.get("chunk_max_days").unwrap(), "10");

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.chunk_max_days, 10);
    }
}
