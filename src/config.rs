//! Dashboard configuration.
//!
//! Every field has a default matching the deployed dashboard, so an empty
//! TOML document (or `DashboardConfig::default()`) is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const DEFAULT_SOURCE_URL: &str = "https://docs.google.com/spreadsheets/d/\
1Ua0vVNtBNV5AR-tURo62lneVpeWCzN1J5LnkezCu2E4/export?format=csv&gid=751536993";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 120;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_TARGET_YEAR: i32 = 2030;
pub const DEFAULT_GOAL_START_YEAR: i32 = 2024;
/// Rental units called for by the 2022 housing needs study.
pub const DEFAULT_RENTAL_GOAL: i64 = 2897;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Spreadsheet CSV export location.
    pub source_url: String,
    /// How long a fetched sheet is served from cache.
    pub cache_ttl_seconds: u64,
    /// Upper bound on cached sheets.
    pub cache_max_entries: usize,
    pub request_timeout_seconds: u64,
    /// Last year materialized in the yearly table.
    pub target_year: i32,
    pub goal_start_year: i32,
    pub rental_goal: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            target_year: DEFAULT_TARGET_YEAR,
            goal_start_year: DEFAULT_GOAL_START_YEAR,
            rental_goal: DEFAULT_RENTAL_GOAL,
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        let config: DashboardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "Loaded dashboard configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.source_url.trim().is_empty() {
            return Err(PipelineError::Config("source_url must not be empty".into()));
        }
        if self.cache_max_entries == 0 {
            return Err(PipelineError::Config(
                "cache_max_entries must be at least 1".into(),
            ));
        }
        if self.goal_start_year > self.target_year {
            return Err(PipelineError::Config(format!(
                "goal_start_year {} is after target_year {}",
                self.goal_start_year, self.target_year
            )));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DashboardConfig::from_toml_str("").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.target_year, 2030);
        assert_eq!(config.rental_goal, 2897);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = DashboardConfig::from_toml_str(
            r#"
            source_url = "http://localhost:8080/sheet.csv"
            cache_ttl_seconds = 5
            target_year = 2035
            "#,
        )
        .unwrap();
        assert_eq!(config.source_url, "http://localhost:8080/sheet.csv");
        assert_eq!(config.cache_ttl_seconds, 5);
        assert_eq!(config.target_year, 2035);
        assert_eq!(config.cache_max_entries, DEFAULT_CACHE_MAX_ENTRIES);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = DashboardConfig::from_toml_str("cache_ttl = 5").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn validation_rules() {
        let mut config = DashboardConfig::default();
        config.cache_max_entries = 0;
        assert!(config.validate().is_err());

        let mut config = DashboardConfig::default();
        config.source_url = "  ".into();
        assert!(config.validate().is_err());

        let mut config = DashboardConfig::default();
        config.goal_start_year = 2031;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rental_goal = 1000").unwrap();
        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.rental_goal, 1000);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DashboardConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
