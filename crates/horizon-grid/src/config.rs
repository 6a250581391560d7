//! Grid configuration.
//!
//! [`GridConfig`] can be built in code with the `with_*` methods or loaded
//! from TOML. Missing keys take their defaults.
//!
//! ```toml
//! source = "orders"
//! row_id_field = "id"
//! initial_row_count = 50
//! fetch_more_increment = 50
//! paginate = true
//! error_dismiss_ms = 4000
//! min_column_width = 24
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default page size at mount.
pub const DEFAULT_ROW_COUNT: usize = 50;
/// Default time before a save error clears itself.
pub const DEFAULT_ERROR_DISMISS_MS: u64 = 4000;
/// Default lower bound for column widths.
pub const DEFAULT_MIN_COLUMN_WIDTH: u32 = 24;

/// Settings for one grid instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Source relation (table or view) to query.
    pub source: String,
    /// Field that uniquely identifies a row.
    pub row_id_field: String,
    /// Requested page size at mount.
    pub initial_row_count: usize,
    /// How much each fetch-more grows the page.
    pub fetch_more_increment: usize,
    /// Whether queries are limited to the requested page size.
    pub paginate: bool,
    /// Milliseconds before a save error clears itself.
    pub error_dismiss_ms: u64,
    /// Lower bound applied to column widths.
    pub min_column_width: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            row_id_field: "id".to_string(),
            initial_row_count: DEFAULT_ROW_COUNT,
            fetch_more_increment: DEFAULT_ROW_COUNT,
            paginate: true,
            error_dismiss_ms: DEFAULT_ERROR_DISMISS_MS,
            min_column_width: DEFAULT_MIN_COLUMN_WIDTH,
        }
    }
}

impl GridConfig {
    /// Create a configuration for a source relation with default settings.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Check that the settings can drive a grid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::invalid("source must not be empty"));
        }
        if self.row_id_field.trim().is_empty() {
            return Err(ConfigError::invalid("row_id_field must not be empty"));
        }
        if self.paginate && self.initial_row_count == 0 {
            return Err(ConfigError::invalid(
                "initial_row_count must be positive when paginating",
            ));
        }
        Ok(())
    }

    pub fn with_row_id_field(mut self, field: impl Into<String>) -> Self {
        self.row_id_field = field.into();
        self
    }

    pub fn with_initial_row_count(mut self, count: usize) -> Self {
        self.initial_row_count = count;
        self
    }

    pub fn with_fetch_more_increment(mut self, increment: usize) -> Self {
        self.fetch_more_increment = increment;
        self
    }

    pub fn with_pagination(mut self, paginate: bool) -> Self {
        self.paginate = paginate;
        self
    }

    pub fn with_error_dismiss(mut self, duration: Duration) -> Self {
        self.error_dismiss_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_min_column_width(mut self, width: u32) -> Self {
        self.min_column_width = width;
        self
    }

    /// The error dismiss delay as a [`Duration`].
    pub fn error_dismiss_duration(&self) -> Duration {
        Duration::from_millis(self.error_dismiss_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GridConfig::new("orders");
        assert_eq!(config.row_id_field, "id");
        assert_eq!(config.error_dismiss_duration(), Duration::from_millis(4000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_with_partial_keys() {
        let config = GridConfig::from_toml_str(
            r#"
            source = "people"
            initial_row_count = 20
            paginate = false
            "#,
        )
        .unwrap();
        assert_eq!(config.source, "people");
        assert_eq!(config.initial_row_count, 20);
        assert!(!config.paginate);
        assert_eq!(config.fetch_more_increment, DEFAULT_ROW_COUNT);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GridConfig::new("orders")
            .with_initial_row_count(10)
            .with_error_dismiss(Duration::from_secs(2));
        let text = config.to_toml_string().unwrap();
        assert_eq!(GridConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            GridConfig::default().validate(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(GridConfig::new("t").with_initial_row_count(0).validate().is_err());
        assert!(
            GridConfig::new("t")
                .with_initial_row_count(0)
                .with_pagination(false)
                .validate()
                .is_ok()
        );
        assert!(matches!(
            GridConfig::from_toml_str("source = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = GridConfig::from_file("/nonexistent/grid.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
