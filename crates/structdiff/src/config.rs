//! History configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest accepted `chunk_window_secs`: one year.
pub const MAX_CHUNK_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Tuning for timeline loading and chunking.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// page_size = 100
/// chunk_window_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Transactions requested per backward fetch.
    pub page_size: usize,
    /// Largest gap between two edits by the same author that still lands
    /// them in one chunk.
    pub chunk_window_secs: u64,
    /// Extra pages fetched while resolving a range before giving up.
    pub max_fetch_rounds: usize,
    /// Emit a trace event for every transaction folded into a snapshot.
    pub enable_trace: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            chunk_window_secs: 300,
            max_fetch_rounds: 10,
            enable_trace: false,
        }
    }
}

impl HistoryConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: HistoryConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Value("page_size must be at least 1".to_string()));
        }
        if self.chunk_window_secs > MAX_CHUNK_WINDOW_SECS {
            return Err(ConfigError::Value(format!(
                "chunk_window_secs must be at most {MAX_CHUNK_WINDOW_SECS}"
            )));
        }
        Ok(())
    }

    /// The merge window, clamped to [`MAX_CHUNK_WINDOW_SECS`] for configs
    /// built without [`validate`](Self::validate).
    pub fn chunk_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.chunk_window_secs.min(MAX_CHUNK_WINDOW_SECS) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = HistoryConfig::from_toml_str("page_size = 10\nenable_trace = true\n").unwrap();
        assert_eq!(config.page_size, 10);
        assert!(config.enable_trace);
        assert_eq!(config.chunk_window_secs, 300);
        assert_eq!(config.max_fetch_rounds, 10);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(HistoryConfig::from_toml_str("").unwrap(), HistoryConfig::default());
    }

    #[test]
    fn chunk_window_is_bounded() {
        let config = HistoryConfig::from_toml_str("chunk_window_secs = 90").unwrap();
        assert_eq!(config.chunk_window(), chrono::Duration::seconds(90));

        assert!(matches!(
            HistoryConfig::from_toml_str(&format!("chunk_window_secs = {}", u64::MAX >> 1)),
            Err(ConfigError::Value(_))
        ));
        let unchecked = HistoryConfig {
            chunk_window_secs: u64::MAX,
            ..Default::default()
        };
        assert!(unchecked.chunk_window() > chrono::Duration::zero());
    }

    #[test]
    fn rejects_zero_page_size() {
        assert!(matches!(
            HistoryConfig::from_toml_str("page_size = 0"),
            Err(ConfigError::Value(_))
        ));
        assert!(matches!(
            HistoryConfig::from_toml_str("page_size = \"x\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
