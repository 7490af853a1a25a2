//! Run configuration.
//!
//! The transform and the sink take their configuration as explicit values.
//! Only the binary reads the process environment (after `dotenvy` has loaded
//! a `.env` file, if present) through [`SinkConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable overriding the snapshot output directory.
pub const ENV_OUTPUT_DIR: &str = "SALES_ETL_OUTPUT_DIR";

/// Environment variable naming the data source recorded in `etl_metadata`.
pub const ENV_SOURCE: &str = "SALES_ETL_SOURCE";

/// Default snapshot output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "data/processed";

/// Default source label.
pub const DEFAULT_SOURCE: &str = "sales_data_sample.csv";

/// Sentinel written into missing categorical values.
pub const UNKNOWN_SENTINEL: &str = "Unknown";

/// Tuning for the transform stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Fence width in IQRs for outlier clamping
    pub iqr_multiplier: f64,

    /// Quantile used as Q1
    pub lower_quantile: f64,

    /// Quantile used as Q3
    pub upper_quantile: f64,

    /// Replacement for missing categorical values
    pub unknown_sentinel: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
            lower_quantile: 0.25,
            upper_quantile: 0.75,
            unknown_sentinel: UNKNOWN_SENTINEL.to_string(),
        }
    }
}

impl TransformConfig {
    /// Check that the quantiles and multiplier describe a usable fence.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |q: f64| (0.0..=1.0).contains(&q);
        if !in_unit(self.lower_quantile) || !in_unit(self.upper_quantile) {
            return Err(ConfigError::InvalidValue {
                key: "quantiles".into(),
                message: "must lie in [0, 1]".into(),
            });
        }
        if self.lower_quantile > self.upper_quantile {
            return Err(ConfigError::InvalidValue {
                key: "quantiles".into(),
                message: format!(
                    "lower quantile {} exceeds upper quantile {}",
                    self.lower_quantile, self.upper_quantile
                ),
            });
        }
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "iqr_multiplier".into(),
                message: "must be a finite, non-negative number".into(),
            });
        }
        Ok(())
    }
}

/// Where and under which label the output tables are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub output_dir: PathBuf,
    pub source: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            source: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl SinkConfig {
    /// Build from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            output_dir: lookup(ENV_OUTPUT_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            source: lookup(ENV_SOURCE)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TransformConfig::default();
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.unknown_sentinel, "Unknown");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_quantiles_rejected() {
        let config = TransformConfig {
            lower_quantile: 0.9,
            upper_quantile: 0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sink_config_lookup() {
        let env: HashMap<&str, &str> = [(ENV_OUTPUT_DIR, "/tmp/out"), (ENV_SOURCE, "")].into();
        let config = SinkConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        // Blank values fall back to the default
        assert_eq!(config.source, DEFAULT_SOURCE);
    }
}
