use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::{
    DEFAULT_COMMIT_BATCH_SIZE, DEFAULT_MIN_AMOUNT_CONFIDENCE, DEFAULT_MIN_TICKER_CONFIDENCE,
    DEFAULT_NAME_SIMILARITY_THRESHOLD, DEFAULT_REVIEW_TOP_N, DEFAULT_SNAP_TOLERANCE_RATIO,
    DEFAULT_WORKERS,
};
use crate::error::{IngestError, Result};
use crate::pipeline::processing::quality_gate::QualityGateConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "DQ_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub amount: AmountConfig,
    pub reference: ReferenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_ticker_confidence: f64,
    pub min_amount_confidence: f64,
    /// Records per committed sub-batch
    pub commit_batch_size: usize,
    pub workers: usize,
    pub review_top_n: usize,
    /// Backfill fuzzy name match threshold
    pub name_similarity_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_ticker_confidence: DEFAULT_MIN_TICKER_CONFIDENCE,
            min_amount_confidence: DEFAULT_MIN_AMOUNT_CONFIDENCE,
            commit_batch_size: DEFAULT_COMMIT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            review_top_n: DEFAULT_REVIEW_TOP_N,
            name_similarity_threshold: DEFAULT_NAME_SIMILARITY_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn quality_gate(&self) -> QualityGateConfig {
        QualityGateConfig {
            min_ticker_confidence: self.min_ticker_confidence,
            min_amount_confidence: self.min_amount_confidence,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmountConfig {
    pub snap_tolerance_ratio: f64,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_ratio: DEFAULT_SNAP_TOLERANCE_RATIO,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Reference-data TOML; the built-in tables are used when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_prefix: "disclosure_quality.log".to_string(),
        }
    }
}

impl Config {
    /// Load from `$DQ_CONFIG`, else `config.toml`; a missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&config_content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(IngestError::Config(format!("{} must be within [0, 1], got {}", name, value)))
            }
        };
        unit("pipeline.min_ticker_confidence", self.pipeline.min_ticker_confidence)?;
        unit("pipeline.min_amount_confidence", self.pipeline.min_amount_confidence)?;
        unit("pipeline.name_similarity_threshold", self.pipeline.name_similarity_threshold)?;
        unit("amount.snap_tolerance_ratio", self.amount.snap_tolerance_ratio)?;

        if self.pipeline.commit_batch_size == 0 {
            return Err(IngestError::Config("pipeline.commit_batch_size must be positive".to_string()));
        }
        if self.pipeline.workers == 0 {
            return Err(IngestError::Config("pipeline.workers must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.pipeline.min_ticker_confidence, 0.5);
        assert_eq!(config.pipeline.min_amount_confidence, 0.5);
        assert_eq!(config.pipeline.commit_batch_size, 500);
        assert_eq!(config.amount.snap_tolerance_ratio, 0.05);
        assert!(config.reference.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [pipeline]
            workers = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.review_top_n, 25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml_str("[pipeline]\nmin_ticker_confidence = 1.5\n").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));

        let err = Config::from_toml_str("[pipeline]\ncommit_batch_size = 0\n").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));

        assert!(matches!(
            Config::from_toml_str("[pipeline]\nworkers = \"many\"\n").unwrap_err(),
            IngestError::Toml(_)
        ));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reference]\npath = \"refs.toml\"\n[logging]\ndirectory = \"/tmp/dq\"").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.reference.path, Some(PathBuf::from("refs.toml")));
        assert_eq!(config.logging.directory, PathBuf::from("/tmp/dq"));

        let missing = Config::load_from("/definitely/not/here.toml").unwrap();
        assert_eq!(missing.pipeline.workers, 4);
    }
}
