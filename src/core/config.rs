use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::core::error::{IndexError, Result};
use crate::mapper::field::IndexedFieldType;

/// Index configuration.
///
/// ```toml
/// indexes_dir = "./indexes"
/// default_analyzer = "english"
/// default_string_type = "Text"
/// zone_offset_seconds = 3600
///
/// [writer]
/// max_buffered_docs = 5000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexes_dir: PathBuf,
    pub default_analyzer: String,
    /// Backend type of string fields declared without an explicit type.
    pub default_string_type: IndexedFieldType,
    /// Offset applied when converting local date-times to epoch seconds.
    pub zone_offset_seconds: i32,

    /// Hits counted exactly before an early-terminating search reports a lower bound.
    pub total_hits_threshold: usize,
    pub list_batch_size: usize,
    pub reindex_batch_size: usize,
    pub reindex_fetch_size: usize,

    pub writer: WriterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            indexes_dir: PathBuf::from("./indexes"),
            default_analyzer: "standard".to_string(),
            default_string_type: IndexedFieldType::Text,
            zone_offset_seconds: 0,
            total_hits_threshold: 1000,
            list_batch_size: 1000,
            reindex_batch_size: 50_000,
            reindex_fetch_size: 5_000,
            writer: WriterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Buffered documents are frozen into a segment past this count.
    pub max_buffered_docs: usize,
    pub commit_on_close: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            max_buffered_docs: 1000,
            commit_on_close: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| IndexError::configuration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.list_batch_size == 0 || self.reindex_batch_size == 0 || self.reindex_fetch_size == 0 {
            return Err(IndexError::configuration("batch sizes must be greater than zero"));
        }
        if self.writer.max_buffered_docs == 0 {
            return Err(IndexError::configuration("writer.max_buffered_docs must be greater than zero"));
        }
        if !matches!(
            self.default_string_type,
            IndexedFieldType::String | IndexedFieldType::Text | IndexedFieldType::Keyword
        ) {
            return Err(IndexError::configuration(format!(
                "default_string_type must be String, Text or Keyword, got {:?}",
                self.default_string_type
            )));
        }
        Ok(())
    }
}
