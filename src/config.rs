//! Configuration Module
//!
//! TOML configuration for the pipeline stages. Every section is optional and
//! CLI arguments override file settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::export::OutputFormat;
use crate::labels::LabelMap;
use crate::partition::PartitionConfig;
use crate::report::ReportConfig;

/// Configuration file picked up from the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE: &str = "netflow-classify.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub labels: LabelsConfig,
    pub partition: PartitionConfig,
    pub report: ReportConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads configuration from file if it exists, otherwise returns defaults
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {:#}, using defaults", e);
            Self::default()
        })
    }

    /// Generates a default configuration file content
    pub fn generate_default() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| "# Failed to generate config".to_string())
    }

    /// Validates the configuration
    ///
    /// `[partition]` is checked by `Partitioner::new` once CLI overrides are
    /// merged in, so a file value the command line replaces never fails here.
    pub fn validate(&self) -> Result<()> {
        if self.report.decimals > 15 {
            anyhow::bail!("report.decimals must be at most 15");
        }
        if matches!(&self.labels.sentinel, Some(s) if s.is_empty()) {
            anyhow::bail!("labels.sentinel must not be empty");
        }
        Ok(())
    }
}

/// Label table configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// External tag table (None = bundled table)
    pub file: Option<PathBuf>,
    /// Overrides the table's sentinel class
    pub sentinel: Option<String>,
    /// Extra tag mappings applied over the table
    pub mapping: BTreeMap<String, String>,
}

impl LabelsConfig {
    /// Builds the effective label table.
    pub fn resolve(&self) -> Result<LabelMap> {
        let mut map = match &self.file {
            Some(path) => LabelMap::load(path)?,
            None => LabelMap::default(),
        };
        if let Some(sentinel) = &self.sentinel {
            map.sentinel = sentinel.clone();
        }
        map.mapping
            .extend(self.mapping.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(map)
    }
}

/// Output-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format (text, json, jsonl)
    #[serde(with = "output_format_serde")]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
        }
    }
}

/// Custom serde implementation for OutputFormat
mod output_format_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(format: &OutputFormat, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OutputFormat, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
