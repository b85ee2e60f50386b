//! Run settings shared by the CLI and library callers.
//!
//! Settings come from [`RemapConfig::default`], optionally replaced by a YAML
//! file, then overridden field by field by command-line flags.

use std::{fs::File, io::BufReader, path::Path};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    batch::DEFAULT_BATCH_SIZE,
    columns::{DEFAULT_ID_COLUMNS, DEFAULT_TARGET_PREFIX},
    error::{RemapError, RemapResult},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ReportMode {
    /// One row per unmapped identifier per batch
    #[default]
    Ids,
    /// One row per unmapped cell with its column, original value and reason
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemapConfig {
    pub batch_size: usize,
    pub target_prefix: String,
    /// Identifier column names in priority order; the first column is the
    /// fallback when none is present.
    pub id_columns: Vec<String>,
    pub report_mode: ReportMode,
}

impl Default for RemapConfig {
    fn default() -> Self {
        RemapConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            target_prefix: DEFAULT_TARGET_PREFIX.to_string(),
            id_columns: DEFAULT_ID_COLUMNS.iter().map(|s| s.to_string()).collect(),
            report_mode: ReportMode::Ids,
        }
    }
}

impl RemapConfig {
    pub fn load(path: &Path) -> RemapResult<Self> {
        let file = File::open(path).map_err(|err| {
            RemapError::configuration(format!("Opening config file {path:?}: {err}"))
        })?;
        let config: RemapConfig = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| RemapError::configuration(format!("Parsing config {path:?}: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Layers command-line overrides on top of the config file at `path`, or
    /// on top of the defaults when there is none.
    pub fn layered(
        path: Option<&Path>,
        batch_size: Option<usize>,
        target_prefix: Option<&str>,
        id_columns: &[String],
        report_mode: Option<ReportMode>,
    ) -> RemapResult<Self> {
        let mut config = match path {
            Some(path) => RemapConfig::load(path)?,
            None => RemapConfig::default(),
        };
        if let Some(size) = batch_size {
            config.batch_size = size;
        }
        if let Some(prefix) = target_prefix {
            config.target_prefix = prefix.to_string();
        }
        if !id_columns.is_empty() {
            config.id_columns = id_columns
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string())
                .collect();
        }
        if let Some(mode) = report_mode {
            config.report_mode = mode;
        }
        config.validate()?;
        debug!("Effective settings: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> RemapResult<()> {
        if self.batch_size == 0 {
            return Err(RemapError::configuration("batch_size must be at least 1"));
        }
        if self.target_prefix.trim().is_empty() {
            return Err(RemapError::configuration("target_prefix cannot be empty"));
        }
        if self.id_columns.iter().any(|name| name.trim().is_empty()) {
            return Err(RemapError::configuration(
                "id_columns cannot contain empty names",
            ));
        }
        Ok(())
    }
}
