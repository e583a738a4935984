//! Pipeline configuration loaded from TOML

use crate::aggregate::{AggFunc, GapFill, GroupColumn, ValueColumn};
use crate::error::{ForecastError, Result};
use crate::forecaster::ModelSpec;
use crate::models::validate_levels;
use crate::wrangle::{CleanOptions, ParsePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the three tables come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A SQLite database file
    #[default]
    Sqlite,
    /// A directory of `<table>.csv` files
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: SourceKind,
    /// Database file or CSV directory
    pub path: PathBuf,
    pub description_policy: ParsePolicy,
    pub location_policy: ParsePolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Sqlite,
            path: PathBuf::from("bikeshop_database.sqlite"),
            description_policy: ParsePolicy::Lenient,
            location_policy: ParsePolicy::Lenient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub group: GroupColumn,
    pub value: ValueColumn,
    pub agg: AggFunc,
    /// Completion of months without orders before fitting
    pub gap_fill: GapFill,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            group: GroupColumn::Category2,
            value: ValueColumn::TotalPrice,
            agg: AggFunc::Sum,
            gap_fill: GapFill::Zero,
        }
    }
}

/// Model family fitted on every series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    AutoArima,
    Ets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub models: Vec<ModelKind>,
    pub season_length: usize,
    pub horizon: usize,
    pub levels: Vec<u8>,
    pub n_jobs: usize,
    pub checkpoint: PathBuf,
    /// Load the checkpoint instead of fitting
    pub reuse_checkpoint: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            models: vec![ModelKind::AutoArima],
            season_length: 12,
            horizon: 12,
            levels: vec![80, 95],
            n_jobs: 1,
            checkpoint: PathBuf::from("models/arima.json"),
            reuse_checkpoint: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for CSV exports; nothing is written when unset
    pub dir: Option<PathBuf>,
}

/// Complete pipeline configuration; every section is optional
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub aggregation: AggregationConfig,
    pub forecast: ForecastConfig,
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(ForecastError::ConfigError(message.to_string()));
        if self.forecast.horizon == 0 {
            return invalid("forecast.horizon must be at least 1");
        }
        if self.forecast.n_jobs == 0 {
            return invalid("forecast.n_jobs must be at least 1");
        }
        if self.forecast.season_length == 0 {
            return invalid("forecast.season_length must be at least 1");
        }
        if self.forecast.models.is_empty() {
            return invalid("forecast.models must name at least one model");
        }
        validate_levels(&self.forecast.levels)
            .map_err(|e| ForecastError::ConfigError(format!("forecast.levels: {}", e)))?;
        Ok(())
    }

    /// Model specifications for the forecaster
    pub fn model_specs(&self) -> Vec<ModelSpec> {
        self.forecast
            .models
            .iter()
            .map(|kind| match kind {
                ModelKind::AutoArima => ModelSpec::auto_arima(self.forecast.season_length),
                ModelKind::Ets => ModelSpec::ets(self.forecast.season_length),
            })
            .collect()
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            description_policy: self.data.description_policy,
            location_policy: self.data.location_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.forecast.horizon, 12);
        assert_eq!(config.forecast.levels, vec![80, 95]);
        assert_eq!(config.forecast.checkpoint, PathBuf::from("models/arima.json"));
    }

    #[test]
    fn test_group_names_match_columns() {
        let config = PipelineConfig::from_toml("[aggregation]\ngroup = \"category_2\"\n").unwrap();
        assert_eq!(config.aggregation.group, GroupColumn::Category2);
        for group in [GroupColumn::Category1, GroupColumn::Category2, GroupColumn::FrameMaterial] {
            let document = format!("[aggregation]\ngroup = \"{}\"\n", group.name());
            assert_eq!(PipelineConfig::from_toml(&document).unwrap().aggregation.group, group);
        }
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_toml(
            r#"
[data]
source = "csv"
path = "data/"

[forecast]
models = ["auto_arima", "ets"]
horizon = 6
"#,
        )
        .unwrap();
        assert_eq!(config.data.source, SourceKind::Csv);
        assert_eq!(config.forecast.horizon, 6);
        assert_eq!(config.forecast.season_length, 12);
        assert_eq!(config.model_specs().len(), 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("[forecast]\nhorizon = 0\n"),
            Err(ForecastError::ConfigError(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[forecast]\nlevels = [100]\n"),
            Err(ForecastError::ConfigError(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[forecast]\nmodel = 3\nhorizon = \"x\"\n"),
            Err(ForecastError::ConfigError(_))
        ));
    }
}
