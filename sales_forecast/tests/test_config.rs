use pretty_assertions::assert_eq;
use sales_forecast::aggregate::{AggFunc, GapFill, GroupColumn, ValueColumn};
use sales_forecast::config::{ModelKind, PipelineConfig, SourceKind};
use sales_forecast::error::ForecastError;
use sales_forecast::wrangle::ParsePolicy;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_full_document() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[data]
source = "sqlite"
path = "data/bikeshop_database.sqlite"
description_policy = "strict"

[aggregation]
group = "category_1"
value = "quantity"
agg = "mean"
gap_fill = "none"

[forecast]
models = ["ets"]
season_length = 4
horizon = 8
levels = [50, 90]
n_jobs = 3
checkpoint = "out/ets.json"
reuse_checkpoint = true

[output]
dir = "out"
"#
    )
    .unwrap();

    let config = PipelineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.data.source, SourceKind::Sqlite);
    assert_eq!(config.data.path, PathBuf::from("data/bikeshop_database.sqlite"));
    assert_eq!(config.data.description_policy, ParsePolicy::Strict);
    assert_eq!(config.data.location_policy, ParsePolicy::Lenient);
    assert_eq!(config.aggregation.group, GroupColumn::Category1);
    assert_eq!(config.aggregation.value, ValueColumn::Quantity);
    assert_eq!(config.aggregation.agg, AggFunc::Mean);
    assert_eq!(config.aggregation.gap_fill, GapFill::None);
    assert_eq!(config.forecast.models, vec![ModelKind::Ets]);
    assert_eq!(config.forecast.levels, vec![50, 90]);
    assert!(config.forecast.reuse_checkpoint);
    assert_eq!(config.output.dir, Some(PathBuf::from("out")));

    let specs = config.model_specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].name(), "ETS");
    assert_eq!(config.clean_options().description_policy, ParsePolicy::Strict);
}

#[test]
fn test_defaults_follow_the_bikeshop_run() {
    let config = PipelineConfig::default();
    assert_eq!(config.data.path, PathBuf::from("bikeshop_database.sqlite"));
    assert_eq!(config.aggregation.group, GroupColumn::Category2);
    assert_eq!(config.aggregation.value, ValueColumn::TotalPrice);
    assert_eq!(config.aggregation.gap_fill, GapFill::Zero);
    assert_eq!(config.forecast.season_length, 12);
    assert_eq!(config.forecast.horizon, 12);
    assert_eq!(config.forecast.n_jobs, 1);
    assert_eq!(config.output.dir, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_config_error() {
    assert!(matches!(
        PipelineConfig::from_file("/nonexistent/forecast.toml"),
        Err(ForecastError::ConfigError(_))
    ));
}

#[test]
fn test_unknown_enum_value_rejected() {
    assert!(matches!(
        PipelineConfig::from_toml("[aggregation]\ngroup = \"colour\"\n"),
        Err(ForecastError::ConfigError(_))
    ));
    assert!(matches!(
        PipelineConfig::from_toml("[forecast]\nmodels = []\n"),
        Err(ForecastError::ConfigError(_))
    ));
    assert!(matches!(
        PipelineConfig::from_toml("[forecast]\nn_jobs = 0\n"),
        Err(ForecastError::ConfigError(_))
    ));
}
