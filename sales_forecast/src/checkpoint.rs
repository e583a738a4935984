//! Versioned JSON checkpoints of a fitted forecaster
//!
//! The document records the model specifications, the frequency and, per
//! series, the fitted coefficients and the state needed to forecast. Floats
//! are written so that they read back to the same bits.

use crate::aggregate::Frequency;
use crate::error::{ForecastError, Result};
use crate::forecaster::{FittedSeries, ModelSpec, StatsForecaster};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Value of the `format` field
pub const CHECKPOINT_FORMAT: &str = "sales-forecast-checkpoint";
/// Current checkpoint layout version
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    format: String,
    version: u32,
    created_with: String,
    frequency: Frequency,
    n_jobs: usize,
    models: Vec<ModelSpec>,
    series: Vec<FittedSeries>,
}

/// Write `forecaster` to `path`, creating parent directories
pub fn save(forecaster: &StatsForecaster, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !forecaster.is_fitted() {
        return Err(ForecastError::FitRequired);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let checkpoint = Checkpoint {
        format: CHECKPOINT_FORMAT.to_string(),
        version: CHECKPOINT_VERSION,
        created_with: format!("{} {}", crate::NAME, crate::VERSION),
        frequency: forecaster.freq(),
        n_jobs: forecaster.n_jobs(),
        models: forecaster.models().to_vec(),
        series: forecaster.fitted().to_vec(),
    };
    let json = serde_json::to_string_pretty(&checkpoint)?;
    fs::write(path, json)?;
    info!(path = %path.display(), series = checkpoint.series.len(), "Saved checkpoint");
    Ok(())
}

/// Read a checkpoint written by [`save`]
pub fn load(path: impl AsRef<Path>) -> Result<StatsForecaster> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let document: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        ForecastError::CheckpointError(format!("{} is not valid JSON: {}", path.display(), e))
    })?;

    match document.get("format").and_then(|f| f.as_str()) {
        Some(CHECKPOINT_FORMAT) => {}
        other => {
            return Err(ForecastError::CheckpointError(format!(
                "{} has format {:?}, expected '{}'",
                path.display(),
                other,
                CHECKPOINT_FORMAT
            )))
        }
    }
    match document.get("version").and_then(|v| v.as_u64()) {
        Some(version) if version == u64::from(CHECKPOINT_VERSION) => {}
        other => {
            return Err(ForecastError::CheckpointError(format!(
                "{} has version {:?}, supported version is {}",
                path.display(),
                other,
                CHECKPOINT_VERSION
            )))
        }
    }

    let checkpoint: Checkpoint = serde_json::from_value(document).map_err(|e| {
        ForecastError::CheckpointError(format!("{} is corrupt: {}", path.display(), e))
    })?;
    info!(
        path = %path.display(),
        series = checkpoint.series.len(),
        created_with = %checkpoint.created_with,
        "Loaded checkpoint"
    );
    StatsForecaster::from_parts(
        checkpoint.models,
        checkpoint.frequency,
        checkpoint.n_jobs,
        checkpoint.series,
    )
}
