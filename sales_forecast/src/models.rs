//! Forecasting models for single monthly series
//!
//! A model specification implements [`ForecastModel`] and trains into a
//! [`TrainedForecastModel`], which owns everything needed to forecast.

use crate::error::{ForecastError, Result};
use statrs::distribution::{ContinuousCDF, Normal};

pub mod arima;
pub mod auto_arima;
pub mod ets;

/// Lower and upper bounds of one prediction interval
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionInterval {
    /// Coverage in percent, e.g. 80 or 95
    pub level: u8,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Result of a forecast operation
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    /// Point forecasts, one per step ahead
    pub values: Vec<f64>,
    /// One interval per requested level, in request order
    pub intervals: Vec<PredictionInterval>,
}

impl ForecastResult {
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    pub fn interval(&self, level: u8) -> Option<&PredictionInterval> {
        self.intervals.iter().find(|i| i.level == level)
    }
}

/// A model specification that can be trained on one series
pub trait ForecastModel {
    /// Fitted state produced by training
    type Trained: TrainedForecastModel;

    /// Train the model on an evenly spaced series
    fn train(&self, data: &[f64]) -> Result<Self::Trained>;

    /// Get the model name
    fn name(&self) -> &str;
}

/// A fitted model able to forecast its own series forward
pub trait TrainedForecastModel {
    /// Forecast `horizon` steps ahead with an interval per level
    fn forecast(&self, horizon: usize, levels: &[u8]) -> Result<ForecastResult>;

    /// In-sample one-step-ahead predictions
    fn fitted_values(&self) -> Vec<f64>;

    /// Observed minus fitted
    fn residuals(&self) -> Vec<f64>;

    /// Short description of the fitted structure
    fn describe(&self) -> String;
}

/// Check that every level lies strictly between 0 and 100
pub fn validate_levels(levels: &[u8]) -> Result<()> {
    match levels.iter().find(|&&l| l == 0 || l >= 100) {
        Some(level) => Err(ForecastError::InvalidParameter(format!(
            "Confidence level must be in (0, 100), got {}",
            level
        ))),
        None => Ok(()),
    }
}

/// Two-sided standard normal quantile for a coverage level in percent
pub fn z_value(level: u8) -> Result<f64> {
    validate_levels(&[level])?;
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::InvalidParameter(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf(0.5 + f64::from(level) / 200.0))
}

/// Symmetric normal intervals around `values` given per-step variances
pub fn normal_intervals(values: &[f64], variances: &[f64], levels: &[u8]) -> Result<Vec<PredictionInterval>> {
    levels
        .iter()
        .map(|&level| {
            let z = z_value(level)?;
            let widths: Vec<f64> = variances.iter().map(|v| z * v.max(0.0).sqrt()).collect();
            Ok(PredictionInterval {
                level,
                lower: values.iter().zip(&widths).map(|(v, w)| v - w).collect(),
                upper: values.iter().zip(&widths).map(|(v, w)| v + w).collect(),
            })
        })
        .collect()
}

pub(crate) fn require_finite(data: &[f64]) -> Result<()> {
    if data.is_empty() {
        return Err(ForecastError::FitError("Cannot fit an empty series".to_string()));
    }
    if let Some(position) = data.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::FitError(format!(
            "Series value at position {} is not finite",
            position
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_z_values() {
        assert_relative_eq!(z_value(95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(z_value(80).unwrap(), 1.281552, epsilon = 1e-5);
        assert!(z_value(0).is_err());
        assert!(z_value(100).is_err());
    }

    #[test]
    fn test_normal_intervals_nest() {
        let intervals = normal_intervals(&[10.0, 10.0], &[1.0, 4.0], &[80, 95]).unwrap();
        assert_eq!(intervals.len(), 2);
        assert!(intervals[1].lower[1] < intervals[0].lower[1]);
        assert!(intervals[1].upper[1] > intervals[0].upper[1]);
        assert_relative_eq!(intervals[1].upper[0] - 10.0, 1.959964, epsilon = 1e-5);
    }
}
