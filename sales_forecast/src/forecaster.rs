//! Fit and forecast many monthly series at once
//!
//! [`StatsForecaster`] holds one fitted model per series and per model
//! specification. Series are independent; with `n_jobs > 1` they are fitted
//! on a dedicated rayon pool of that size.

use crate::aggregate::{Frequency, MonthlySeries};
use crate::error::{ForecastError, Result};
use crate::metrics::{forecast_accuracy, ForecastAccuracy};
use crate::models::arima::SarimaFit;
use crate::models::auto_arima::AutoArima;
use crate::models::ets::{Ets, EtsFit};
use crate::models::{validate_levels, ForecastModel, ForecastResult, TrainedForecastModel};
use crate::utils::{future_months, is_month_start};
use chrono::NaiveDate;
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// A model to fit on every series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    AutoArima(AutoArima),
    Ets(Ets),
}

impl ModelSpec {
    pub fn auto_arima(season_length: usize) -> Self {
        ModelSpec::AutoArima(AutoArima::new(season_length))
    }

    pub fn ets(season_length: usize) -> Self {
        ModelSpec::Ets(Ets::new(season_length))
    }

    /// Column name used for this model's forecasts
    pub fn name(&self) -> &str {
        match self {
            ModelSpec::AutoArima(model) => model.name(),
            ModelSpec::Ets(model) => model.name(),
        }
    }

    pub fn fit(&self, data: &[f64]) -> Result<FittedModel> {
        match self {
            ModelSpec::AutoArima(model) => model.train(data).map(FittedModel::Sarima),
            ModelSpec::Ets(model) => model.train(data).map(FittedModel::Ets),
        }
    }
}

/// Fitted state of one model on one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum FittedModel {
    Sarima(SarimaFit),
    Ets(EtsFit),
}

impl FittedModel {
    fn trained(&self) -> &dyn TrainedForecastModel {
        match self {
            FittedModel::Sarima(fit) => fit,
            FittedModel::Ets(fit) => fit,
        }
    }

    pub fn forecast(&self, horizon: usize, levels: &[u8]) -> Result<ForecastResult> {
        self.trained().forecast(horizon, levels)
    }

    pub fn fitted_values(&self) -> Vec<f64> {
        self.trained().fitted_values()
    }

    pub fn residuals(&self) -> Vec<f64> {
        self.trained().residuals()
    }

    pub fn describe(&self) -> String {
        self.trained().describe()
    }

    fn history(&self) -> &[f64] {
        match self {
            FittedModel::Sarima(fit) => &fit.history,
            FittedModel::Ets(fit) => &fit.history,
        }
    }
}

/// Fitted models for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSeries {
    pub unique_id: String,
    pub last_period: NaiveDate,
    pub n_obs: usize,
    /// One entry per model specification, in specification order
    pub fits: Vec<FittedModel>,
}

/// One interval bound pair
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub level: u8,
    pub lower: f64,
    pub upper: f64,
}

/// One forecast row for one series, period and model
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub unique_id: String,
    pub ds: NaiveDate,
    pub model: String,
    pub point: f64,
    pub intervals: Vec<Interval>,
}

/// All forecasts from one `predict` call
#[derive(Debug, Clone, PartialEq)]
pub struct Forecasts {
    pub models: Vec<String>,
    pub levels: Vec<u8>,
    /// Ordered by series, then period, then model
    pub points: Vec<ForecastPoint>,
}

impl Forecasts {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rows for one series
    pub fn for_series<'a>(&'a self, unique_id: &'a str) -> impl Iterator<Item = &'a ForecastPoint> + 'a {
        self.points.iter().filter(move |p| p.unique_id == unique_id)
    }

    /// Wide table: `unique_id, ds`, then per model `<model>`,
    /// `<model>-lo-<level>` and `<model>-hi-<level>` for each level
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let first_model = self.models.first().map(String::as_str);
        let keys: Vec<&ForecastPoint> = self
            .points
            .iter()
            .filter(|p| Some(p.model.as_str()) == first_model)
            .collect();

        let mut columns = vec![
            Series::new("unique_id", keys.iter().map(|p| p.unique_id.as_str()).collect::<Vec<_>>()),
            Series::new(
                "ds",
                keys.iter()
                    .map(|p| crate::utils::date_parser::to_epoch_days(p.ds))
                    .collect::<Vec<_>>(),
            )
            .cast(&DataType::Date)?,
        ];

        for model in &self.models {
            let rows: Vec<&ForecastPoint> = self.points.iter().filter(|p| &p.model == model).collect();
            columns.push(Series::new(model, rows.iter().map(|p| p.point).collect::<Vec<_>>()));
            for (index, level) in self.levels.iter().enumerate() {
                let lower: Vec<f64> = rows.iter().map(|p| p.intervals[index].lower).collect();
                let upper: Vec<f64> = rows.iter().map(|p| p.intervals[index].upper).collect();
                columns.push(Series::new(&format!("{}-lo-{}", model, level), lower));
                columns.push(Series::new(&format!("{}-hi-{}", model, level), upper));
            }
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Per-series in-sample summary for logs and reports
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub unique_id: String,
    pub model: String,
    pub description: String,
    pub accuracy: Option<ForecastAccuracy>,
}

/// Multi-series forecaster
#[derive(Debug, Clone, PartialEq)]
pub struct StatsForecaster {
    models: Vec<ModelSpec>,
    freq: Frequency,
    n_jobs: usize,
    fitted: Vec<FittedSeries>,
}

impl StatsForecaster {
    pub fn new(models: Vec<ModelSpec>, freq: Frequency, n_jobs: usize) -> Result<Self> {
        if models.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one model is required".to_string(),
            ));
        }
        if n_jobs == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        let mut names = HashSet::new();
        if let Some(duplicate) = models.iter().find(|m| !names.insert(m.name().to_string())) {
            return Err(ForecastError::InvalidParameter(format!(
                "Model {} is specified more than once",
                duplicate.name()
            )));
        }
        Ok(Self {
            models,
            freq,
            n_jobs,
            fitted: Vec::new(),
        })
    }

    /// Rebuild a fitted forecaster from persisted parts
    pub(crate) fn from_parts(
        models: Vec<ModelSpec>,
        freq: Frequency,
        n_jobs: usize,
        fitted: Vec<FittedSeries>,
    ) -> Result<Self> {
        let mut forecaster = Self::new(models, freq, n_jobs)?;
        if let Some(bad) = fitted.iter().find(|s| s.fits.len() != forecaster.models.len()) {
            return Err(ForecastError::CheckpointError(format!(
                "Series '{}' has {} fitted models, expected {}",
                bad.unique_id,
                bad.fits.len(),
                forecaster.models.len()
            )));
        }
        forecaster.fitted = fitted;
        Ok(forecaster)
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    pub fn n_jobs(&self) -> usize {
        self.n_jobs
    }

    pub fn fitted(&self) -> &[FittedSeries] {
        &self.fitted
    }

    pub fn is_fitted(&self) -> bool {
        !self.fitted.is_empty()
    }

    fn validate(&self, series: &[MonthlySeries]) -> Result<()> {
        if series.is_empty() {
            return Err(ForecastError::FitError("No series to fit".to_string()));
        }
        let mut seen = HashSet::new();
        for s in series {
            if !seen.insert(s.unique_id.as_str()) {
                return Err(ForecastError::FitError(format!(
                    "Series '{}' appears more than once",
                    s.unique_id
                )));
            }
            if s.is_empty() || s.periods.len() != s.values.len() {
                return Err(ForecastError::FitError(format!(
                    "Series '{}' is empty or misaligned",
                    s.unique_id
                )));
            }
            if let Some(bad) = s.periods.iter().find(|p| !is_month_start(**p)) {
                return Err(ForecastError::FitError(format!(
                    "Series '{}' has period {} which is not a month start",
                    s.unique_id, bad
                )));
            }
            for pair in s.periods.windows(2) {
                if self.freq.periods_between(pair[0], pair[1]) != 1 {
                    return Err(ForecastError::FitError(format!(
                        "Series '{}' is not regular between {} and {}; fill gaps before fitting",
                        s.unique_id, pair[0], pair[1]
                    )));
                }
            }
            if let Some(position) = s.values.iter().position(|v| !v.map_or(false, f64::is_finite)) {
                return Err(ForecastError::FitError(format!(
                    "Series '{}' has a missing value at {}; fill gaps with zeros before fitting",
                    s.unique_id, s.periods[position]
                )));
            }
        }
        Ok(())
    }

    fn fit_one(&self, series: &MonthlySeries) -> Result<FittedSeries> {
        let values: Vec<f64> = series.values.iter().map(|v| v.unwrap_or(0.0)).collect();
        let fits = self
            .models
            .iter()
            .map(|model| {
                model.fit(&values).map_err(|e| {
                    ForecastError::FitError(format!(
                        "{} on series '{}': {}",
                        model.name(),
                        series.unique_id,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        for (model, fit) in self.models.iter().zip(&fits) {
            debug!(unique_id = %series.unique_id, model = model.name(), fit = %fit.describe(), "Fitted series");
        }
        let last_period = series.last_period().ok_or_else(|| {
            ForecastError::FitError(format!("Series '{}' is empty", series.unique_id))
        })?;
        Ok(FittedSeries {
            unique_id: series.unique_id.clone(),
            last_period,
            n_obs: series.len(),
            fits,
        })
    }

    /// Fit every model on every series, replacing any previous fit.
    ///
    /// Series must be regular and fully observed. The first failing series
    /// aborts the fit and leaves the previous state untouched.
    pub fn fit(&mut self, series: &[MonthlySeries]) -> Result<&mut Self> {
        self.validate(series)?;

        let fitted = if self.n_jobs > 1 && series.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.n_jobs)
                .build()
                .map_err(|e| ForecastError::FitError(format!("Cannot start worker pool: {}", e)))?;
            pool.install(|| {
                series
                    .par_iter()
                    .map(|s| self.fit_one(s))
                    .collect::<Result<Vec<_>>>()
            })?
        } else {
            series
                .iter()
                .map(|s| self.fit_one(s))
                .collect::<Result<Vec<_>>>()?
        };

        info!(
            series = fitted.len(),
            models = self.models.len(),
            n_jobs = self.n_jobs,
            "Fitted forecaster"
        );
        self.fitted = fitted;
        Ok(self)
    }

    /// Forecast `horizon` periods past each series' last period
    pub fn predict(&self, horizon: usize, levels: &[u8]) -> Result<Forecasts> {
        if !self.is_fitted() {
            return Err(ForecastError::FitRequired);
        }
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be at least 1".to_string(),
            ));
        }
        validate_levels(levels)?;
        let mut levels = levels.to_vec();
        levels.sort_unstable();
        levels.dedup();

        let mut points = Vec::with_capacity(self.fitted.len() * horizon * self.models.len());
        for series in &self.fitted {
            let dates = future_months(series.last_period, horizon)?;
            let results = series
                .fits
                .iter()
                .map(|fit| fit.forecast(horizon, &levels))
                .collect::<Result<Vec<_>>>()?;
            for (step, ds) in dates.iter().enumerate() {
                for (model, result) in self.models.iter().zip(&results) {
                    points.push(ForecastPoint {
                        unique_id: series.unique_id.clone(),
                        ds: *ds,
                        model: model.name().to_string(),
                        point: result.values[step],
                        intervals: result
                            .intervals
                            .iter()
                            .map(|interval| Interval {
                                level: interval.level,
                                lower: interval.lower[step],
                                upper: interval.upper[step],
                            })
                            .collect(),
                    });
                }
            }
        }

        info!(
            series = self.fitted.len(),
            horizon,
            rows = points.len(),
            "Generated forecasts"
        );
        Ok(Forecasts {
            models: self.models.iter().map(|m| m.name().to_string()).collect(),
            levels,
            points,
        })
    }

    /// In-sample description and accuracy of every fitted model
    pub fn fitted_summary(&self) -> Vec<FitSummary> {
        let mut summaries = Vec::new();
        for series in &self.fitted {
            for (model, fit) in self.models.iter().zip(&series.fits) {
                let accuracy = forecast_accuracy(&fit.fitted_values(), fit.history()).ok();
                summaries.push(FitSummary {
                    unique_id: series.unique_id.clone(),
                    model: model.name().to_string(),
                    description: fit.describe(),
                    accuracy,
                });
            }
        }
        summaries
    }

    /// Write the fitted state to a versioned checkpoint
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::checkpoint::save(self, path)
    }

    /// Restore a forecaster written by [`StatsForecaster::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        crate::checkpoint::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn test_duplicate_models_rejected() {
        let result = StatsForecaster::new(
            vec![ModelSpec::auto_arima(12), ModelSpec::auto_arima(4)],
            Frequency::MonthStart,
            1,
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }

    #[test]
    fn test_gappy_series_rejected() {
        let mut sf =
            StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1).unwrap();
        let series =
            MonthlySeries::observed("Trail", vec![ymd(2020, 1), ymd(2020, 3)], vec![1.0, 2.0]).unwrap();
        let err = sf.fit(&[series]).unwrap_err();
        assert!(err.to_string().contains("fill gaps"));
        assert!(!sf.is_fitted());
    }

    #[test]
    fn test_null_value_rejected() {
        let mut sf = StatsForecaster::new(vec![ModelSpec::ets(12)], Frequency::MonthStart, 1).unwrap();
        let series = MonthlySeries::new("Trail", vec![ymd(2020, 1), ymd(2020, 2)], vec![Some(1.0), None])
            .unwrap();
        assert!(matches!(sf.fit(&[series]), Err(ForecastError::FitError(_))));
    }

    #[test]
    fn test_dataframe_columns() {
        let mut sf = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1)
            .unwrap();
        let series = MonthlySeries::observed(
            "Mountain",
            vec![ymd(2020, 1), ymd(2020, 2), ymd(2020, 3)],
            vec![100.0, 150.0, 200.0],
        )
        .unwrap();
        sf.fit(&[series]).unwrap();
        let df = sf.predict(2, &[95, 80]).unwrap().to_dataframe().unwrap();
        assert_eq!(
            df.get_column_names(),
            vec![
                "unique_id",
                "ds",
                "AutoARIMA",
                "AutoARIMA-lo-80",
                "AutoARIMA-hi-80",
                "AutoARIMA-lo-95",
                "AutoARIMA-hi-95"
            ]
        );
        assert_eq!(df.height(), 2);
    }
}
