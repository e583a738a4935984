//! Tabular exports of the aggregated series and forecasts

use crate::aggregate::MonthlySeries;
use crate::error::Result;
use crate::forecaster::Forecasts;
use crate::utils::date_parser::to_epoch_days;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

/// Label of observed rows in [`forecast_plot_frame`]
pub const ACTUAL: &str = "actual";

/// Write `df` as CSV with a header row, creating parent directories
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).has_header(true).finish(df)?;
    info!(path = %path.display(), rows = df.height(), "Wrote CSV");
    Ok(())
}

/// Long table of history and forecast bands, one row per series, period
/// and source: `unique_id, ds, source, value, lo-<l>, hi-<l>`.
///
/// Observed rows have source [`ACTUAL`] and null bounds.
pub fn forecast_plot_frame(history: &[MonthlySeries], forecasts: &Forecasts) -> Result<DataFrame> {
    let mut ids: Vec<&str> = Vec::new();
    let mut dates: Vec<i32> = Vec::new();
    let mut sources: Vec<&str> = Vec::new();
    let mut values: Vec<Option<f64>> = Vec::new();
    let mut lower: Vec<Vec<Option<f64>>> = vec![Vec::new(); forecasts.levels.len()];
    let mut upper: Vec<Vec<Option<f64>>> = vec![Vec::new(); forecasts.levels.len()];

    for series in history {
        for (period, value) in series.periods.iter().zip(&series.values) {
            ids.push(&series.unique_id);
            dates.push(to_epoch_days(*period));
            sources.push(ACTUAL);
            values.push(*value);
            for (lo, hi) in lower.iter_mut().zip(upper.iter_mut()) {
                lo.push(None);
                hi.push(None);
            }
        }
    }

    for point in &forecasts.points {
        ids.push(&point.unique_id);
        dates.push(to_epoch_days(point.ds));
        sources.push(&point.model);
        values.push(Some(point.point));
        for (index, interval) in point.intervals.iter().enumerate() {
            lower[index].push(Some(interval.lower));
            upper[index].push(Some(interval.upper));
        }
    }

    let mut columns = vec![
        Series::new("unique_id", ids),
        Series::new("ds", dates).cast(&DataType::Date)?,
        Series::new("source", sources),
        Series::new("value", values),
    ];
    for (index, level) in forecasts.levels.iter().enumerate() {
        columns.push(Series::new(&format!("lo-{}", level), std::mem::take(&mut lower[index])));
        columns.push(Series::new(&format!("hi-{}", level), std::mem::take(&mut upper[index])));
    }
    Ok(DataFrame::new(columns)?)
}
