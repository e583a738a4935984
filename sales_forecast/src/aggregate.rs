//! Monthly aggregation of cleaned sales records

use crate::error::{ForecastError, Result};
use crate::utils::date_parser::to_epoch_days;
use crate::utils::{add_months, month_start, months_between};
use crate::wrangle::SalesRecord;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Calendar bucket used for aggregation and forecasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Frequency {
    /// Calendar months labelled by their first day
    #[default]
    #[serde(rename = "MS")]
    MonthStart,
}

impl Frequency {
    /// Bucket label for `date`
    pub fn period_of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::MonthStart => month_start(date),
        }
    }

    /// Period `steps` buckets after `period`
    pub fn advance(&self, period: NaiveDate, steps: u32) -> Result<NaiveDate> {
        match self {
            Frequency::MonthStart => add_months(period, steps),
        }
    }

    /// Number of buckets from `from` to `to`
    pub fn periods_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        match self {
            Frequency::MonthStart => months_between(from, to),
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            Frequency::MonthStart => "MS",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias())
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MS" | "month_start" | "monthly" => Ok(Frequency::MonthStart),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unsupported frequency: {}",
                other
            ))),
        }
    }
}

/// Aggregation applied to each bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    #[default]
    Sum,
    Mean,
    Count,
}

/// Categorical column to group on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupColumn {
    #[serde(rename = "category_1")]
    Category1,
    #[default]
    #[serde(rename = "category_2")]
    Category2,
    FrameMaterial,
    BikeshopName,
    State,
}

impl GroupColumn {
    pub fn name(&self) -> &'static str {
        match self {
            GroupColumn::Category1 => "category_1",
            GroupColumn::Category2 => "category_2",
            GroupColumn::FrameMaterial => "frame_material",
            GroupColumn::BikeshopName => "bikeshop_name",
            GroupColumn::State => "state",
        }
    }

    fn get<'a>(&self, record: &'a SalesRecord) -> Option<&'a str> {
        match self {
            GroupColumn::Category1 => record.category_1.as_deref(),
            GroupColumn::Category2 => record.category_2.as_deref(),
            GroupColumn::FrameMaterial => record.frame_material.as_deref(),
            GroupColumn::BikeshopName => record.bikeshop_name.as_deref(),
            GroupColumn::State => record.state.as_deref(),
        }
    }
}

/// Numeric column to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueColumn {
    #[default]
    TotalPrice,
    Quantity,
}

impl ValueColumn {
    pub fn name(&self) -> &'static str {
        match self {
            ValueColumn::TotalPrice => "total_price",
            ValueColumn::Quantity => "quantity",
        }
    }

    fn get(&self, record: &SalesRecord) -> Option<f64> {
        match self {
            ValueColumn::TotalPrice => record.total_price,
            ValueColumn::Quantity => Some(record.quantity as f64),
        }
    }
}

/// One (group, period) aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPoint {
    pub group: String,
    pub period: NaiveDate,
    /// `None` only for months inserted by [`GapFill::Null`]
    pub value: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

/// Aggregate `value` per (`group`, period).
///
/// Output holds one point per observed pair, sorted by group and then
/// period. Rows with a null group or value are skipped. Periods without rows
/// are absent.
pub fn summarize_by_time(
    records: &[SalesRecord],
    group: GroupColumn,
    value: ValueColumn,
    freq: Frequency,
    agg: AggFunc,
) -> Vec<MonthlyPoint> {
    let mut buckets: BTreeMap<(String, NaiveDate), Accumulator> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let (Some(key), Some(amount)) = (group.get(record), value.get(record)) else {
            skipped += 1;
            continue;
        };
        let bucket = buckets
            .entry((key.to_string(), freq.period_of(record.order_date)))
            .or_default();
        bucket.sum += amount;
        bucket.count += 1;
    }

    if skipped > 0 {
        debug!(
            skipped,
            group = group.name(),
            value = value.name(),
            "Skipped rows with null group or value"
        );
    }

    let points: Vec<MonthlyPoint> = buckets
        .into_iter()
        .map(|((group, period), acc)| {
            let value = match agg {
                AggFunc::Sum => acc.sum,
                AggFunc::Mean => acc.sum / acc.count as f64,
                AggFunc::Count => acc.count as f64,
            };
            MonthlyPoint {
                group,
                period,
                value: Some(value),
            }
        })
        .collect();

    info!(
        points = points.len(),
        groups = points
            .iter()
            .map(|p| p.group.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len(),
        freq = %freq,
        "Summarized by time"
    );
    points
}

/// Completion of missing periods between a group's first and last period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapFill {
    /// Leave missing periods absent
    #[default]
    None,
    /// Insert missing periods with value zero
    Zero,
    /// Insert missing periods with a null value
    Null,
}

/// Insert the missing periods of each group according to `fill`.
///
/// `points` must be sorted by group and period, as produced by
/// [`summarize_by_time`].
pub fn fill_gaps(points: &[MonthlyPoint], freq: Frequency, fill: GapFill) -> Result<Vec<MonthlyPoint>> {
    if fill == GapFill::None {
        return Ok(points.to_vec());
    }
    let filler = match fill {
        GapFill::Zero => Some(0.0),
        _ => None,
    };

    let mut out = Vec::with_capacity(points.len());
    let mut inserted = 0usize;
    for (i, point) in points.iter().enumerate() {
        if let Some(previous) = i.checked_sub(1).map(|j| &points[j]) {
            if previous.group == point.group {
                let step = freq.periods_between(previous.period, point.period);
                for k in 1..step {
                    out.push(MonthlyPoint {
                        group: point.group.clone(),
                        period: freq.advance(previous.period, k as u32)?,
                        value: filler,
                    });
                    inserted += 1;
                }
            }
        }
        out.push(point.clone());
    }
    debug!(inserted, ?fill, "Filled gaps");
    Ok(out)
}

/// One regular series handed to the forecaster
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    pub unique_id: String,
    pub periods: Vec<NaiveDate>,
    pub values: Vec<Option<f64>>,
}

impl MonthlySeries {
    pub fn new(
        unique_id: impl Into<String>,
        periods: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        if periods.len() != values.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Series has {} periods but {} values",
                periods.len(),
                values.len()
            )));
        }
        Ok(Self {
            unique_id: unique_id.into(),
            periods,
            values,
        })
    }

    /// Convenience constructor for a fully observed series
    pub fn observed(unique_id: impl Into<String>, periods: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        Self::new(unique_id, periods, values.into_iter().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.periods.last().copied()
    }
}

/// Group sorted points into one series per group
pub fn series_from_points(points: &[MonthlyPoint]) -> Vec<MonthlySeries> {
    let mut out: Vec<MonthlySeries> = Vec::new();
    for point in points {
        match out.last_mut() {
            Some(series) if series.unique_id == point.group => {
                series.periods.push(point.period);
                series.values.push(point.value);
            }
            _ => out.push(MonthlySeries {
                unique_id: point.group.clone(),
                periods: vec![point.period],
                values: vec![point.value],
            }),
        }
    }
    out
}

/// Aggregates as a `(group, order_date, value)` dataframe
pub fn monthly_to_dataframe(
    points: &[MonthlyPoint],
    group: GroupColumn,
    value: ValueColumn,
) -> Result<DataFrame> {
    let groups: Vec<&str> = points.iter().map(|p| p.group.as_str()).collect();
    let dates: Vec<i32> = points.iter().map(|p| to_epoch_days(p.period)).collect();
    let values: Vec<Option<f64>> = points.iter().map(|p| p.value).collect();
    let df = DataFrame::new(vec![
        Series::new(group.name(), groups),
        Series::new("order_date", dates).cast(&DataType::Date)?,
        Series::new(value.name(), values),
    ])?;
    Ok(df)
}
