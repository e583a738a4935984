//! Utility functions for the sales_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};

/// Split a series into training and hold-out parts.
///
/// `test_size` values are taken from the end. A hold-out that would leave
/// nothing to train on returns the whole series as training data.
pub fn train_test_split(data: &[f64], test_size: usize) -> (Vec<f64>, Vec<f64>) {
    if test_size == 0 || test_size >= data.len() {
        return (data.to_vec(), Vec::new());
    }
    let train_size = data.len() - test_size;
    (data[..train_size].to_vec(), data[train_size..].to_vec())
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Whether `date` is the first day of its month
pub fn is_month_start(date: NaiveDate) -> bool {
    date.day() == 1
}

/// Shift `date` forward by `months` calendar months
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        ForecastError::InvalidParameter(format!("Cannot add {} months to {}", months, date))
    })
}

/// Signed number of calendar months from `from` to `to`
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// The `horizon` month starts strictly after `last`
pub fn future_months(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    let start = month_start(last);
    (1..=horizon)
        .map(|step| {
            let step = u32::try_from(step).map_err(|_| {
                ForecastError::InvalidParameter(format!("Horizon {} is too large", horizon))
            })?;
            add_months(start, step)
        })
        .collect()
}

/// Date parsing utilities
pub mod date_parser {
    use super::*;
    use chrono::NaiveDateTime;

    /// Date-only formats accepted for order dates
    pub const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

    /// Timestamp formats accepted for order dates; the time part is dropped
    pub const DATETIME_FORMATS: [&str; 3] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];

    /// Parse an order date in any of the supported formats
    pub fn parse_date(value: &str) -> Result<NaiveDate> {
        let trimmed = value.trim();
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Ok(date);
            }
        }
        for format in DATETIME_FORMATS {
            if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(timestamp.date());
            }
        }
        Err(ForecastError::ParseError(format!(
            "Unrecognised date '{}'",
            value
        )))
    }

    /// Days since the Unix epoch, the physical value of a polars `Date`
    pub fn to_epoch_days(date: NaiveDate) -> i32 {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
        (date - epoch).num_days() as i32
    }
}
