//! Stationarity diagnostics used to choose differencing orders

use crate::differencing::{difference, seasonal_difference};
use crate::stats::{mean, variance};

/// 5% critical value of the KPSS level-stationarity test
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Seasonal strength above which one seasonal difference is taken
pub const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// KPSS level-stationarity statistic.
///
/// Uses a Bartlett-weighted long-run variance with `lags` lags, defaulting
/// to `floor(3 sqrt(n) / 13)`. Returns `None` when the series is too short
/// or has no variation, in which case it is treated as stationary.
pub fn kpss_statistic(series: &[f64], lags: Option<usize>) -> Option<f64> {
    let n = series.len();
    if n < 3 {
        return None;
    }

    let lags = lags
        .unwrap_or_else(|| (3.0 * (n as f64).sqrt() / 13.0).floor() as usize)
        .min(n - 1);

    let m = mean(series);
    let residuals: Vec<f64> = series.iter().map(|x| x - m).collect();

    let mut partial = 0.0;
    let mut numerator = 0.0;
    for r in &residuals {
        partial += r;
        numerator += partial * partial;
    }
    numerator /= (n * n) as f64;

    let mut long_run = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
    for j in 1..=lags {
        let weight = 1.0 - j as f64 / (lags + 1) as f64;
        let autocovariance = residuals
            .iter()
            .skip(j)
            .zip(residuals.iter())
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        long_run += 2.0 * weight * autocovariance;
    }

    if long_run <= f64::EPSILON * (1.0 + m.abs()) {
        return None;
    }

    Some(numerator / long_run)
}

/// Number of first differences needed for KPSS level stationarity.
pub fn ndiffs(series: &[f64], max_d: usize) -> usize {
    let mut d = 0;
    let mut current = series.to_vec();

    while d < max_d {
        match kpss_statistic(&current, None) {
            Some(stat) if stat > KPSS_CRITICAL_5PCT => {
                current = difference(&current, 1);
                d += 1;
                if current.len() < 3 {
                    break;
                }
            }
            _ => break,
        }
    }

    d
}

/// Strength of seasonality in `[0, 1]` from a classical decomposition.
///
/// Computed as `max(0, 1 - Var(remainder) / Var(season + remainder))`
/// over the span where the centred moving-average trend is defined.
pub fn seasonal_strength(series: &[f64], period: usize) -> f64 {
    let n = series.len();
    if period < 2 || n < 2 * period {
        return 0.0;
    }

    let half = period / 2;
    let mut detrended: Vec<(usize, f64)> = Vec::with_capacity(n);
    for t in half..n - half {
        let trend = if period % 2 == 0 {
            if t + half >= n {
                continue;
            }
            let inner: f64 = series[t + 1 - half..t + half].iter().sum();
            (0.5 * series[t - half] + inner + 0.5 * series[t + half]) / period as f64
        } else {
            series[t - half..=t + half].iter().sum::<f64>() / period as f64
        };
        detrended.push((t, series[t] - trend));
    }

    if detrended.len() < period {
        return 0.0;
    }

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (t, value) in &detrended {
        sums[t % period] += value;
        counts[t % period] += 1;
    }
    let mut indices: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect();
    let centre = mean(&indices);
    for index in indices.iter_mut() {
        *index -= centre;
    }

    let season_plus_remainder: Vec<f64> = detrended.iter().map(|(_, v)| *v).collect();
    let remainder: Vec<f64> = detrended
        .iter()
        .map(|(t, v)| v - indices[t % period])
        .collect();

    let total = variance(&season_plus_remainder);
    if total <= 1e-12 * (1.0 + variance(series)) {
        return 0.0;
    }

    (1.0 - variance(&remainder) / total).max(0.0)
}

/// Number of seasonal differences (0 or 1, capped by `max_cap_d`).
pub fn nsdiffs(series: &[f64], period: usize, max_cap_d: usize) -> usize {
    if max_cap_d == 0 || period < 2 || series.len() < 2 * period {
        return 0;
    }
    if seasonal_strength(series, period) > SEASONAL_STRENGTH_THRESHOLD {
        let differenced = seasonal_difference(series, 1, period);
        if !differenced.is_empty() {
            return 1;
        }
    }
    0
}
