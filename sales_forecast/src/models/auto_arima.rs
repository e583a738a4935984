//! Automatic seasonal ARIMA order selection
//!
//! Differencing orders come from unit-root style tests: `D` from the
//! seasonal strength of the series and `d` from repeated KPSS tests on the
//! seasonally differenced series. The ARMA orders are then chosen by AICc,
//! either with the stepwise neighbourhood search or exhaustively.

use crate::error::Result;
use crate::models::arima::{Sarima, SarimaFit, SarimaOrder};
use crate::models::{require_finite, ForecastModel};
use sales_math::seasonal_difference;
use sales_math::stationarity::{ndiffs, nsdiffs};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Upper bound on the number of orders fitted by one stepwise search
const MAX_STEPWISE_FITS: usize = 94;

/// AutoARIMA specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoArima {
    /// Observations per seasonal cycle; 1 disables seasonal terms
    pub season_length: usize,
    pub max_p: usize,
    pub max_q: usize,
    #[serde(rename = "max_P")]
    pub max_cap_p: usize,
    #[serde(rename = "max_Q")]
    pub max_cap_q: usize,
    pub max_d: usize,
    #[serde(rename = "max_D")]
    pub max_cap_d: usize,
    /// Stepwise neighbourhood search instead of the full grid
    pub stepwise: bool,
}

impl Default for AutoArima {
    fn default() -> Self {
        Self::new(1)
    }
}

impl AutoArima {
    pub fn new(season_length: usize) -> Self {
        Self {
            season_length: season_length.max(1),
            max_p: 5,
            max_q: 5,
            max_cap_p: 2,
            max_cap_q: 2,
            max_d: 2,
            max_cap_d: 1,
            stepwise: true,
        }
    }

    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    pub fn with_seasonal_orders(mut self, max_cap_p: usize, max_cap_d: usize, max_cap_q: usize) -> Self {
        self.max_cap_p = max_cap_p;
        self.max_cap_d = max_cap_d;
        self.max_cap_q = max_cap_q;
        self
    }

    /// Search every order within the limits
    pub fn exhaustive(mut self) -> Self {
        self.stepwise = false;
        self
    }

    fn is_seasonal(&self) -> bool {
        self.season_length > 1
    }

    /// `(d, D)` for `data`, reduced until at least one differenced value remains
    pub fn select_differencing(&self, data: &[f64]) -> (usize, usize) {
        let n = data.len();
        let m = self.season_length;
        let mut cap_d = if self.is_seasonal() && n >= 2 * m {
            nsdiffs(data, m, self.max_cap_d)
        } else {
            0
        };
        let seasonally_differenced = seasonal_difference(data, cap_d, m);
        let mut d = ndiffs(&seasonally_differenced, self.max_d);

        while d + cap_d * m >= n {
            if d > 0 {
                d -= 1;
            } else if cap_d > 0 {
                cap_d -= 1;
            } else {
                break;
            }
        }
        (d, cap_d)
    }

    fn order(&self, p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize) -> SarimaOrder {
        let s = if self.is_seasonal() { self.season_length } else { 0 };
        SarimaOrder::new(p, d, q, cap_p, cap_d, cap_q, s)
    }

    fn stepwise_search(&self, search: &mut Search<'_>, d: usize, cap_d: usize, seasonal_terms: bool) {
        let seasonal = |value: usize| if seasonal_terms { value } else { 0 };
        let starts = [
            (2, 2, seasonal(1), seasonal(1)),
            (0, 0, 0, 0),
            (1, 0, seasonal(1), 0),
            (0, 1, 0, seasonal(1)),
        ];
        for (p, q, cap_p, cap_q) in starts {
            search.consider(self.order(p, d, q, cap_p, cap_d, cap_q));
        }

        while search.fits < MAX_STEPWISE_FITS {
            let Some(current) = search.best.as_ref().map(|fit| fit.order) else {
                break;
            };
            let mut improved = false;
            for neighbour in neighbours(current, seasonal_terms) {
                if search.fits >= MAX_STEPWISE_FITS {
                    break;
                }
                improved |= search.consider(neighbour);
            }
            if !improved {
                break;
            }
        }
    }

    fn exhaustive_search(&self, search: &mut Search<'_>, d: usize, cap_d: usize, seasonal_terms: bool) {
        let (max_cap_p, max_cap_q) = if seasonal_terms {
            (self.max_cap_p, self.max_cap_q)
        } else {
            (0, 0)
        };
        for p in 0..=self.max_p {
            for q in 0..=self.max_q {
                for cap_p in 0..=max_cap_p {
                    for cap_q in 0..=max_cap_q {
                        search.consider(self.order(p, d, q, cap_p, cap_d, cap_q));
                    }
                }
            }
        }
    }
}

/// Orders one step away from `order` in the stepwise search
fn neighbours(order: SarimaOrder, seasonal_terms: bool) -> Vec<SarimaOrder> {
    let step = |value: usize, delta: i64| -> Option<usize> {
        let shifted = value as i64 + delta;
        (shifted >= 0).then_some(shifted as usize)
    };
    let mut moves: Vec<(i64, i64, i64, i64)> = vec![
        (-1, 0, 0, 0),
        (1, 0, 0, 0),
        (0, -1, 0, 0),
        (0, 1, 0, 0),
        (-1, -1, 0, 0),
        (1, 1, 0, 0),
    ];
    if seasonal_terms {
        moves.extend([
            (0, 0, -1, 0),
            (0, 0, 1, 0),
            (0, 0, 0, -1),
            (0, 0, 0, 1),
            (0, 0, -1, -1),
            (0, 0, 1, 1),
        ]);
    }
    moves
        .into_iter()
        .filter_map(|(dp, dq, dcp, dcq)| {
            Some(SarimaOrder {
                p: step(order.p, dp)?,
                q: step(order.q, dq)?,
                cap_p: step(order.cap_p, dcp)?,
                cap_q: step(order.cap_q, dcq)?,
                ..order
            })
        })
        .collect()
}

/// State of one order search over a single series
struct Search<'a> {
    spec: &'a AutoArima,
    data: &'a [f64],
    visited: HashSet<SarimaOrder>,
    best: Option<SarimaFit>,
    fits: usize,
}

impl<'a> Search<'a> {
    fn new(spec: &'a AutoArima, data: &'a [f64]) -> Self {
        Self {
            spec,
            data,
            visited: HashSet::new(),
            best: None,
            fits: 0,
        }
    }

    fn within_limits(&self, order: &SarimaOrder) -> bool {
        order.p <= self.spec.max_p
            && order.q <= self.spec.max_q
            && order.cap_p <= self.spec.max_cap_p
            && order.cap_q <= self.spec.max_cap_q
            && self.data.len() >= order.min_observations()
    }

    /// Fit `order` if it is new; returns whether it became the best fit
    fn consider(&mut self, order: SarimaOrder) -> bool {
        if !self.within_limits(&order) || !self.visited.insert(order) {
            return false;
        }
        self.fits += 1;
        let fit = match Sarima::new(order).train(self.data) {
            Ok(fit) => fit,
            Err(e) => {
                debug!(%order, error = %e, "Candidate order failed");
                return false;
            }
        };
        let Some(score) = fit.criterion() else {
            return false;
        };
        let better = match self.best.as_ref().and_then(SarimaFit::criterion) {
            Some(best) => score < best,
            None => true,
        };
        if better {
            self.best = Some(fit);
        }
        better
    }
}

impl ForecastModel for AutoArima {
    type Trained = SarimaFit;

    fn train(&self, data: &[f64]) -> Result<SarimaFit> {
        require_finite(data)?;
        let (d, cap_d) = self.select_differencing(data);
        let remaining = data.len() - (d + cap_d * self.season_length);
        let seasonal_terms = self.is_seasonal() && remaining >= 2 * self.season_length;

        let mut search = Search::new(self, data);
        if self.stepwise {
            self.stepwise_search(&mut search, d, cap_d, seasonal_terms);
        } else {
            self.exhaustive_search(&mut search, d, cap_d, seasonal_terms);
        }
        let fitted = search.fits;

        match search.best {
            Some(fit) => {
                debug!(order = %fit.order, fitted, aicc = ?fit.aicc, "Selected order");
                Ok(fit)
            }
            None => {
                let fallback = self.order(0, d, 0, 0, cap_d, 0);
                debug!(order = %fallback, fitted, "No candidate with a finite AICc, using mean model");
                Sarima::new(fallback).train(data)
            }
        }
    }

    fn name(&self) -> &str {
        "AutoARIMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::models::TrainedForecastModel;

    fn seasonal_series(years: usize) -> Vec<f64> {
        (0..years * 12)
            .map(|t| {
                let season = (2.0 * std::f64::consts::PI * (t % 12) as f64 / 12.0).sin();
                1000.0 + 5.0 * t as f64 + 200.0 * season + ((t * 7919) % 13) as f64
            })
            .collect()
    }

    #[test]
    fn test_three_points_fall_back_to_mean() {
        let fit = AutoArima::new(12).train(&[100.0, 150.0, 200.0]).unwrap();
        assert_eq!(fit.order.p + fit.order.q + fit.order.cap_p + fit.order.cap_q, 0);
        let forecast = fit.forecast(1, &[80, 95]).unwrap();
        assert_eq!(forecast.values.len(), 1);
        assert!(forecast.values[0].is_finite());
    }

    #[test]
    fn test_single_observation() {
        let fit = AutoArima::new(12).train(&[42.0]).unwrap();
        let forecast = fit.forecast(3, &[95]).unwrap();
        assert_eq!(forecast.values, vec![42.0, 42.0, 42.0]);
        assert_eq!(forecast.intervals[0].lower, forecast.values);
    }

    #[test]
    fn test_empty_series_is_fit_error() {
        assert!(matches!(
            AutoArima::new(12).train(&[]),
            Err(ForecastError::FitError(_))
        ));
    }

    #[test]
    fn test_seasonal_series_selects_a_model() {
        let data = seasonal_series(5);
        let fit = AutoArima::new(12).train(&data).unwrap();
        assert!(fit.aicc.is_some());
        let forecast = fit.forecast(12, &[80, 95]).unwrap();
        assert_eq!(forecast.values.len(), 12);
        for interval in &forecast.intervals {
            for (i, value) in forecast.values.iter().enumerate() {
                assert!(interval.lower[i] <= *value && *value <= interval.upper[i]);
            }
        }
    }

    #[test]
    fn test_neighbours_stay_non_negative() {
        let all = neighbours(SarimaOrder::new(0, 1, 0, 0, 0, 0, 12), true);
        assert!(all.iter().all(|o| o.d == 1 && o.s == 12));
        assert!(all.contains(&SarimaOrder::new(1, 1, 0, 0, 0, 0, 12)));
        assert!(!all.is_empty());
    }

    #[test]
    fn test_exhaustive_matches_limits() {
        let model = AutoArima::new(1).with_max_orders(1, 1, 1).exhaustive();
        let data: Vec<f64> = (0..30).map(|t| (t as f64 * 0.9).cos() * 10.0 + 50.0).collect();
        let fit = model.train(&data).unwrap();
        assert!(fit.order.p <= 1 && fit.order.q <= 1);
    }
}
