//! Seasonal ARIMA with a fixed order
//!
//! The model `phi(B) Phi(B^s) (1-B)^d (1-B^s)^D y_t = c + theta(B) Theta(B^s) e_t`
//! is estimated by conditional sum of squares on the differenced series.
//! Forecasts are built by running the expanded recursion forward on the
//! original scale, and interval widths come from the psi-weights of the
//! complete model, so differencing widens them as the horizon grows.

use crate::error::{ForecastError, Result};
use crate::models::{normal_intervals, require_finite, validate_levels};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use sales_math::stats::{mean, variance};
use sales_math::{nelder_mead, LagPolynomial, NelderMeadConfig};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Largest absolute coefficient sum allowed per lag polynomial
const COEFFICIENT_LIMIT: f64 = 0.99;
/// Lower bound on the innovation variance when computing likelihoods
const MIN_SIGMA2: f64 = 1e-10;

/// `(p, d, q)(P, D, Q)[s]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    #[serde(rename = "P")]
    pub cap_p: usize,
    #[serde(rename = "D")]
    pub cap_d: usize,
    #[serde(rename = "Q")]
    pub cap_q: usize,
    pub s: usize,
}

impl SarimaOrder {
    pub fn new(p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize, s: usize) -> Self {
        Self {
            p,
            d,
            q,
            cap_p,
            cap_d,
            cap_q,
            s,
        }
    }

    /// ARIMA(p, d, q) without seasonal terms
    pub fn non_seasonal(p: usize, d: usize, q: usize) -> Self {
        Self::new(p, d, q, 0, 0, 0, 0)
    }

    pub fn is_seasonal(&self) -> bool {
        self.s > 1 && self.cap_p + self.cap_d + self.cap_q > 0
    }

    /// A mean is estimated for the differenced series when at most one
    /// difference is taken; after one difference it acts as a drift
    pub fn include_mean(&self) -> bool {
        self.d + self.seasonal_d() <= 1
    }

    /// Number of estimated mean and ARMA coefficients
    pub fn num_params(&self) -> usize {
        self.p + self.q + self.seasonal_p() + self.seasonal_q() + usize::from(self.include_mean())
    }

    /// Observations consumed by differencing
    pub fn differencing_lag(&self) -> usize {
        self.d + self.seasonal_d() * self.s
    }

    /// Observations consumed by the autoregressive part
    pub fn ar_lag(&self) -> usize {
        self.p + self.seasonal_p() * self.s
    }

    fn seasonal_p(&self) -> usize {
        if self.s > 1 { self.cap_p } else { 0 }
    }

    fn seasonal_d(&self) -> usize {
        if self.s > 1 { self.cap_d } else { 0 }
    }

    fn seasonal_q(&self) -> usize {
        if self.s > 1 { self.cap_q } else { 0 }
    }

    /// Minimum series length needed for a fit with at least one residual
    /// beyond the estimated parameters
    pub fn min_observations(&self) -> usize {
        self.differencing_lag() + self.ar_lag() + self.num_params() + 1
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(f, "({},{},{})[{}]", self.cap_p, self.cap_d, self.cap_q, self.s)?;
        }
        Ok(())
    }
}

/// SARIMA model with a fixed order
#[derive(Debug, Clone)]
pub struct Sarima {
    order: SarimaOrder,
    optimizer: NelderMeadConfig,
}

impl Sarima {
    pub fn new(order: SarimaOrder) -> Self {
        Self {
            order,
            optimizer: NelderMeadConfig::default(),
        }
    }

    pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn order(&self) -> SarimaOrder {
        self.order
    }
}

/// Coefficient vector layout: `[mean?, ar.., ma.., sar.., sma..]`
struct Layout {
    order: SarimaOrder,
}

struct Coefficients {
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    sar: Vec<f64>,
    sma: Vec<f64>,
}

impl Layout {
    fn unpack(&self, params: &[f64]) -> Coefficients {
        let o = &self.order;
        let mut offset = 0;
        let mut take = |n: usize| {
            let slice = params[offset..offset + n].to_vec();
            offset += n;
            slice
        };
        let intercept = if o.include_mean() { take(1)[0] } else { 0.0 };
        let ar = take(o.p);
        let ma = take(o.q);
        let sar = take(o.seasonal_p());
        let sma = take(o.seasonal_q());
        Coefficients {
            intercept,
            ar,
            ma,
            sar,
            sma,
        }
    }
}

impl Coefficients {
    fn ar_polynomial(&self, s: usize) -> LagPolynomial {
        LagPolynomial::autoregressive(&self.ar, 1).multiply(&LagPolynomial::autoregressive(&self.sar, s))
    }

    fn ma_polynomial(&self, s: usize) -> LagPolynomial {
        LagPolynomial::moving_average(&self.ma, 1).multiply(&LagPolynomial::moving_average(&self.sma, s))
    }

    fn within_limits(&self) -> bool {
        [&self.ar, &self.ma, &self.sar, &self.sma]
            .iter()
            .all(|c| c.iter().map(|v| v.abs()).sum::<f64>() < COEFFICIENT_LIMIT)
    }
}

/// Conditional residuals of the ARMA part on the differenced series.
///
/// The first `ar_degree` residuals are zero; they have no full lag window.
fn conditional_residuals(w: &[f64], intercept: f64, ar_poly: &LagPolynomial, ma_poly: &LagPolynomial) -> Vec<f64> {
    let ar_degree = ar_poly.degree();
    let ma_degree = ma_poly.degree();
    let mut residuals = vec![0.0; w.len()];
    for t in ar_degree..w.len() {
        let mut e = 0.0;
        for k in 0..=ar_degree {
            e += ar_poly.coefficient(k) * (w[t - k] - intercept);
        }
        for j in 1..=ma_degree.min(t) {
            e -= ma_poly.coefficient(j) * residuals[t - j];
        }
        residuals[t] = e;
    }
    residuals
}

/// Fitted SARIMA state; everything needed to forecast is stored here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaFit {
    pub order: SarimaOrder,
    pub intercept: f64,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub sar: Vec<f64>,
    pub sma: Vec<f64>,
    /// Innovation variance
    pub sigma2: f64,
    pub loglik: f64,
    pub aic: f64,
    pub bic: f64,
    /// Undefined when there are too few residuals for the correction
    pub aicc: Option<f64>,
    /// Number of residuals used in the criteria
    pub n_eff: usize,
    /// Observed series
    pub history: Vec<f64>,
    /// Innovations aligned with `history`, zero where no residual exists
    pub residuals: Vec<f64>,
}

impl ForecastModel for Sarima {
    type Trained = SarimaFit;

    fn train(&self, data: &[f64]) -> Result<SarimaFit> {
        require_finite(data)?;
        let order = self.order;
        if data.len() < order.differencing_lag() + order.ar_lag() + 1 {
            return Err(ForecastError::FitError(format!(
                "{} needs more than {} observations, got {}",
                order,
                order.differencing_lag() + order.ar_lag(),
                data.len()
            )));
        }

        let diff_poly = LagPolynomial::differencing(order.d, order.seasonal_d(), order.s);
        let w = diff_poly.apply(data);
        let layout = Layout { order };

        let mut initial = vec![0.0; order.num_params()];
        let mut bounds = vec![(-COEFFICIENT_LIMIT, COEFFICIENT_LIMIT); order.num_params()];
        if order.include_mean() {
            let centre = mean(&w);
            let spread = 10.0 * (variance(&w).sqrt() + centre.abs() + 1.0);
            initial[0] = centre;
            bounds[0] = (centre - spread, centre + spread);
        }

        let css = |params: &[f64]| {
            let c = layout.unpack(params);
            if !c.within_limits() {
                return f64::MAX;
            }
            let ar_poly = c.ar_polynomial(order.s);
            let ma_poly = c.ma_polynomial(order.s);
            conditional_residuals(&w, c.intercept, &ar_poly, &ma_poly)
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
        };
        let best = nelder_mead(css, &initial, Some(bounds.as_slice()), &self.optimizer);

        let c = layout.unpack(&best.point);
        let ar_poly = c.ar_polynomial(order.s);
        let ma_poly = c.ma_polynomial(order.s);
        let innovations = conditional_residuals(&w, c.intercept, &ar_poly, &ma_poly);

        let n_eff = w.len() - ar_poly.degree();
        let sse: f64 = innovations.iter().map(|e| e * e).sum();
        let sigma2 = sse / n_eff as f64;
        if !sigma2.is_finite() {
            return Err(ForecastError::FitError(format!(
                "{} produced a non-finite variance",
                order
            )));
        }

        let k = (order.num_params() + 1) as f64;
        let n = n_eff as f64;
        let loglik = -0.5 * n * ((2.0 * PI * sigma2.max(MIN_SIGMA2)).ln() + 1.0);
        let aic = -2.0 * loglik + 2.0 * k;
        let bic = -2.0 * loglik + k * n.ln();
        let aicc = if n > k + 1.0 {
            Some(aic + 2.0 * k * (k + 1.0) / (n - k - 1.0))
        } else {
            None
        };

        let mut residuals = vec![0.0; order.differencing_lag()];
        residuals.extend(innovations);

        Ok(SarimaFit {
            order,
            intercept: c.intercept,
            ar: c.ar,
            ma: c.ma,
            sar: c.sar,
            sma: c.sma,
            sigma2,
            loglik,
            aic,
            bic,
            aicc,
            n_eff,
            history: data.to_vec(),
            residuals,
        })
    }

    fn name(&self) -> &str {
        "ARIMA"
    }
}

impl SarimaFit {
    fn coefficients(&self) -> Coefficients {
        Coefficients {
            intercept: self.intercept,
            ar: self.ar.clone(),
            ma: self.ma.clone(),
            sar: self.sar.clone(),
            sma: self.sma.clone(),
        }
    }

    /// AR and differencing factors expanded into one polynomial
    fn full_ar_polynomial(&self) -> LagPolynomial {
        let diff_poly = LagPolynomial::differencing(self.order.d, self.order.seasonal_d(), self.order.s);
        self.coefficients().ar_polynomial(self.order.s).multiply(&diff_poly)
    }

    /// Constant term of the expanded recursion, `mean * phi(1) Phi(1)`
    fn drift(&self) -> f64 {
        let ar_poly = self.coefficients().ar_polynomial(self.order.s);
        self.intercept * ar_poly.coefficients().iter().sum::<f64>()
    }

    /// Selection criterion used by the order search
    pub fn criterion(&self) -> Option<f64> {
        self.aicc.filter(|v| v.is_finite())
    }

    /// The point forecasts alone
    pub fn point_forecast(&self, horizon: usize) -> Vec<f64> {
        let full_ar = self.full_ar_polynomial();
        let ma_poly = self.coefficients().ma_polynomial(self.order.s);
        let drift = self.drift();
        let n = self.history.len();

        let mut path = self.history.clone();
        path.reserve(horizon);
        for t in n..n + horizon {
            let mut value = drift;
            for k in 1..=full_ar.degree().min(t) {
                value -= full_ar.coefficient(k) * path[t - k];
            }
            for j in 1..=ma_poly.degree() {
                if t >= j && t - j < n {
                    value += ma_poly.coefficient(j) * self.residuals[t - j];
                }
            }
            path.push(value);
        }
        path.split_off(n)
    }

    /// Forecast error variance for each step ahead
    pub fn forecast_variances(&self, horizon: usize) -> Vec<f64> {
        let ma_poly = self.coefficients().ma_polynomial(self.order.s);
        let psi = self.full_ar_polynomial().psi_weights(&ma_poly, horizon);
        let mut cumulative = 0.0;
        psi.iter()
            .map(|weight| {
                cumulative += weight * weight;
                self.sigma2 * cumulative
            })
            .collect()
    }
}

impl TrainedForecastModel for SarimaFit {
    fn forecast(&self, horizon: usize, levels: &[u8]) -> Result<ForecastResult> {
        validate_levels(levels)?;
        let values = self.point_forecast(horizon);
        let variances = self.forecast_variances(horizon);
        let intervals = normal_intervals(&values, &variances, levels)?;
        Ok(ForecastResult { values, intervals })
    }

    fn fitted_values(&self) -> Vec<f64> {
        self.history
            .iter()
            .zip(&self.residuals)
            .map(|(y, e)| y - e)
            .collect()
    }

    fn residuals(&self) -> Vec<f64> {
        self.residuals.clone()
    }

    fn describe(&self) -> String {
        match self.aicc {
            Some(aicc) => format!("{} sigma2={:.4} aicc={:.3}", self.order, self.sigma2, aicc),
            None => format!("{} sigma2={:.4}", self.order, self.sigma2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_order_display() {
        assert_eq!(SarimaOrder::non_seasonal(1, 1, 0).to_string(), "ARIMA(1,1,0)");
        assert_eq!(
            SarimaOrder::new(0, 1, 1, 0, 1, 1, 12).to_string(),
            "ARIMA(0,1,1)(0,1,1)[12]"
        );
    }

    #[test]
    fn test_mean_model_forecast() {
        let fit = Sarima::new(SarimaOrder::non_seasonal(0, 0, 0))
            .train(&[100.0, 150.0, 200.0])
            .unwrap();
        assert_relative_eq!(fit.intercept, 150.0, epsilon = 1e-2);
        let forecast = fit.forecast(2, &[95]).unwrap();
        assert_relative_eq!(forecast.values[0], 150.0, epsilon = 1e-2);
        assert!(forecast.intervals[0].lower[0] < forecast.values[0]);
        assert!(forecast.intervals[0].upper[1] > forecast.values[1]);
    }

    #[test]
    fn test_random_walk_widens() {
        let data: Vec<f64> = (0..20).map(|i| (i as f64 * 0.7).sin() * 5.0 + i as f64).collect();
        let fit = Sarima::new(SarimaOrder::non_seasonal(0, 1, 0)).train(&data).unwrap();
        let forecast = fit.forecast(3, &[80]).unwrap();
        assert_relative_eq!(forecast.values[0], data[19] + fit.intercept, epsilon = 1e-9);
        let variances = fit.forecast_variances(3);
        assert_relative_eq!(variances[2], 3.0 * variances[0], epsilon = 1e-9);
    }

    fn ar1_series(phi: f64, n: usize) -> Vec<f64> {
        let mut data = vec![0.0];
        // deterministic pseudo-noise
        let mut state: u64 = 7;
        for _ in 1..n {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            let next = phi * data[data.len() - 1] + noise;
            data.push(next);
        }
        data
    }

    #[test]
    fn test_ar1_recovers_coefficient() {
        let data = ar1_series(0.6, 300);
        let fit = Sarima::new(SarimaOrder::non_seasonal(1, 0, 0)).train(&data).unwrap();
        assert!((fit.ar[0] - 0.6).abs() < 0.15);
        assert!(fit.aicc.is_some());
    }

    #[test]
    fn test_optimizer_budget_is_honoured() {
        let data = ar1_series(0.6, 300);
        let order = SarimaOrder::non_seasonal(1, 0, 0);
        let full = Sarima::new(order)
            .with_optimizer(NelderMeadConfig {
                max_iter: 5000,
                tolerance: 1e-10,
                ..NelderMeadConfig::default()
            })
            .train(&data)
            .unwrap();
        assert!((full.ar[0] - 0.6).abs() < 0.15);

        // No iterations: the fit stays on the starting simplex
        let capped = Sarima::new(order)
            .with_optimizer(NelderMeadConfig {
                max_iter: 0,
                ..NelderMeadConfig::default()
            })
            .train(&data)
            .unwrap();
        assert!(capped.ar[0].abs() <= 0.1 + 1e-12);
        assert!(capped.sigma2 >= full.sigma2);
    }

    #[test]
    fn test_too_short_for_order() {
        let result = Sarima::new(SarimaOrder::new(0, 0, 0, 0, 1, 0, 12)).train(&[1.0; 12]);
        assert!(matches!(result, Err(ForecastError::FitError(_))));
    }
}
