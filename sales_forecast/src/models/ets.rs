//! Additive exponential smoothing
//!
//! The structure follows the length of the series: additive Holt-Winters
//! with at least two full seasons, Holt's linear trend with at least three
//! observations, and simple exponential smoothing otherwise.

use crate::error::Result;
use crate::models::{normal_intervals, require_finite, validate_levels};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use sales_math::stats::mean;
use sales_math::{nelder_mead, NelderMeadConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

const ALPHA_BOUNDS: (f64, f64) = (1e-4, 0.9999);
const SLOPE_BOUNDS: (f64, f64) = (1e-4, 0.5);

/// ETS specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ets {
    /// Observations per seasonal cycle; 1 disables the seasonal component
    pub season_length: usize,
}

impl Ets {
    pub fn new(season_length: usize) -> Self {
        Self {
            season_length: season_length.max(1),
        }
    }

    fn kind_for(&self, n: usize) -> EtsKind {
        let m = self.season_length;
        if m > 1 && n >= 2 * m {
            EtsKind::HoltWinters
        } else if n >= 3 {
            EtsKind::Holt
        } else {
            EtsKind::Simple
        }
    }
}

impl Default for Ets {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Components present in a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtsKind {
    /// Level only
    Simple,
    /// Level and additive trend
    Holt,
    /// Level, additive trend and additive season
    HoltWinters,
}

impl fmt::Display for EtsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtsKind::Simple => write!(f, "ETS(A,N,N)"),
            EtsKind::Holt => write!(f, "ETS(A,A,N)"),
            EtsKind::HoltWinters => write!(f, "ETS(A,A,A)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct State {
    level: f64,
    trend: f64,
    /// Seasonal state per phase `t % m`
    season: Vec<f64>,
}

/// State before the first observation, chosen so the first one-step
/// forecast starts from the earliest data
fn initial_state(kind: EtsKind, data: &[f64], m: usize) -> State {
    match kind {
        EtsKind::Simple => State {
            level: data[0],
            trend: 0.0,
            season: Vec::new(),
        },
        EtsKind::Holt => {
            let trend = data[1] - data[0];
            State {
                level: data[0] - trend,
                trend,
                season: Vec::new(),
            }
        }
        EtsKind::HoltWinters => {
            let first = mean(&data[..m]);
            let second = mean(&data[m..2 * m]);
            let trend = (second - first) / m as f64;
            State {
                level: first - trend,
                trend,
                season: data[..m].iter().map(|y| y - first).collect(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Smoothing {
    alpha: f64,
    beta: f64,
    gamma: f64,
}

/// Run the error-correction recursions, returning one-step fitted values
/// and the final state
fn filter(kind: EtsKind, data: &[f64], m: usize, params: Smoothing) -> (Vec<f64>, State) {
    let mut state = initial_state(kind, data, m);
    let mut fitted = Vec::with_capacity(data.len());
    for (t, &y) in data.iter().enumerate() {
        let phase = if state.season.is_empty() { 0 } else { t % m };
        let seasonal = state.season.get(phase).copied().unwrap_or(0.0);
        let forecast = state.level + state.trend + seasonal;
        let error = y - forecast;
        fitted.push(forecast);

        state.level += state.trend + params.alpha * error;
        if kind != EtsKind::Simple {
            state.trend += params.beta * error;
        }
        if let Some(s) = state.season.get_mut(phase) {
            *s += params.gamma * error;
        }
    }
    (fitted, state)
}

/// Fitted exponential smoothing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtsFit {
    pub kind: EtsKind,
    pub season_length: usize,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub level: f64,
    pub trend: f64,
    pub season: Vec<f64>,
    /// Residual variance
    pub sigma2: f64,
    pub history: Vec<f64>,
    pub fitted: Vec<f64>,
}

impl ForecastModel for Ets {
    type Trained = EtsFit;

    fn train(&self, data: &[f64]) -> Result<EtsFit> {
        require_finite(data)?;
        let m = self.season_length;
        let kind = self.kind_for(data.len());

        let (initial, bounds): (Vec<f64>, Vec<(f64, f64)>) = match kind {
            EtsKind::Simple => (vec![0.5], vec![ALPHA_BOUNDS]),
            EtsKind::Holt => (vec![0.5, 0.1], vec![ALPHA_BOUNDS, SLOPE_BOUNDS]),
            EtsKind::HoltWinters => (
                vec![0.5, 0.1, 0.1],
                vec![ALPHA_BOUNDS, SLOPE_BOUNDS, SLOPE_BOUNDS],
            ),
        };
        let unpack = |params: &[f64]| Smoothing {
            alpha: params[0],
            beta: params.get(1).copied().unwrap_or(0.0),
            gamma: params.get(2).copied().unwrap_or(0.0),
        };

        let sse = |params: &[f64]| {
            let (fitted, _) = filter(kind, data, m, unpack(params));
            data.iter()
                .zip(&fitted)
                .map(|(y, f)| (y - f).powi(2))
                .sum::<f64>()
        };
        let best = nelder_mead(sse, &initial, Some(bounds.as_slice()), &NelderMeadConfig::default());

        let params = unpack(&best.point);
        let (fitted, state) = filter(kind, data, m, params);
        let sigma2 = data
            .iter()
            .zip(&fitted)
            .map(|(y, f)| (y - f).powi(2))
            .sum::<f64>()
            / data.len() as f64;

        Ok(EtsFit {
            kind,
            season_length: m,
            alpha: params.alpha,
            beta: params.beta,
            gamma: params.gamma,
            level: state.level,
            trend: state.trend,
            season: state.season,
            sigma2,
            history: data.to_vec(),
            fitted,
        })
    }

    fn name(&self) -> &str {
        "ETS"
    }
}

impl EtsFit {
    /// Coefficient of the innovation `j` steps back in the `h`-step error
    fn error_weight(&self, j: usize) -> f64 {
        let seasonal = if self.kind == EtsKind::HoltWinters && j % self.season_length == 0 {
            self.gamma
        } else {
            0.0
        };
        self.alpha + self.beta * j as f64 + seasonal
    }
}

impl TrainedForecastModel for EtsFit {
    fn forecast(&self, horizon: usize, levels: &[u8]) -> Result<ForecastResult> {
        validate_levels(levels)?;
        let n = self.history.len();
        let values: Vec<f64> = (1..=horizon)
            .map(|h| {
                let seasonal = if self.season.is_empty() {
                    0.0
                } else {
                    self.season[(n + h - 1) % self.season_length]
                };
                self.level + h as f64 * self.trend + seasonal
            })
            .collect();

        let mut cumulative = 1.0;
        let variances: Vec<f64> = (1..=horizon)
            .map(|h| {
                if h > 1 {
                    cumulative += self.error_weight(h - 1).powi(2);
                }
                self.sigma2 * cumulative
            })
            .collect();

        let intervals = normal_intervals(&values, &variances, levels)?;
        Ok(ForecastResult { values, intervals })
    }

    fn fitted_values(&self) -> Vec<f64> {
        self.fitted.clone()
    }

    fn residuals(&self) -> Vec<f64> {
        self.history
            .iter()
            .zip(&self.fitted)
            .map(|(y, f)| y - f)
            .collect()
    }

    fn describe(&self) -> String {
        format!(
            "{} alpha={:.3} beta={:.3} gamma={:.3} sigma2={:.4}",
            self.kind, self.alpha, self.beta, self.gamma, self.sigma2
        )
    }
}
