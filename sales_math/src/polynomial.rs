//! Lag (backshift) polynomial algebra
//!
//! A polynomial `c0 + c1 B + c2 B^2 + ...` is stored as its coefficient
//! vector. Seasonal ARIMA models are products of such polynomials, so the
//! models in `sales_forecast` only ever need multiplication, application to
//! a series and the psi-weight expansion of a ratio.

use crate::{MathError, Result};

/// Polynomial in the backshift operator `B`
#[derive(Debug, Clone, PartialEq)]
pub struct LagPolynomial {
    coefficients: Vec<f64>,
}

impl LagPolynomial {
    /// Create a polynomial from raw coefficients (index = lag)
    pub fn new(coefficients: Vec<f64>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(MathError::InvalidInput(
                "A lag polynomial needs at least one coefficient".to_string(),
            ));
        }
        Ok(Self { coefficients })
    }

    /// The identity polynomial `1`
    pub fn one() -> Self {
        Self {
            coefficients: vec![1.0],
        }
    }

    /// Autoregressive factor `1 - phi_1 B^step - phi_2 B^(2 step) - ...`
    pub fn autoregressive(phi: &[f64], step: usize) -> Self {
        let step = step.max(1);
        let mut coefficients = vec![0.0; phi.len() * step + 1];
        coefficients[0] = 1.0;
        for (i, value) in phi.iter().enumerate() {
            coefficients[(i + 1) * step] = -value;
        }
        Self { coefficients }
    }

    /// Moving-average factor `1 + theta_1 B^step + theta_2 B^(2 step) + ...`
    pub fn moving_average(theta: &[f64], step: usize) -> Self {
        let step = step.max(1);
        let mut coefficients = vec![0.0; theta.len() * step + 1];
        coefficients[0] = 1.0;
        for (i, value) in theta.iter().enumerate() {
            coefficients[(i + 1) * step] = *value;
        }
        Self { coefficients }
    }

    /// `(1 - B)^d (1 - B^s)^cap_d`
    pub fn differencing(d: usize, cap_d: usize, period: usize) -> Self {
        let mut poly = Self::one();
        let regular = Self::autoregressive(&[1.0], 1);
        for _ in 0..d {
            poly = poly.multiply(&regular);
        }
        if period > 0 {
            let seasonal = Self::autoregressive(&[1.0], period);
            for _ in 0..cap_d {
                poly = poly.multiply(&seasonal);
            }
        }
        poly
    }

    /// Coefficients indexed by lag
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Highest lag carried by the polynomial
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Coefficient at `lag` (zero beyond the degree)
    pub fn coefficient(&self, lag: usize) -> f64 {
        self.coefficients.get(lag).copied().unwrap_or(0.0)
    }

    /// Polynomial product
    pub fn multiply(&self, other: &Self) -> Self {
        let mut coefficients = vec![0.0; self.coefficients.len() + other.coefficients.len() - 1];
        for (i, a) in self.coefficients.iter().enumerate() {
            if *a == 0.0 {
                continue;
            }
            for (j, b) in other.coefficients.iter().enumerate() {
                coefficients[i + j] += a * b;
            }
        }
        Self { coefficients }
    }

    /// Apply the polynomial to a series.
    ///
    /// Output element `t` is `sum_k c_k x[t + degree - k]`, so the result is
    /// `degree` elements shorter than the input.
    pub fn apply(&self, series: &[f64]) -> Vec<f64> {
        let degree = self.degree();
        if series.len() <= degree {
            return Vec::new();
        }
        (degree..series.len())
            .map(|t| {
                self.coefficients
                    .iter()
                    .enumerate()
                    .map(|(k, c)| c * series[t - k])
                    .sum()
            })
            .collect()
    }

    /// First `n` weights of `numerator(B) / self(B)`.
    ///
    /// `self` must have a unit constant term, which holds for every
    /// autoregressive and differencing factor built by this module.
    pub fn psi_weights(&self, numerator: &Self, n: usize) -> Vec<f64> {
        let mut psi = Vec::with_capacity(n);
        for j in 0..n {
            let mut value = numerator.coefficient(j);
            for k in 1..=j.min(self.degree()) {
                value -= self.coefficients[k] * psi[j - k];
            }
            psi.push(value);
        }
        psi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_differencing_polynomial() {
        let poly = LagPolynomial::differencing(1, 1, 4);
        // (1 - B)(1 - B^4) = 1 - B - B^4 + B^5
        assert_eq!(poly.coefficients(), &[1.0, -1.0, 0.0, 0.0, -1.0, 1.0]);
        assert_eq!(poly.degree(), 5);
    }

    #[test]
    fn test_apply_first_difference() {
        let poly = LagPolynomial::differencing(1, 0, 0);
        assert_eq!(poly.apply(&[1.0, 3.0, 6.0, 10.0]), vec![2.0, 3.0, 4.0]);
        assert!(poly.apply(&[1.0]).is_empty());
    }

    #[test]
    fn test_seasonal_expansion() {
        let ar = LagPolynomial::autoregressive(&[0.5], 1);
        let sar = LagPolynomial::autoregressive(&[0.2], 3);
        let product = ar.multiply(&sar);
        assert_eq!(product.coefficients(), &[1.0, -0.5, 0.0, -0.2, 0.1]);
    }

    #[test]
    fn test_psi_weights_ar1() {
        let ar = LagPolynomial::autoregressive(&[0.5], 1);
        let psi = ar.psi_weights(&LagPolynomial::one(), 4);
        assert_eq!(psi, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_psi_weights_random_walk() {
        let diff = LagPolynomial::differencing(1, 0, 0);
        let psi = diff.psi_weights(&LagPolynomial::moving_average(&[0.5], 1), 3);
        assert_eq!(psi, vec![1.0, 1.5, 1.5]);
    }

    #[test]
    fn test_empty_coefficients_rejected() {
        assert!(LagPolynomial::new(Vec::new()).is_err());
    }
}
