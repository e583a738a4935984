//! # Sales Math
//!
//! Numerical building blocks shared by the sales forecasting models.
//! This crate provides lag-polynomial algebra, differencing, a bounded
//! Nelder-Mead optimizer, stationarity diagnostics and summary statistics.

use thiserror::Error;

pub mod differencing;
pub mod optimization;
pub mod polynomial;
pub mod stationarity;
pub mod stats;

/// Errors that can occur in forecasting-related calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for sales math operations
pub type Result<T> = std::result::Result<T, MathError>;

pub use differencing::{difference, seasonal_difference};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use polynomial::LagPolynomial;
