//! Error types for the sales_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The data source could not be opened or released
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A table is absent or a query failed
    #[error("Query error: {0}")]
    QueryError(String),

    /// Source rows do not match the expected record schema
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A date, description or location could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A series could not be fitted
    #[error("Fit error: {0}")]
    FitError(String),

    /// Prediction was requested before any series was fitted
    #[error("Model must be fitted before predicting")]
    FitRequired,

    /// A checkpoint file has an unknown format, version or content
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error while loading or validating the pipeline configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from the numeric building blocks
    #[error("Math error: {0}")]
    MathError(#[from] sales_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<rusqlite::Error> for ForecastError {
    fn from(err: rusqlite::Error) -> Self {
        ForecastError::QueryError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::QueryError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
