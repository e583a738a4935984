//! # Sales Forecast
//!
//! A Rust library for monthly sales demand forecasting from relational
//! order data.
//!
//! ## Features
//!
//! - Whole-table access to SQLite databases and CSV directories
//! - Typed validation of product, shop and order-line rows
//! - Left-preserving joins and derived category, location and line-total columns
//! - Monthly aggregation per category with explicit gap filling
//! - Per-series AutoARIMA and ETS forecasts with prediction intervals
//! - Versioned JSON checkpoints of fitted models
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sales_forecast::aggregate::{series_from_points, summarize_by_time};
//! use sales_forecast::aggregate::{AggFunc, Frequency, GroupColumn, ValueColumn};
//! use sales_forecast::forecaster::{ModelSpec, StatsForecaster};
//! use sales_forecast::pipeline::{load_tables, prepare_records};
//! use sales_forecast::source::SqliteSource;
//! use sales_forecast::wrangle::CleanOptions;
//!
//! # fn main() -> sales_forecast::Result<()> {
//! let source = SqliteSource::open("bikeshop_database.sqlite")?;
//! let tables = load_tables(&source)?;
//! source.close()?;
//!
//! let records = prepare_records(&tables, &CleanOptions::default())?;
//! let monthly = summarize_by_time(
//!     &records,
//!     GroupColumn::Category2,
//!     ValueColumn::TotalPrice,
//!     Frequency::MonthStart,
//!     AggFunc::Sum,
//! );
//!
//! let mut sf = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1)?;
//! sf.fit(&series_from_points(&monthly))?;
//! sf.save("models/arima.json")?;
//!
//! let forecasts = sf.predict(12, &[80, 95])?;
//! println!("{}", forecasts.to_dataframe()?);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod export;
pub mod forecaster;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod utils;
pub mod wrangle;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::error::{ForecastError, Result};
pub use crate::forecaster::{Forecasts, ModelSpec, StatsForecaster};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::pipeline::{run, PipelineOutput};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
