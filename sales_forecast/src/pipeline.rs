//! End-to-end run: tables to forecasts
//!
//! Every stage hands its full result to the next one; the first error ends
//! the run.

use crate::aggregate::{
    fill_gaps, monthly_to_dataframe, series_from_points, summarize_by_time, Frequency, MonthlyPoint,
    MonthlySeries,
};
use crate::config::{PipelineConfig, SourceKind};
use crate::error::Result;
use crate::export::{forecast_plot_frame, write_csv};
use crate::forecaster::{Forecasts, StatsForecaster};
use crate::schema::{OrderLine, Product, Shop};
use crate::source::{CsvSource, SqliteSource, TableSource, BIKESHOPS_TABLE, BIKES_TABLE, ORDERLINES_TABLE};
use crate::wrangle::{clean, glimpse, join_orderlines, records_to_dataframe, CleanOptions, SalesRecord};
use tracing::{debug, info, info_span, Level};

/// Validated contents of the three source tables
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTables {
    pub products: Vec<Product>,
    pub shops: Vec<Shop>,
    pub orders: Vec<OrderLine>,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<SalesRecord>,
    pub monthly: Vec<MonthlyPoint>,
    pub series: Vec<MonthlySeries>,
    pub forecaster: StatsForecaster,
    pub forecasts: Forecasts,
}

/// Read and validate `bikes`, `bikeshops` and `orderlines`
pub fn load_tables(source: &dyn TableSource) -> Result<SourceTables> {
    let bikes = source.read_table(BIKES_TABLE)?;
    let bikeshops = source.read_table(BIKESHOPS_TABLE)?;
    let mut orderlines = source.read_table(ORDERLINES_TABLE)?;
    orderlines.drop_index_artifacts();

    let tables = SourceTables {
        products: Product::from_table(&bikes)?,
        shops: Shop::from_table(&bikeshops)?,
        orders: OrderLine::from_table(&orderlines)?,
    };
    info!(
        source = %source.describe(),
        bikes = tables.products.len(),
        bikeshops = tables.shops.len(),
        orderlines = tables.orders.len(),
        "Loaded tables"
    );
    Ok(tables)
}

/// Join and clean the source tables
pub fn prepare_records(tables: &SourceTables, options: &CleanOptions) -> Result<Vec<SalesRecord>> {
    let joined = join_orderlines(&tables.orders, &tables.products, &tables.shops)?;
    let records = clean(&joined, options)?;
    if tracing::enabled!(Level::DEBUG) {
        debug!("Sales records\n{}", glimpse(&records_to_dataframe(&records)?));
    }
    Ok(records)
}

/// Monthly aggregates and the series built from them
pub fn aggregate_records(
    records: &[SalesRecord],
    config: &PipelineConfig,
) -> Result<(Vec<MonthlyPoint>, Vec<MonthlySeries>)> {
    let agg = &config.aggregation;
    let monthly = summarize_by_time(records, agg.group, agg.value, Frequency::MonthStart, agg.agg);
    let filled = fill_gaps(&monthly, Frequency::MonthStart, agg.gap_fill)?;
    let series = series_from_points(&filled);
    info!(
        points = monthly.len(),
        filled = filled.len(),
        series = series.len(),
        gap_fill = ?agg.gap_fill,
        "Built monthly series"
    );
    Ok((monthly, series))
}

/// Fit a fresh forecaster, or restore the checkpoint when configured to
pub fn fit_or_load(series: &[MonthlySeries], config: &PipelineConfig) -> Result<StatsForecaster> {
    let forecast = &config.forecast;
    if forecast.reuse_checkpoint {
        info!(path = %forecast.checkpoint.display(), "Reusing checkpoint");
        return StatsForecaster::load(&forecast.checkpoint);
    }
    let mut forecaster = StatsForecaster::new(config.model_specs(), Frequency::MonthStart, forecast.n_jobs)?;
    forecaster.fit(series)?;
    for summary in forecaster.fitted_summary() {
        info!(
            unique_id = %summary.unique_id,
            model = %summary.model,
            fit = %summary.description,
            rmse = summary.accuracy.as_ref().map(|a| a.rmse),
            "Series fit"
        );
    }
    forecaster.save(&forecast.checkpoint)?;
    Ok(forecaster)
}

/// Run every stage against an already opened source
pub fn run_with_source(source: &dyn TableSource, config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;

    let tables = {
        let _span = info_span!("data_access").entered();
        load_tables(source)?
    };
    let records = {
        let _span = info_span!("join_clean").entered();
        prepare_records(&tables, &config.clean_options())?
    };
    let (monthly, series) = {
        let _span = info_span!("aggregate").entered();
        aggregate_records(&records, config)?
    };
    let (forecaster, forecasts) = {
        let _span = info_span!("forecast").entered();
        let forecaster = fit_or_load(&series, config)?;
        let forecasts = forecaster.predict(config.forecast.horizon, &config.forecast.levels)?;
        (forecaster, forecasts)
    };

    if let Some(dir) = &config.output.dir {
        let _span = info_span!("export").entered();
        write_csv(&mut records_to_dataframe(&records)?, dir.join("sales_records.csv"))?;
        write_csv(
            &mut monthly_to_dataframe(&monthly, config.aggregation.group, config.aggregation.value)?,
            dir.join("monthly_sales.csv"),
        )?;
        write_csv(&mut forecasts.to_dataframe()?, dir.join("forecasts.csv"))?;
        write_csv(
            &mut forecast_plot_frame(&series, &forecasts)?,
            dir.join("forecast_plot.csv"),
        )?;
    }

    Ok(PipelineOutput {
        records,
        monthly,
        series,
        forecaster,
        forecasts,
    })
}

/// Open the configured source, run the pipeline and release the source
pub fn run(config: &PipelineConfig) -> Result<PipelineOutput> {
    match config.data.source {
        SourceKind::Sqlite => {
            let source = SqliteSource::open(&config.data.path)?;
            let output = run_with_source(&source, config)?;
            source.close()?;
            Ok(output)
        }
        SourceKind::Csv => {
            let source = CsvSource::new(&config.data.path)?;
            run_with_source(&source, config)
        }
    }
}
