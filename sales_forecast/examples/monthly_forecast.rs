use chrono::NaiveDate;
use sales_forecast::aggregate::{Frequency, MonthlySeries};
use sales_forecast::metrics::evaluate_holdout;
use sales_forecast::utils::future_months;
use sales_forecast::{ModelSpec, StatsForecaster};

/// Five years of monthly revenue with a trend and a spring peak
fn synthetic_revenue(base: f64, growth: f64) -> Vec<f64> {
    (0..60)
        .map(|t| {
            let month = (t % 12) as f64;
            let season = 1.0 + 0.3 * ((month - 2.0) * std::f64::consts::PI / 6.0).sin();
            (base + growth * t as f64) * season
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2011, 1, 1).ok_or("invalid start date")?;
    let mut periods = vec![start];
    periods.extend(future_months(start, 59)?);

    let series = vec![
        MonthlySeries::observed("Mountain", periods.clone(), synthetic_revenue(180_000.0, 1_500.0))?,
        MonthlySeries::observed("Road", periods, synthetic_revenue(120_000.0, 800.0))?,
    ];
    println!("Built {} monthly series of {} months", series.len(), series[0].len());

    let models = vec![ModelSpec::auto_arima(12), ModelSpec::ets(12)];

    // Hold out the last year to compare the two model families
    for model in &models {
        let values: Vec<f64> = series[0].values.iter().flatten().copied().collect();
        let accuracy = evaluate_holdout(model, &values, 12)?;
        println!("{} holdout on Mountain: {}", model.name(), accuracy);
    }

    let mut forecaster = StatsForecaster::new(models, Frequency::MonthStart, 2)?;
    forecaster.fit(&series)?;
    for summary in forecaster.fitted_summary() {
        println!("{:>8} {:<10} {}", summary.unique_id, summary.model, summary.description);
    }

    let forecasts = forecaster.predict(12, &[80, 95])?;
    println!("{}", forecasts.to_dataframe()?);

    for point in forecasts.for_series("Road").filter(|p| p.model == "AutoARIMA").take(3) {
        let band = &point.intervals[1];
        println!(
            "Road {}: {:.0} (95%: {:.0} .. {:.0})",
            point.ds, point.point, band.lower, band.upper
        );
    }

    Ok(())
}
