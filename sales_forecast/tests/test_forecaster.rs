use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use sales_forecast::aggregate::{Frequency, MonthlySeries};
use sales_forecast::error::ForecastError;
use sales_forecast::utils::future_months;
use sales_forecast::{ModelSpec, StatsForecaster};

fn ymd(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn months(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut periods = vec![start];
    periods.extend(future_months(start, n - 1).unwrap());
    periods
}

fn category(id: &str, scale: f64, n: usize) -> MonthlySeries {
    let values = (0..n)
        .map(|t| {
            let t = t as f64;
            scale * (10.0 + 0.1 * t + 2.0 * (t * std::f64::consts::PI / 6.0).cos() + (t * 2.3).sin())
        })
        .collect();
    MonthlySeries::observed(id, months(ymd(2011, 1), n), values).unwrap()
}

fn categories() -> Vec<MonthlySeries> {
    vec![
        category("Cross Country Race", 1000.0, 60),
        category("Elite Road", 700.0, 60),
        category("Trail", 300.0, 48),
    ]
}

#[test]
fn test_horizon_and_interval_shape() {
    let mut sf = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1).unwrap();
    sf.fit(&categories()).unwrap();
    let forecasts = sf.predict(12, &[80, 95]).unwrap();

    assert_eq!(forecasts.len(), 36);
    assert_eq!(forecasts.levels, vec![80, 95]);

    let trail: Vec<_> = forecasts.for_series("Trail").collect();
    assert_eq!(trail.len(), 12);
    assert_eq!(trail[0].ds, ymd(2015, 1));
    assert_eq!(trail[11].ds, ymd(2015, 12));

    for point in &forecasts.points {
        for interval in &point.intervals {
            assert!(interval.lower <= point.point && point.point <= interval.upper);
        }
        assert!(point.intervals[1].lower <= point.intervals[0].lower);
        assert!(point.intervals[0].upper <= point.intervals[1].upper);
    }

    let df = forecasts.to_dataframe().unwrap();
    assert_eq!(df.height(), 36);
    assert_eq!(
        df.get_column_names(),
        vec![
            "unique_id",
            "ds",
            "AutoARIMA",
            "AutoARIMA-lo-80",
            "AutoARIMA-hi-80",
            "AutoARIMA-lo-95",
            "AutoARIMA-hi-95"
        ]
    );
}

#[test]
fn test_parallel_fit_matches_sequential() {
    let series = categories();
    let mut sequential = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1).unwrap();
    let mut parallel = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 2).unwrap();
    sequential.fit(&series).unwrap();
    parallel.fit(&series).unwrap();

    assert_eq!(sequential.fitted(), parallel.fitted());
    assert_eq!(
        sequential.predict(12, &[80, 95]).unwrap(),
        parallel.predict(12, &[80, 95]).unwrap()
    );
}

#[test]
fn test_two_models_side_by_side() {
    let mut sf = StatsForecaster::new(
        vec![ModelSpec::auto_arima(12), ModelSpec::ets(12)],
        Frequency::MonthStart,
        1,
    )
    .unwrap();
    sf.fit(&categories()).unwrap();
    let forecasts = sf.predict(3, &[95]).unwrap();
    assert_eq!(forecasts.models, vec!["AutoARIMA".to_string(), "ETS".to_string()]);
    assert_eq!(forecasts.len(), 3 * 3 * 2);

    let df = forecasts.to_dataframe().unwrap();
    assert_eq!(df.height(), 9);
    assert_eq!(df.width(), 2 + 2 * 3);

    let summaries = sf.fitted_summary();
    assert_eq!(summaries.len(), 6);
    assert!(summaries.iter().all(|s| s.accuracy.is_some()));
}

#[test]
fn test_levels_are_sorted_and_deduplicated() {
    let mut sf = StatsForecaster::new(vec![ModelSpec::ets(12)], Frequency::MonthStart, 1).unwrap();
    sf.fit(&categories()).unwrap();
    let forecasts = sf.predict(2, &[95, 80, 95]).unwrap();
    assert_eq!(forecasts.levels, vec![80, 95]);
    assert_eq!(forecasts.points[0].intervals[0].level, 80);
}

#[test]
fn test_predict_before_fit() {
    let sf = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1).unwrap();
    assert!(!sf.is_fitted());
    assert!(matches!(sf.predict(12, &[80, 95]), Err(ForecastError::FitRequired)));
}

#[test]
fn test_invalid_predict_arguments() {
    let mut sf = StatsForecaster::new(vec![ModelSpec::ets(12)], Frequency::MonthStart, 1).unwrap();
    sf.fit(&categories()).unwrap();
    assert!(matches!(sf.predict(0, &[80]), Err(ForecastError::InvalidParameter(_))));
    assert!(matches!(sf.predict(3, &[100]), Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_invalid_construction() {
    assert!(matches!(
        StatsForecaster::new(Vec::new(), Frequency::MonthStart, 1),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        StatsForecaster::new(vec![ModelSpec::ets(12)], Frequency::MonthStart, 0),
        Err(ForecastError::InvalidParameter(_))
    ));
}

#[test]
fn test_irregular_series_rejected() {
    let mut sf = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1).unwrap();

    let gappy = MonthlySeries::observed("Trail", vec![ymd(2020, 1), ymd(2020, 3)], vec![1.0, 2.0]).unwrap();
    match sf.fit(&[gappy]) {
        Err(ForecastError::FitError(message)) => assert!(message.contains("fill gaps")),
        other => panic!("Expected FitError, got {:?}", other.map(|_| ())),
    }

    let mid_month = MonthlySeries::observed(
        "Trail",
        vec![NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()],
        vec![1.0],
    )
    .unwrap();
    assert!(matches!(sf.fit(&[mid_month]), Err(ForecastError::FitError(_))));

    let duplicate = vec![category("Trail", 1.0, 24), category("Trail", 2.0, 24)];
    assert!(matches!(sf.fit(&duplicate), Err(ForecastError::FitError(_))));
    assert!(matches!(sf.fit(&[]), Err(ForecastError::FitError(_))));
    assert!(!sf.is_fitted());
}

#[test]
fn test_minimal_series_forecasts() {
    let mut sf = StatsForecaster::new(vec![ModelSpec::auto_arima(12)], Frequency::MonthStart, 1).unwrap();
    let mountain = MonthlySeries::observed(
        "Mountain",
        vec![ymd(2020, 1), ymd(2020, 2), ymd(2020, 3)],
        vec![100.0, 150.0, 200.0],
    )
    .unwrap();
    sf.fit(&[mountain]).unwrap();
    let forecasts = sf.predict(1, &[80, 95]).unwrap();

    assert_eq!(forecasts.len(), 1);
    let point = &forecasts.points[0];
    assert_eq!(point.unique_id, "Mountain");
    assert_eq!(point.ds, ymd(2020, 4));
    assert!(point.point.is_finite());
    assert!(point.intervals.iter().all(|i| i.lower <= point.point && point.point <= i.upper));
}
