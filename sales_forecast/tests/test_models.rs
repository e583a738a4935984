use approx::assert_relative_eq;
use sales_forecast::error::ForecastError;
use sales_forecast::models::arima::{Sarima, SarimaOrder};
use sales_forecast::models::auto_arima::AutoArima;
use sales_forecast::models::ets::{Ets, EtsKind};
use sales_forecast::models::{z_value, ForecastModel, ForecastResult, TrainedForecastModel};

/// Trend, yearly pattern and a deterministic wobble
fn create_test_data(months: usize) -> Vec<f64> {
    (0..months)
        .map(|t| {
            let t = t as f64;
            let season = 30.0 * (t * std::f64::consts::PI / 6.0).sin();
            let noise = 4.0 * (t * 1.7).sin() + 2.5 * (t * 0.37).cos();
            500.0 + 2.0 * t + season + noise
        })
        .collect()
}

fn assert_well_formed(forecast: &ForecastResult, horizon: usize) {
    assert_eq!(forecast.horizon(), horizon);
    assert_eq!(forecast.intervals.len(), 2);
    let narrow = forecast.interval(80).unwrap();
    let wide = forecast.interval(95).unwrap();
    for (i, value) in forecast.values.iter().enumerate() {
        assert!(value.is_finite());
        assert!(narrow.lower[i] <= *value && *value <= narrow.upper[i]);
        assert!(wide.lower[i] <= narrow.lower[i]);
        assert!(narrow.upper[i] <= wide.upper[i]);
    }
    for pair in wide.upper.windows(2).zip(forecast.values.windows(2)) {
        let (upper, values) = pair;
        assert!(upper[1] - values[1] >= upper[0] - values[0] - 1e-9);
    }
}

#[test]
fn test_auto_arima_model() {
    let data = create_test_data(60);
    let model = AutoArima::new(12);
    assert_eq!(model.name(), "AutoARIMA");

    let trained = model.train(&data).unwrap();
    let forecast = trained.forecast(12, &[80, 95]).unwrap();
    assert_well_formed(&forecast, 12);

    assert_eq!(trained.fitted_values().len(), data.len());
    assert_eq!(trained.residuals().len(), data.len());
    assert!(trained.describe().starts_with("ARIMA("));
}

#[test]
fn test_auto_arima_short_series() {
    let model = AutoArima::new(12);
    let trained = model.train(&[120.0, 80.0, 100.0, 140.0, 90.0]).unwrap();
    let forecast = trained.forecast(3, &[80, 95]).unwrap();
    assert_well_formed(&forecast, 3);
    // Fewer than two seasons leave no room for seasonal terms
    assert!(!trained.order.is_seasonal());
}

#[test]
fn test_fixed_order_sarima() {
    let data = create_test_data(48);
    let model = Sarima::new(SarimaOrder::new(1, 1, 0, 0, 1, 0, 12));
    assert_eq!(model.order().to_string(), "ARIMA(1,1,0)(0,1,0)[12]");

    let trained = model.train(&data).unwrap();
    let forecast = trained.forecast(6, &[80, 95]).unwrap();
    assert_well_formed(&forecast, 6);
    assert!(trained.sigma2 > 0.0);
}

#[test]
fn test_ets_model() {
    let data = create_test_data(36);
    let model = Ets::new(12);
    assert_eq!(model.name(), "ETS");

    let trained = model.train(&data).unwrap();
    assert_eq!(trained.kind, EtsKind::HoltWinters);
    let forecast = trained.forecast(12, &[80, 95]).unwrap();
    assert_well_formed(&forecast, 12);
}

#[test]
fn test_ets_without_full_seasons() {
    let trained = Ets::new(12).train(&[10.0, 12.0, 14.0, 16.0, 18.0]).unwrap();
    assert_eq!(trained.kind, EtsKind::Holt);
    let forecast = trained.forecast(2, &[80, 95]).unwrap();
    assert!(forecast.values[1] > forecast.values[0]);
}

#[test]
fn test_levels_and_quantiles() {
    assert_relative_eq!(z_value(95).unwrap(), 1.959964, epsilon = 1e-5);
    assert_relative_eq!(z_value(80).unwrap(), 1.281552, epsilon = 1e-5);

    let trained = Ets::new(12).train(&create_test_data(24)).unwrap();
    assert!(matches!(
        trained.forecast(3, &[100]),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(matches!(
        trained.forecast(3, &[0]),
        Err(ForecastError::InvalidParameter(_))
    ));
    assert!(trained.forecast(3, &[]).unwrap().intervals.is_empty());
}

#[test]
fn test_non_finite_input_rejected() {
    let data = vec![1.0, f64::NAN, 3.0];
    assert!(matches!(
        AutoArima::new(12).train(&data),
        Err(ForecastError::FitError(_))
    ));
    assert!(matches!(Ets::new(12).train(&data), Err(ForecastError::FitError(_))));
    assert!(matches!(Ets::new(12).train(&[]), Err(ForecastError::FitError(_))));
}
