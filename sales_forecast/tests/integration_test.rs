use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rusqlite::{params, Connection};
use sales_forecast::aggregate::GapFill;
use sales_forecast::config::{PipelineConfig, SourceKind};
use sales_forecast::error::ForecastError;
use sales_forecast::pipeline::{run, run_with_source};
use sales_forecast::source::SqliteSource;
use std::path::Path;
use tempfile::TempDir;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn create_schema(conn: &Connection) {
    conn.execute_batch(
        r#"
        CREATE TABLE bikes ("bike.id" INTEGER, "model" TEXT, "description" TEXT, "price" REAL);
        CREATE TABLE bikeshops ("bikeshop.id" INTEGER, "bikeshop.name" TEXT, "location" TEXT);
        CREATE TABLE orderlines (
            "Unnamed: 0" INTEGER, "order.id" INTEGER, "order.line" INTEGER, "order.date" TEXT,
            "customer.id" INTEGER, "product.id" INTEGER, "quantity" INTEGER
        );
        INSERT INTO bikeshops VALUES (1, 'Ithaca Mountain Climbers', 'Ithaca, NY');
        "#,
    )
    .unwrap();
}

fn insert_order(conn: &Connection, id: i64, date: &str, product: i64, quantity: i64) {
    conn.execute(
        "INSERT INTO orderlines VALUES (?1, ?2, 1, ?3, 1, ?4, ?5)",
        params![id - 1, id, date, product, quantity],
    )
    .unwrap();
}

/// One bike, three months of orders
fn create_mountain_database(path: &Path) {
    let conn = Connection::open(path).unwrap();
    create_schema(&conn);
    conn.execute(
        "INSERT INTO bikes VALUES (1, 'Scalpel 29 Carbon Race', 'Mountain - Cross Country Race - Carbon', 50.0)",
        [],
    )
    .unwrap();
    insert_order(&conn, 1, "2020-01-10", 1, 2);
    insert_order(&conn, 2, "2020-02-05", 1, 3);
    insert_order(&conn, 3, "2020-03-20", 1, 4);
}

/// Two bikes over four years with a gap month per category
fn create_bikeshop_database(path: &Path) {
    let conn = Connection::open(path).unwrap();
    create_schema(&conn);
    conn.execute_batch(
        r#"
        INSERT INTO bikes VALUES (1, 'Jekyll Carbon 2', 'Mountain - Over Mountain - Carbon', 6070.0);
        INSERT INTO bikes VALUES (2, 'CAAD12 Red', 'Road - Elite Road - Aluminum', 1680.0);
        "#,
    )
    .unwrap();

    let mut id = 1;
    for year in 2011..2015 {
        for month in 1..=12u32 {
            for product in 1..=2i64 {
                if year == 2012 && month == 6 && product == 2 {
                    continue;
                }
                let quantity = 1 + ((year as i64 * 7 + month as i64 * 3 + product) % 5);
                let date = format!("{}-{:02}-{:02}", year, month, 3 + product * 5);
                insert_order(&conn, id, &date, product, quantity);
                id += 1;
            }
        }
    }
}

fn config_for(dir: &TempDir, database: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data.source = SourceKind::Sqlite;
    config.data.path = database.to_path_buf();
    config.forecast.checkpoint = dir.path().join("models").join("arima.json");
    config
}

#[test]
fn test_three_month_category_forecasts_one_month() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("bikeshop_database.sqlite");
    create_mountain_database(&database);

    let mut config = config_for(&dir, &database);
    config.forecast.horizon = 1;
    let output = run(&config).unwrap();

    assert_eq!(output.records.len(), 3);
    assert_eq!(output.monthly.len(), 3);
    assert_eq!(output.monthly[0].group, "Cross Country Race");
    assert_eq!(output.monthly[0].value, Some(100.0));
    assert_eq!(output.monthly[2].value, Some(200.0));

    assert_eq!(output.forecasts.len(), 1);
    let point = &output.forecasts.points[0];
    assert_eq!(point.unique_id, "Cross Country Race");
    assert_eq!(point.ds, ymd(2020, 4, 1));
    assert!(point.point.is_finite());
    for interval in &point.intervals {
        assert!(interval.lower <= point.point && point.point <= interval.upper);
    }
    assert!(config.forecast.checkpoint.is_file());
}

#[test]
fn test_full_pipeline_with_exports_and_checkpoint_reuse() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("bikeshop_database.sqlite");
    create_bikeshop_database(&database);

    let mut config = config_for(&dir, &database);
    config.forecast.n_jobs = 2;
    config.output.dir = Some(dir.path().join("out"));

    let output = run(&config).unwrap();
    assert_eq!(output.series.len(), 2);
    let ids: Vec<&str> = output.series.iter().map(|s| s.unique_id.as_str()).collect();
    assert_eq!(ids, vec!["Elite Road", "Over Mountain"]);

    // The missing Elite Road month is filled with zero before fitting
    let elite = &output.series[0];
    assert_eq!(elite.len(), 48);
    assert_eq!(elite.values[17], Some(0.0));

    assert_eq!(output.forecasts.len(), 24);
    let first = output.forecasts.for_series("Over Mountain").next().unwrap();
    assert_eq!(first.ds, ymd(2015, 1, 1));

    for name in ["sales_records.csv", "monthly_sales.csv", "forecasts.csv", "forecast_plot.csv"] {
        assert!(dir.path().join("out").join(name).is_file(), "missing {}", name);
    }
    let forecasts_csv = std::fs::read_to_string(dir.path().join("out").join("forecasts.csv")).unwrap();
    assert!(forecasts_csv.starts_with("unique_id,ds,AutoARIMA,AutoARIMA-lo-80"));
    assert_eq!(forecasts_csv.lines().count(), 25);

    let mut reuse = config.clone();
    reuse.forecast.reuse_checkpoint = true;
    reuse.output.dir = None;
    let reused = run(&reuse).unwrap();
    assert_eq!(reused.forecasts, output.forecasts);
}

#[test]
fn test_gaps_left_in_place_fail_the_fit() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("bikeshop_database.sqlite");
    create_bikeshop_database(&database);

    let mut config = config_for(&dir, &database);
    config.aggregation.gap_fill = GapFill::None;

    let source = SqliteSource::open(&database).unwrap();
    match run_with_source(&source, &config) {
        Err(ForecastError::FitError(message)) => assert!(message.contains("fill gaps")),
        other => panic!("Expected FitError, got {:?}", other.map(|o| o.forecasts.len())),
    }
    source.close().unwrap();
    assert!(!config.forecast.checkpoint.exists());
}

#[test]
fn test_missing_database() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir, &dir.path().join("absent.sqlite"));
    assert!(matches!(run(&config), Err(ForecastError::ConnectionError(_))));
}

#[test]
fn test_missing_checkpoint_on_reuse() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("bikeshop_database.sqlite");
    create_mountain_database(&database);

    let mut config = config_for(&dir, &database);
    config.forecast.reuse_checkpoint = true;
    assert!(matches!(run(&config), Err(ForecastError::IoError(_))));
}
