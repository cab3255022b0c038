//! CSV loading, alignment and moment estimation on files written to a temp dir.

use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use proptest::prelude::*;
use sierra::core::{ErrorCategory, QuantError};
use sierra::market::{
    covariance, load_price_csv, load_universe_csv, AlignmentPolicy, AssetUniverse,
    GbmCalibration, Market, PriceSeries,
};
use sierra::mc::{simulate, SimulationConfig, StochasticProcessParams};
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, rows: &[(&str, f64)]) -> PathBuf {
    let mut body = String::from("date,price\n");
    for (date, price) in rows {
        body.push_str(&format!("{date},{price}\n"));
    }
    let path = dir.path().join(format!("{name}.csv"));
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn inner_join_keeps_common_dates_only() {
    let dir = TempDir::new().unwrap();
    let spy = write_csv(
        &dir,
        "spy",
        &[
            ("2024-01-02", 470.0),
            ("2024-01-03", 468.8),
            ("2024-01-04", 467.3),
            ("2024-01-05", 467.9),
            ("2024-01-08", 474.6),
        ],
    );
    // Missing 2024-01-04 and listed out of order.
    let tlt = write_csv(
        &dir,
        "tlt",
        &[
            ("2024-01-08", 97.1),
            ("2024-01-02", 97.9),
            ("2024-01-05", 96.2),
            ("2024-01-03", 97.5),
        ],
    );
    let files = vec![("SPY".to_string(), spy), ("TLT".to_string(), tlt)];

    let universe = load_universe_csv(&files, AlignmentPolicy::InnerJoin).unwrap();
    assert_eq!(universe.names(), ["SPY", "TLT"]);
    assert_eq!(universe.dates().len(), 4);
    assert_eq!(universe.n_returns(), 3);
    assert_relative_eq!(
        universe.returns(0)[2],
        (474.6_f64 / 467.9).ln(),
        epsilon = 1e-15
    );

    assert!(matches!(
        load_universe_csv(&files, AlignmentPolicy::Strict),
        Err(QuantError::Alignment(_))
    ));
}

#[test]
fn io_and_parse_failures_keep_their_category() {
    let dir = TempDir::new().unwrap();
    let missing = load_price_csv(dir.path().join("nope.csv"), "X").unwrap_err();
    assert_eq!(missing.category(), ErrorCategory::Io);

    let bad = write_csv(&dir, "bad", &[("2024-01-02", 10.0), ("not-a-date", 11.0)]);
    let err = load_price_csv(&bad, "X").unwrap_err();
    assert!(matches!(err, QuantError::Csv { .. }));

    let negative = write_csv(&dir, "neg", &[("2024-01-02", 10.0), ("2024-01-03", -1.0)]);
    assert!(matches!(
        load_price_csv(&negative, "X"),
        Err(QuantError::InvalidParameter { .. })
    ));

    let duplicate = write_csv(&dir, "dup", &[("2024-01-02", 10.0), ("2024-01-02", 11.0)]);
    assert!(matches!(
        load_price_csv(&duplicate, "X"),
        Err(QuantError::Alignment(_))
    ));
}

#[test]
fn calibration_recovers_simulated_volatility() {
    let params = StochasticProcessParams::new(0.08, 0.25, 0.0, 10.0, 2_520, 1).unwrap();
    let paths = simulate(&params, 100.0, &SimulationConfig::default().with_seed(21)).unwrap();
    let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
    let observations = paths
        .row(0)
        .iter()
        .enumerate()
        .map(|(i, p)| (start + chrono::Days::new(i as u64), *p))
        .collect();
    let series = PriceSeries::new("SIM", observations).unwrap();

    let fit = GbmCalibration::from_daily(&series).unwrap();
    assert!((fit.volatility - 0.25).abs() < 0.015, "vol {}", fit.volatility);

    let market = Market::calibrated(&series, 0.03, 252.0).unwrap();
    assert_relative_eq!(market.vol(), fit.volatility, epsilon = 1e-15);
    assert_eq!(market.spot(), *paths.row(0).last().unwrap());
    assert_eq!(market.rate(), 0.03);
}

fn series_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (2usize..5, 4usize..40).prop_flat_map(|(assets, len)| {
        prop::collection::vec(prop::collection::vec(1.0f64..500.0, len), assets)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn covariance_is_exactly_symmetric(prices in series_strategy()) {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let series = prices.iter().enumerate().map(|(a, p)| {
            let obs = p
                .iter()
                .enumerate()
                .map(|(i, x)| (start + chrono::Days::new(i as u64), *x))
                .collect();
            PriceSeries::new(format!("asset{a}"), obs).unwrap()
        });
        let universe = AssetUniverse::from_prices(series, AlignmentPolicy::Strict).unwrap();
        let cov = covariance(&universe);
        for i in 0..cov.rows() {
            prop_assert!(cov.get(i, i) >= 0.0);
            for j in 0..cov.cols() {
                prop_assert_eq!(cov.get(i, j).to_bits(), cov.get(j, i).to_bits());
            }
        }
    }
}
