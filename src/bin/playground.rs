//! Command-line walkthrough of the Sierra analytics stack.
//!
//! Prices a long-dated call three ways, simulates paths for a Monte Carlo VaR and
//! builds a long-only efficient frontier. Universes come from `name=path.csv`
//! arguments when given, otherwise from a seeded synthetic market. Set
//! `RUST_LOG=sierra=debug` to see engine diagnostics.

use std::error::Error;
use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use sierra::core::{to_json_pretty, AnalyticsConfig, PricingEngine, DEFAULT_PERIODS_PER_YEAR};
use sierra::engines::analytic::BlackScholesEngine;
use sierra::engines::cross_validate;
use sierra::instruments::OptionContract;
use sierra::market::{load_universe_csv, AlignmentPolicy, AssetUniverse, Market, PriceSeries};
use sierra::math::DenseMatrix;
use sierra::mc::{simulate, simulate_correlated_returns, SimulationConfig, StochasticProcessParams};
use sierra::portfolio::{efficient_branch, OptimizerConfig, PortfolioOptimizer};
use sierra::risk::{RiskConfig, RiskReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const SYNTHETIC_DAYS: usize = 750;

fn synthetic_universe(seed: u64) -> AppResult<AssetUniverse> {
    let names = ["bonds", "credit", "equity", "reits"];
    let daily_mean = [0.00015, 0.00025, 0.00035, 0.0003];
    let cov = DenseMatrix::from_rows(&[
        vec![2.5e-5, 1.0e-5, -2.0e-6, 4.0e-6],
        vec![1.0e-5, 4.0e-5, 2.0e-5, 1.5e-5],
        vec![-2.0e-6, 2.0e-5, 1.4e-4, 8.0e-5],
        vec![4.0e-6, 1.5e-5, 8.0e-5, 1.8e-4],
    ])?;
    let returns = simulate_correlated_returns(&daily_mean, &cov, SYNTHETIC_DAYS, seed)?;

    let start = NaiveDate::from_ymd_opt(2022, 1, 3).ok_or("invalid start date")?;
    let series = names
        .iter()
        .enumerate()
        .map(|(asset, name)| {
            let mut price = 100.0;
            let mut observations = vec![(start, price)];
            for day in 0..SYNTHETIC_DAYS {
                price *= returns.get(day, asset).exp();
                let date = start
                    .checked_add_days(Days::new(day as u64 + 1))
                    .ok_or("date overflow")?;
                observations.push((date, price));
            }
            Ok(PriceSeries::new(*name, observations)?)
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(AssetUniverse::from_prices(series, AlignmentPolicy::Strict)?)
}

fn universe_from_args(args: &[String]) -> AppResult<AssetUniverse> {
    let files = args
        .iter()
        .map(|arg| {
            let (name, path) = arg
                .split_once('=')
                .ok_or_else(|| format!("expected NAME=PATH, got `{arg}`"))?;
            Ok((name.to_string(), PathBuf::from(path)))
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(load_universe_csv(&files, AlignmentPolicy::InnerJoin)?)
}

fn run() -> AppResult<()> {
    let config = AnalyticsConfig::default();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let market = Market::builder()
        .spot(421.0)
        .rate(0.03)
        .flat_vol(0.15)
        .build()?;
    let call = OptionContract::european_call(350.0, 5.0)?;
    let closed_form = BlackScholesEngine::new().price(&call, &market)?;
    println!("Black-Scholes call:\n{}", to_json_pretty(&closed_form)?);

    let check = cross_validate(&call, &market, 1e-3)?;
    println!("Cross-validation:\n{}", to_json_pretty(&check)?);

    let params = StochasticProcessParams::new(0.07, 0.18, config.risk_free_rate, 1.0, 252, 20_000)?;
    let sim_config = SimulationConfig::from(&config).with_antithetic(true);
    let paths = simulate(&params, 100.0, &sim_config)?;
    let report = RiskReport::monte_carlo(&paths, config.confidence, &RiskConfig::from(&config))?;
    println!("Simulated one-year risk:\n{}", to_json_pretty(&report)?);

    let universe = if args.is_empty() {
        synthetic_universe(config.seed.unwrap_or(42))?
    } else {
        universe_from_args(&args)?
    };
    info!(assets = universe.n_assets(), returns = universe.n_returns(), "universe ready");

    let optimizer = PortfolioOptimizer::from_universe(
        &universe,
        DEFAULT_PERIODS_PER_YEAR,
        OptimizerConfig::from(&config),
    )?;
    let tangency = optimizer.max_sharpe()?;
    println!("Maximum Sharpe portfolio:\n{}", to_json_pretty(&tangency)?);

    let frontier = efficient_branch(&optimizer, 12)?;
    println!("{:>10} {:>10} {:>10}", "return", "risk", "sharpe");
    for point in &frontier {
        println!(
            "{:>10.4} {:>10.4} {:>10.3}",
            point.expected_return, point.risk, point.sharpe
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    if let Err(err) = run() {
        eprintln!("sierra-playground failed: {err}");
        std::process::exit(1);
    }
}
