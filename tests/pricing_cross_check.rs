//! Cross-engine pricing checks.
//!
//! Closed form, CRR lattice and Monte Carlo must agree on European vanillas:
//! - put-call parity `C - P = S e^{-qT} - K e^{-rT}` to 1e-6 on the closed form,
//! - the 500-step lattice within 1e-3 at the money (S=K=100, r=5%, vol=20%, T=1),
//! - 100,000 antithetic Monte Carlo paths within three standard errors.

use approx::assert_abs_diff_eq;
use sierra::core::{
    BarrierDirection, BarrierSpec, BarrierStyle, ExerciseStyle, OptionType, PricingEngine,
    QuantError,
};
use sierra::engines::analytic::{bs_price, BlackScholesEngine};
use sierra::engines::tree::BinomialTreeEngine;
use sierra::engines::{cross_validate, MonteCarloPricingEngine, PricingMethod, VarianceReduction};
use sierra::instruments::{OptionContract, PathPayoff};
use sierra::market::Market;

fn hull_market() -> Market {
    Market::builder()
        .spot(100.0)
        .rate(0.05)
        .flat_vol(0.20)
        .build()
        .unwrap()
}

#[test]
fn put_call_parity_holds_across_strikes_and_dividends() {
    for &(strike, q, expiry) in &[(80.0, 0.0, 0.5), (100.0, 0.02, 1.0), (125.0, 0.04, 2.5)] {
        let spot = 100.0;
        let rate = 0.05;
        let call = bs_price(OptionType::Call, spot, strike, rate, q, 0.25, expiry);
        let put = bs_price(OptionType::Put, spot, strike, rate, q, 0.25, expiry);
        let forward_value = spot * (-q * expiry).exp() - strike * (-rate * expiry).exp();
        assert_abs_diff_eq!(call - put, forward_value, epsilon = 1e-6);
    }
}

#[test]
fn lattice_converges_to_closed_form_at_the_money() {
    let market = hull_market();
    for contract in [
        OptionContract::european_call(100.0, 1.0).unwrap(),
        OptionContract::european_put(100.0, 1.0).unwrap(),
    ] {
        let closed = BlackScholesEngine::new().price(&contract, &market).unwrap();
        let tree = BinomialTreeEngine::new(500).price(&contract, &market).unwrap();
        assert_abs_diff_eq!(tree.price, closed.price, epsilon = 1e-3);
    }
}

#[test]
fn monte_carlo_lands_within_three_standard_errors() {
    let market = hull_market();
    let engine = MonteCarloPricingEngine::new(100_000, 1, 2024)
        .with_variance_reduction(VarianceReduction::Antithetic);
    for contract in [
        OptionContract::european_call(100.0, 1.0).unwrap(),
        OptionContract::european_put(95.0, 1.0).unwrap(),
    ] {
        let closed = BlackScholesEngine::new().price(&contract, &market).unwrap();
        let mc = engine.price(&contract, &market).unwrap();
        let se = mc.stderr.unwrap();
        assert!(se > 0.0);
        assert!(
            (mc.price - closed.price).abs() <= 3.0 * se,
            "mc={} closed={} se={se}",
            mc.price,
            closed.price
        );
    }
}

#[test]
fn three_standard_error_coverage_holds_across_seeds_and_batch_sizes() {
    let market = hull_market();
    let call = OptionContract::european_call(100.0, 1.0).unwrap();
    let closed = BlackScholesEngine::new().price(&call, &market).unwrap().price;
    let seeds = 1..=60_u64;
    let trials = seeds.clone().count();

    for batch_size in [1_024, 250] {
        let mut covered = 0;
        let mut z_sum = 0.0;
        for seed in seeds.clone() {
            let mc = MonteCarloPricingEngine::new(20_000, 1, seed)
                .with_variance_reduction(VarianceReduction::Antithetic)
                .with_batch_size(batch_size)
                .price(&call, &market)
                .unwrap();
            let z = (mc.price - closed) / mc.stderr.unwrap();
            if z.abs() <= 3.0 {
                covered += 1;
            }
            z_sum += z;
        }
        assert!(
            covered as f64 >= 0.95 * trials as f64,
            "batch {batch_size}: {covered}/{trials} within three standard errors"
        );
        // Mean z-score of independent trials has standard deviation 1/sqrt(60).
        let mean_z = z_sum / trials as f64;
        assert!(mean_z.abs() < 0.5, "batch {batch_size}: mean z {mean_z}");
    }
}

#[test]
fn cross_validate_reports_every_default_engine() {
    let check = cross_validate(
        &OptionContract::european_call(100.0, 1.0).unwrap(),
        &hull_market(),
        1e-3,
    )
    .unwrap();
    assert!(check.agrees(), "{check:?}");
    let names: Vec<&str> = check.prices.iter().map(|p| p.method).collect();
    assert_eq!(names, ["lattice", "monte_carlo"]);
}

#[test]
fn early_exercise_premium_is_non_negative() {
    let market = hull_market();
    let tree = BinomialTreeEngine::new(400);
    for &strike in &[90.0, 100.0, 110.0] {
        for option_type in [OptionType::Call, OptionType::Put] {
            let european = OptionContract::new(option_type, strike, 1.0, ExerciseStyle::European).unwrap();
            let american = european.with_exercise(ExerciseStyle::American);
            let e = tree.price(&european, &market).unwrap().price;
            let a = tree.price(&american, &market).unwrap().price;
            assert!(a >= e - 1e-12, "{option_type:?} K={strike}: american {a} < european {e}");
        }
    }
}

#[test]
fn pricing_method_dispatch_matches_direct_engines() {
    let market = hull_market();
    let put = OptionContract::european_put(100.0, 1.0).unwrap();
    let direct = BlackScholesEngine::new().price(&put, &market).unwrap().price;
    let via_method = PricingMethod::ClosedForm.price(&put, &market).unwrap().price;
    assert_eq!(direct, via_method);

    let lattice = PricingMethod::Lattice { steps: 200 }.price(&put, &market).unwrap();
    assert_eq!(
        lattice.price,
        BinomialTreeEngine::new(200).price(&put, &market).unwrap().price
    );
}

#[test]
fn knock_in_plus_knock_out_replicates_the_vanilla_on_shared_paths() {
    let market = hull_market();
    let call = OptionContract::european_call(100.0, 1.0).unwrap();
    let barrier = |style| BarrierSpec {
        direction: BarrierDirection::Up,
        style,
        level: 120.0,
        rebate: 0.0,
    };
    let engine = MonteCarloPricingEngine::new(20_000, 50, 11);
    let vanilla = engine.price(&call, &market).unwrap().price;
    let knock_in = engine
        .clone()
        .with_payoff(PathPayoff::Barrier(barrier(BarrierStyle::In)))
        .price(&call, &market)
        .unwrap()
        .price;
    let knock_out = engine
        .with_payoff(PathPayoff::Barrier(barrier(BarrierStyle::Out)))
        .price(&call, &market)
        .unwrap()
        .price;
    assert_abs_diff_eq!(knock_in + knock_out, vanilla, epsilon = 1e-9);
    assert!(knock_out < vanilla);
}

#[test]
fn style_and_parameter_errors_are_typed() {
    let market = hull_market();
    let american = OptionContract::american_put(100.0, 1.0).unwrap();
    assert!(matches!(
        BlackScholesEngine::new().price(&american, &market),
        Err(QuantError::UnsupportedStyle(_))
    ));
    assert!(matches!(
        MonteCarloPricingEngine::new(1_000, 1, 1).price(&american, &market),
        Err(QuantError::UnsupportedStyle(_))
    ));
    assert!(matches!(
        cross_validate(&american, &market, 1e-3),
        Err(QuantError::UnsupportedStyle(_))
    ));

    // Rate far above the per-step volatility move pushes p above one.
    let drifting = Market::builder()
        .spot(100.0)
        .rate(2.0)
        .flat_vol(0.05)
        .build()
        .unwrap();
    assert!(matches!(
        BinomialTreeEngine::new(10).price(&american, &drifting),
        Err(QuantError::Arbitrage { .. })
    ));

    assert!(OptionContract::european_call(0.0, 1.0).is_err());
    assert!(OptionContract::european_call(100.0, -1.0).is_err());
}
