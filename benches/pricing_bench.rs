use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sierra::core::PricingEngine;
use sierra::engines::analytic::{implied_volatility, BlackScholesEngine};
use sierra::engines::tree::BinomialTreeEngine;
use sierra::instruments::OptionContract;
use sierra::market::Market;
use sierra::math::DenseMatrix;
use sierra::portfolio::{efficient_frontier, OptimizerConfig, PortfolioOptimizer};
use std::hint::black_box;

// Performance goals (guideline, measured on target hardware):
// - Black-Scholes European call with greeks: < 200 ns
// - American binomial (500 steps, smoothed, greeks): < 5 ms
// - 50-point long-only frontier on 10 assets: < 50 ms

fn benchmark_market() -> Market {
    Market::builder()
        .spot(100.0)
        .rate(0.05)
        .dividend_yield(0.0)
        .flat_vol(0.20)
        .build()
        .expect("benchmark market should be valid")
}

fn bench_black_scholes(c: &mut Criterion) {
    let market = benchmark_market();
    let option = OptionContract::european_call(100.0, 1.0).expect("contract should be valid");
    let engine = BlackScholesEngine::new();
    c.bench_function("black_scholes_european_call", |b| {
        b.iter(|| {
            let px = engine
                .price(black_box(&option), black_box(&market))
                .expect("pricing should succeed")
                .price;
            black_box(px)
        })
    });

    let target = engine.price(&option, &market.with_vol(0.35)).expect("pricing should succeed").price;
    c.bench_function("implied_volatility", |b| {
        b.iter(|| black_box(implied_volatility(&option, &market, black_box(target)).expect("iv")))
    });
}

fn bench_binomial_american(c: &mut Criterion) {
    let market = benchmark_market();
    let option = OptionContract::american_put(100.0, 1.0).expect("contract should be valid");
    let mut group = c.benchmark_group("binomial_american_put");
    for steps in [100, 500, 1000].iter() {
        let engine = BinomialTreeEngine::new(*steps);
        group.bench_with_input(BenchmarkId::from_parameter(steps), steps, |b, _| {
            b.iter(|| {
                let px = engine
                    .price(black_box(&option), black_box(&market))
                    .expect("pricing should succeed")
                    .price;
                black_box(px)
            })
        });
    }
    group.finish();
}

fn bench_frontier(c: &mut Criterion) {
    let n = 10;
    let mut cov = DenseMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            let vol_i = 0.1 + 0.02 * i as f64;
            let vol_j = 0.1 + 0.02 * j as f64;
            let rho = if i == j { 1.0 } else { 0.3 };
            cov.set(i, j, rho * vol_i * vol_j);
        }
    }
    let names: Vec<String> = (0..n).map(|i| format!("asset{i}")).collect();
    let mean: Vec<f64> = (0..n).map(|i| 0.03 + 0.01 * i as f64).collect();
    let optimizer = PortfolioOptimizer::new(names, mean, cov, OptimizerConfig::default())
        .expect("optimizer should be valid");
    c.bench_function("long_only_frontier_50", |b| {
        b.iter(|| black_box(efficient_frontier(black_box(&optimizer), 50).expect("frontier")))
    });
}

criterion_group!(benches, bench_black_scholes, bench_binomial_american, bench_frontier);
criterion_main!(benches);
