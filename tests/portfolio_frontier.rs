//! Mean-variance optimiser and frontier properties.
//!
//! Where the unconstrained Lagrange solution is already long-only, the active-set
//! solver must reproduce it; bounded solutions must stay inside the box and on the
//! budget.

use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use sierra::core::{write_frontier_csv, QuantError};
use sierra::market::shrink_covariance;
use sierra::math::DenseMatrix;
use sierra::portfolio::{
    efficient_branch, efficient_frontier, OptimizerConfig, PortfolioOptimizer,
};

fn three_assets(config: OptimizerConfig) -> PortfolioOptimizer {
    let cov = DenseMatrix::from_rows(&[
        vec![0.04, 0.006, 0.002],
        vec![0.006, 0.09, 0.009],
        vec![0.002, 0.009, 0.16],
    ])
    .unwrap();
    PortfolioOptimizer::new(
        vec!["A".into(), "B".into(), "C".into()],
        vec![0.05, 0.08, 0.12],
        cov,
        config,
    )
    .unwrap()
}

#[test]
fn active_set_matches_lagrange_when_no_bound_binds() {
    let long_only = three_assets(OptimizerConfig::default());
    let free = three_assets(OptimizerConfig::default().with_long_only(false));
    for target in [0.07, 0.08, 0.09] {
        let bounded = long_only.minimize_variance(target).unwrap();
        let closed = free.minimize_variance(target).unwrap();
        assert!(bounded.warning.is_none());
        for (a, b) in bounded.weights.values().iter().zip(closed.weights.values()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }
    let expected = [0.3976648351648347, 0.30408653846153816, 0.2982486263736261];
    let at_eight = free.minimize_variance(0.08).unwrap();
    for (w, e) in at_eight.weights.values().iter().zip(expected) {
        assert_abs_diff_eq!(*w, e, epsilon = 1e-12);
    }
}

#[test]
fn bounded_tangency_agrees_with_the_closed_form() {
    let expected = [0.4338028755123698, 0.2932523251700963, 0.27294479931753396];
    let closed = three_assets(OptimizerConfig::default().with_long_only(false))
        .max_sharpe()
        .unwrap();
    let scanned = three_assets(OptimizerConfig::default()).max_sharpe().unwrap();
    for ((c, s), e) in closed
        .weights
        .values()
        .iter()
        .zip(scanned.weights.values())
        .zip(expected)
    {
        assert_abs_diff_eq!(*c, e, epsilon = 1e-12);
        assert_abs_diff_eq!(*s, e, epsilon = 1e-5);
    }
    assert!(scanned.sharpe <= closed.sharpe + 1e-12);
}

#[test]
fn long_only_frontier_risk_rises_away_from_the_minimum() {
    let opt = three_assets(OptimizerConfig::default());
    let gmv = opt.global_minimum_variance().unwrap();
    assert_abs_diff_eq!(gmv.expected_return, 0.06722758427752133, epsilon = 1e-10);

    let frontier = efficient_frontier(&opt, 30).unwrap();
    assert!(frontier
        .windows(2)
        .all(|w| w[0].expected_return < w[1].expected_return));
    for point in &frontier {
        assert!(point.risk >= gmv.risk - 1e-12);
    }
    let branch = efficient_branch(&opt, 15).unwrap();
    assert!(branch.windows(2).all(|w| w[1].risk >= w[0].risk - 1e-12));
    // The top of the long-only range is the single best asset.
    let top = frontier.last().unwrap();
    assert_abs_diff_eq!(top.weights.get("C").unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn max_weight_caps_every_frontier_point() {
    let opt = three_assets(OptimizerConfig::default().with_bounds(None, Some(0.5)));
    let (lo, hi) = opt.return_range().unwrap();
    assert_abs_diff_eq!(lo, 0.5 * 0.05 + 0.5 * 0.08, epsilon = 1e-15);
    assert_abs_diff_eq!(hi, 0.5 * 0.12 + 0.5 * 0.08, epsilon = 1e-15);
    for point in efficient_frontier(&opt, 12).unwrap() {
        assert!(point.weights.values().iter().all(|w| *w <= 0.5 + 1e-12 && *w >= -1e-12));
        assert_abs_diff_eq!(point.weights.sum(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.expected_return, point.target_return, epsilon = 1e-9);
    }
    assert!(matches!(
        opt.minimize_variance(0.11),
        Err(QuantError::InvalidParameter { name: "target_return", .. })
    ));
}

#[test]
fn singular_covariance_is_reported_and_shrinkage_repairs_it() {
    // Third asset is an exact blend of the first two.
    let cov = DenseMatrix::from_rows(&[
        vec![0.04, 0.01, 0.025],
        vec![0.01, 0.09, 0.05],
        vec![0.025, 0.05, 0.0375],
    ])
    .unwrap();
    let names: Vec<String> = vec!["X".into(), "Y".into(), "Z".into()];
    let mean = vec![0.04, 0.09, 0.065];
    let config = OptimizerConfig::default().with_long_only(false);
    let singular = PortfolioOptimizer::new(names.clone(), mean.clone(), cov.clone(), config).unwrap();
    assert!(matches!(
        singular.global_minimum_variance(),
        Err(QuantError::SingularCovariance { .. })
    ));

    let repaired = PortfolioOptimizer::new(names, mean, shrink_covariance(&cov, 0.1).unwrap(), config)
        .unwrap();
    let gmv = repaired.global_minimum_variance().unwrap();
    assert_abs_diff_eq!(gmv.weights.sum(), 1.0, epsilon = 1e-9);
}

#[test]
fn frontier_exports_one_csv_row_per_point() {
    let opt = three_assets(OptimizerConfig::default());
    let frontier = efficient_frontier(&opt, 5).unwrap();
    let mut buffer = Vec::new();
    write_frontier_csv(&mut buffer, &frontier).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "target_return,expected_return,risk,sharpe,value_at_risk,A,B,C"
    );
    assert_eq!(lines.count(), 5);
}

#[test]
fn equal_expected_returns_give_a_single_point_frontier() {
    let cov = DenseMatrix::from_rows(&[vec![0.04, 0.0], vec![0.0, 0.09]]).unwrap();
    let opt = PortfolioOptimizer::new(
        vec!["A".into(), "B".into()],
        vec![0.07, 0.07],
        cov,
        OptimizerConfig::default(),
    )
    .unwrap();
    let gmv = opt.global_minimum_variance().unwrap();
    let at_mean = opt.minimize_variance(0.07).unwrap();
    for (a, b) in at_mean.weights.values().iter().zip(gmv.weights.values()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(at_mean.weights.get("A").unwrap(), 0.09 / 0.13, epsilon = 1e-12);

    let frontier = efficient_frontier(&opt, 4).unwrap();
    assert_eq!(frontier.len(), 4);
    for point in &frontier {
        assert_abs_diff_eq!(point.expected_return, 0.07, epsilon = 1e-12);
        assert_abs_diff_eq!(point.risk, gmv.risk, epsilon = 1e-12);
    }
}

fn covariance_strategy(n: usize) -> impl Strategy<Value = DenseMatrix> {
    prop::collection::vec(-0.3f64..0.3, n * n).prop_map(move |raw| {
        // B Bᵀ + 0.01 I is symmetric positive definite.
        let mut cov = DenseMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..=i {
                let mut v: f64 = (0..n).map(|k| raw[i * n + k] * raw[j * n + k]).sum();
                if i == j {
                    v += 0.01;
                }
                cov.set(i, j, v);
                cov.set(j, i, v);
            }
        }
        cov
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn optimal_weights_sum_to_one_and_respect_bounds(
        cov in covariance_strategy(4),
        mean in prop::collection::vec(0.0f64..0.2, 4),
        fraction in 0.05f64..0.95,
        cap in prop_oneof![Just(None), Just(Some(0.4)), Just(Some(0.6))],
    ) {
        let names: Vec<String> = (0..4).map(|i| format!("asset{i}")).collect();
        let config = OptimizerConfig::default().with_bounds(None, cap);
        let opt = PortfolioOptimizer::new(names, mean, cov, config).unwrap();
        let (lo, hi) = opt.return_range().unwrap();
        let target = lo + fraction * (hi - lo);
        let p = opt.minimize_variance(target).unwrap();
        let upper = cap.unwrap_or(f64::INFINITY);
        prop_assert!((p.weights.sum() - 1.0).abs() < 1e-9);
        prop_assert!(p.weights.values().iter().all(|w| *w >= -1e-12 && *w <= upper + 1e-12));
        prop_assert!((p.expected_return - target).abs() < 1e-8);
    }
}
