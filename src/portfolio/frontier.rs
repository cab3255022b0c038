//! Efficient-frontier sweeps.
//!
//! Targets are spaced evenly over the achievable return range and solved
//! independently in parallel; the output is ordered by target return.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::core::{ConvergenceWarning, QuantError, Result};
use crate::portfolio::mean_variance::{OptimizedPortfolio, PortfolioOptimizer};
use crate::portfolio::weights::PortfolioWeights;

/// One solved point on the frontier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontierPoint {
    pub target_return: f64,
    pub expected_return: f64,
    /// Standard deviation of the portfolio return.
    pub risk: f64,
    pub variance: f64,
    pub sharpe: f64,
    pub value_at_risk: f64,
    pub weights: PortfolioWeights,
    pub warning: Option<ConvergenceWarning>,
}

impl FrontierPoint {
    fn from_portfolio(target_return: f64, p: OptimizedPortfolio) -> Self {
        Self {
            target_return,
            expected_return: p.expected_return,
            risk: p.risk,
            variance: p.variance,
            sharpe: p.sharpe,
            value_at_risk: p.value_at_risk,
            weights: p.weights,
            warning: p.warning,
        }
    }
}

/// `points` evenly spaced targets over `[lo, hi]`, both ends included.
fn targets(lo: f64, hi: f64, points: usize) -> Vec<f64> {
    let step = (hi - lo) / (points - 1) as f64;
    (0..points)
        .map(|k| if k + 1 == points { hi } else { lo + step * k as f64 })
        .collect()
}

/// Frontier over `[lo, hi]` with `points` targets.
///
/// # Errors
/// [`QuantError::InvalidParameter`] for fewer than two points or an inverted range,
/// plus any error from the individual solves.
pub fn frontier_between(
    optimizer: &PortfolioOptimizer,
    lo: f64,
    hi: f64,
    points: usize,
) -> Result<Vec<FrontierPoint>> {
    if points < 2 {
        return Err(QuantError::invalid("points", "a frontier needs at least two points"));
    }
    if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
        return Err(QuantError::invalid(
            "target_return",
            format!("invalid return range [{lo}, {hi}]"),
        ));
    }
    debug!(lo, hi, points, "sweeping efficient frontier");
    targets(lo, hi, points)
        .into_par_iter()
        .map(|t| {
            optimizer
                .minimize_variance(t)
                .map(|p| FrontierPoint::from_portfolio(t, p))
        })
        .collect()
}

/// Frontier across the optimiser's full achievable return range.
///
/// # Examples
/// ```
/// use sierra::math::DenseMatrix;
/// use sierra::portfolio::{efficient_frontier, OptimizerConfig, PortfolioOptimizer};
///
/// let cov = DenseMatrix::from_rows(&[vec![0.04, 0.01], vec![0.01, 0.09]]).unwrap();
/// let optimizer = PortfolioOptimizer::new(
///     vec!["bonds".into(), "stocks".into()],
///     vec![0.04, 0.09],
///     cov,
///     OptimizerConfig::default(),
/// )
/// .unwrap();
/// let frontier = efficient_frontier(&optimizer, 11).unwrap();
/// assert_eq!(frontier.len(), 11);
/// assert!(frontier.windows(2).all(|w| w[0].target_return < w[1].target_return));
/// ```
pub fn efficient_frontier(optimizer: &PortfolioOptimizer, points: usize) -> Result<Vec<FrontierPoint>> {
    let (lo, hi) = optimizer.return_range()?;
    frontier_between(optimizer, lo, hi, points)
}

/// Upper branch of the frontier, from the global minimum-variance return upward.
pub fn efficient_branch(optimizer: &PortfolioOptimizer, points: usize) -> Result<Vec<FrontierPoint>> {
    let gmv = optimizer.global_minimum_variance()?;
    let (_, hi) = optimizer.return_range()?;
    frontier_between(optimizer, gmv.expected_return.min(hi), hi, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DenseMatrix;
    use crate::portfolio::OptimizerConfig;

    fn optimizer(config: OptimizerConfig) -> PortfolioOptimizer {
        let cov = DenseMatrix::from_rows(&[
            vec![0.040, 0.006, 0.002, 0.001],
            vec![0.006, 0.090, 0.009, 0.004],
            vec![0.002, 0.009, 0.160, 0.012],
            vec![0.001, 0.004, 0.012, 0.250],
        ])
        .unwrap();
        PortfolioOptimizer::new(
            (0..4).map(|i| format!("A{i}")).collect(),
            vec![0.04, 0.07, 0.10, 0.14],
            cov,
            config,
        )
        .unwrap()
    }

    #[test]
    fn long_only_risk_grows_away_from_the_minimum() {
        let opt = optimizer(OptimizerConfig::default());
        let frontier = efficient_frontier(&opt, 25).unwrap();
        let gmv = opt.global_minimum_variance().unwrap();
        let pivot = frontier
            .iter()
            .position(|p| p.target_return >= gmv.expected_return)
            .unwrap();
        for pair in frontier[pivot..].windows(2) {
            assert!(pair[1].risk >= pair[0].risk - 1e-10);
        }
        for pair in frontier[..pivot].windows(2) {
            assert!(pair[0].risk >= pair[1].risk - 1e-10);
        }
        for p in &frontier {
            assert!((p.weights.sum() - 1.0).abs() < 1e-9);
            assert!(p.weights.values().iter().all(|w| *w >= -1e-12));
            assert!((p.expected_return - p.target_return).abs() < 1e-9);
        }
    }

    #[test]
    fn efficient_branch_starts_at_the_minimum_variance_point() {
        let opt = optimizer(OptimizerConfig::default().with_long_only(false));
        let branch = efficient_branch(&opt, 10).unwrap();
        let gmv = opt.global_minimum_variance().unwrap();
        assert!((branch[0].risk - gmv.risk).abs() < 1e-9);
        assert!(branch.windows(2).all(|w| w[1].risk >= w[0].risk - 1e-12));
    }

    #[test]
    fn too_few_points_are_rejected() {
        let opt = optimizer(OptimizerConfig::default());
        assert!(efficient_frontier(&opt, 1).is_err());
    }
}
