//! Portfolio construction: named weights, mean-variance optimisation and
//! efficient-frontier sweeps.

pub mod frontier;
pub mod mean_variance;
pub mod qp;
pub mod weights;

pub use frontier::{efficient_branch, efficient_frontier, frontier_between, FrontierPoint};
pub use mean_variance::{OptimizedPortfolio, OptimizerConfig, PortfolioOptimizer};
pub use qp::{feasible_return_range, solve_box_qp, QpOptions, QpSolution};
pub use weights::PortfolioWeights;
