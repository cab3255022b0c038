//! Monte Carlo pricing engines.

pub mod mc_engine;

pub use mc_engine::{price_from_paths, MonteCarloPricingEngine, VarianceReduction};
