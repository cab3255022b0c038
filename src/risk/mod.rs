//! Top-level risk namespace.
//!
//! This module wires and re-exports:
//! - `var`: historical/parametric VaR and CVaR plus the return builders that feed them,
//! - `stress`: deterministic per-asset shock scenarios,
//! - `report`: serialisable VaR/CVaR bundles for historical, parametric and simulated
//!   samples.

pub mod report;
pub mod stress;
pub mod var;

pub use report::{RiskMethod, RiskReport};
pub use stress::{run_scenarios, stress_test, StressResult, StressScenario};
pub use var::{
    cvar, historical_cvar, historical_var, normal_expected_shortfall, normal_var,
    parametric_cvar, parametric_var, portfolio_returns, simulated_returns, RiskConfig,
};
