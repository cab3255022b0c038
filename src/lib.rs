//! Sierra is a quantitative-analytics library for option pricing, Monte Carlo path
//! simulation, portfolio risk and mean-variance portfolio construction over
//! time series of asset prices.
//!
//! The crate is organised leaves-first:
//! - `market`: validated price series, aligned asset universes and their return
//!   moments, CSV loading, and the flat market snapshot used by the pricers.
//! - `mc`: seeded, batch-parallel GBM and jump-diffusion path simulation.
//! - `engines` + `instruments`: Black-Scholes-Merton closed form, CRR lattice and
//!   Monte Carlo pricing behind one [`core::PricingEngine`] trait.
//! - `risk`: historical and parametric VaR/CVaR, stress scenarios, risk reports.
//! - `portfolio`: closed-form and active-set mean-variance optimisation and
//!   efficient-frontier sweeps.
//!
//! References used across modules include:
//! - Hull, *Options, Futures, and Other Derivatives* (11th ed.), Ch. 13, 15 and 21.
//! - Glasserman (2004) for Monte Carlo estimators and antithetic variates.
//! - Markowitz (1952) and Merton (1972) for the analytic frontier.
//! - Nocedal and Wright (2006) for the active-set QP.
//!
//! Numerical considerations:
//! - Lattice results carry an odd/even sawtooth; smoothing averages two depths.
//! - MC results report a standard error; cross-checks allow three of them.
//! - Quantile risk measures refuse samples below a configurable minimum size.
//!
//! Library code logs through `tracing` and never installs a subscriber.
//!
//! # Quick Start
//! Price a Black-Scholes call:
//! ```rust
//! use sierra::core::{OptionType, PricingEngine};
//! use sierra::engines::analytic::{bs_price, BlackScholesEngine};
//! use sierra::instruments::OptionContract;
//! use sierra::market::Market;
//!
//! let px = bs_price(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.20, 1.0);
//! assert!(px > 10.0 && px < 11.0);
//!
//! let market = Market::builder().spot(100.0).rate(0.05).flat_vol(0.20).build().unwrap();
//! let call = OptionContract::european_call(100.0, 1.0).unwrap();
//! let result = BlackScholesEngine::new().price(&call, &market).unwrap();
//! assert!((result.price - px).abs() < 1e-12);
//! assert!(result.greeks.unwrap().delta > 0.5);
//! ```
//!
//! Cross-check the three pricing methods:
//! ```rust,no_run
//! use sierra::engines::cross_validate;
//! use sierra::instruments::OptionContract;
//! use sierra::market::Market;
//!
//! let market = Market::builder().spot(100.0).rate(0.05).flat_vol(0.20).build().unwrap();
//! let put = OptionContract::european_put(100.0, 1.0).unwrap();
//! let check = cross_validate(&put, &market, 1e-3).unwrap();
//! assert!(check.agrees());
//! ```
//!
//! Simulate seeded paths and read a simulated VaR:
//! ```rust
//! use sierra::mc::{simulate, SimulationConfig, StochasticProcessParams};
//! use sierra::risk::{RiskConfig, RiskReport};
//!
//! let params = StochasticProcessParams::new(0.05, 0.2, 0.02, 1.0, 12, 2_000).unwrap();
//! let paths = simulate(&params, 100.0, &SimulationConfig::default().with_seed(7)).unwrap();
//! let report = RiskReport::monte_carlo(&paths, 0.95, &RiskConfig::default()).unwrap();
//! assert!(report.cvar >= report.var);
//! ```
//!
//! Run a historical VaR:
//! ```rust
//! use sierra::risk::{historical_var, RiskConfig};
//!
//! let pnl = [-0.02, -0.015, 0.002, 0.004, 0.01, -0.008, 0.001];
//! let config = RiskConfig::default().allowing_small_samples();
//! let var_95 = historical_var(&pnl, 0.95, &config).unwrap();
//! assert!(var_95 > 0.0);
//! ```

pub mod core;
pub mod engines;
pub mod instruments;
pub mod market;
pub mod math;
pub mod mc;
pub mod portfolio;
pub mod risk;

/// Common imports for ergonomic usage.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::engines::analytic::*;
    pub use crate::engines::monte_carlo::*;
    pub use crate::engines::tree::*;
    pub use crate::engines::{cross_validate, PricingMethod};
    pub use crate::instruments::*;
    pub use crate::market::*;
    pub use crate::portfolio::*;
    pub use crate::risk::*;
}
