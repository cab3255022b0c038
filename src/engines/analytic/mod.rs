//! Closed-form analytic pricing engines.

pub mod black_scholes;

pub use black_scholes::{
    bs_delta, bs_gamma, bs_greeks, bs_price, bs_rho, bs_theta, bs_vega, implied_volatility,
    BlackScholesEngine,
};
