//! Pricing engine implementations.
//!
//! Three engines share the [`PricingEngine`] surface: the Black-Scholes closed form,
//! the CRR lattice and Monte Carlo over simulated paths. [`PricingMethod`] picks one
//! at runtime and [`cross_validate`] checks that they agree on a European vanilla.

pub mod analytic;
pub mod monte_carlo;
pub mod tree;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{ExerciseStyle, PriceResult, PricingEngine, QuantError, Result};
use crate::instruments::OptionContract;
use crate::market::Market;

pub use analytic::BlackScholesEngine;
pub use monte_carlo::{MonteCarloPricingEngine, VarianceReduction};
pub use tree::BinomialTreeEngine;

/// Runtime choice of pricing engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingMethod {
    /// Black-Scholes-Merton closed form.
    ClosedForm,
    /// Smoothed CRR binomial tree with `steps` steps.
    Lattice { steps: usize },
    /// Monte Carlo with the given engine settings.
    MonteCarlo(MonteCarloPricingEngine),
}

impl PricingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClosedForm => "closed_form",
            Self::Lattice { .. } => "lattice",
            Self::MonteCarlo(_) => "monte_carlo",
        }
    }
}

impl PricingEngine for PricingMethod {
    fn price(&self, contract: &OptionContract, market: &Market) -> Result<PriceResult> {
        match self {
            Self::ClosedForm => BlackScholesEngine::new().price(contract, market),
            Self::Lattice { steps } => BinomialTreeEngine::new(*steps).price(contract, market),
            Self::MonteCarlo(engine) => engine.price(contract, market),
        }
    }
}

/// One engine's price within a [`CrossValidation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodPrice {
    pub method: &'static str,
    pub price: f64,
    pub stderr: Option<f64>,
    /// Absolute difference to the closed-form reference.
    pub deviation: f64,
    /// Tolerance applied to this method: `tol`, widened by three standard errors for
    /// Monte Carlo.
    pub allowed: f64,
}

impl MethodPrice {
    pub fn within_tolerance(&self) -> bool {
        self.deviation <= self.allowed
    }
}

/// Outcome of pricing one contract with several engines against the closed form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    pub reference: f64,
    pub prices: Vec<MethodPrice>,
}

impl CrossValidation {
    pub fn agrees(&self) -> bool {
        self.prices.iter().all(MethodPrice::within_tolerance)
    }

    pub fn max_deviation(&self) -> f64 {
        self.prices.iter().map(|p| p.deviation).fold(0.0, f64::max)
    }
}

/// Default engine set used by [`cross_validate`]: a 500-step lattice and 100,000
/// antithetic Monte Carlo paths with seed 42.
pub fn default_methods() -> Vec<PricingMethod> {
    vec![
        PricingMethod::Lattice { steps: 500 },
        PricingMethod::MonteCarlo(
            MonteCarloPricingEngine::new(100_000, 1, 42)
                .with_variance_reduction(VarianceReduction::Antithetic),
        ),
    ]
}

/// Prices a European vanilla with the lattice and Monte Carlo engines and compares
/// each to the closed form.
///
/// # Examples
/// ```
/// use sierra::engines::cross_validate;
/// use sierra::instruments::OptionContract;
/// use sierra::market::Market;
///
/// let market = Market::builder().spot(100.0).rate(0.05).flat_vol(0.2).build().unwrap();
/// let call = OptionContract::european_call(100.0, 1.0).unwrap();
/// let check = cross_validate(&call, &market, 1e-3).unwrap();
/// assert!(check.agrees());
/// ```
pub fn cross_validate(
    contract: &OptionContract,
    market: &Market,
    tol: f64,
) -> Result<CrossValidation> {
    cross_validate_with(contract, market, &default_methods(), tol)
}

/// [`cross_validate`] with a caller-chosen engine set.
///
/// # Errors
/// [`QuantError::UnsupportedStyle`] for American contracts, [`QuantError::InvalidParameter`]
/// for a negative tolerance, and any engine error.
pub fn cross_validate_with(
    contract: &OptionContract,
    market: &Market,
    methods: &[PricingMethod],
    tol: f64,
) -> Result<CrossValidation> {
    if contract.exercise() != ExerciseStyle::European {
        return Err(QuantError::UnsupportedStyle(
            "cross-validation compares European contracts only".to_string(),
        ));
    }
    if !(tol >= 0.0) {
        return Err(QuantError::invalid("tol", "must be >= 0"));
    }

    let reference = BlackScholesEngine::new().price(contract, market)?.price;
    let mut prices = Vec::with_capacity(methods.len());
    for method in methods {
        let result = method.price(contract, market)?;
        let deviation = (result.price - reference).abs();
        let allowed = tol + 3.0 * result.stderr.unwrap_or(0.0);
        if deviation > allowed {
            warn!(
                method = method.name(),
                price = result.price,
                reference,
                deviation,
                "engine disagrees with closed form"
            );
        }
        prices.push(MethodPrice {
            method: method.name(),
            price: result.price,
            stderr: result.stderr,
            deviation,
            allowed,
        });
    }
    debug!(reference, methods = methods.len(), "cross-validation complete");
    Ok(CrossValidation { reference, prices })
}
