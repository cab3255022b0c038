use tracing::debug;

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, PriceResult, PricingEngine, QuantError, Result,
};
use crate::instruments::{OptionContract, PathPayoff};
use crate::market::Market;
use crate::mc::{
    simulate_with_control, ProcessModel, SimulatedPaths, SimulationConfig, SimulationControl,
    StochasticProcessParams, DEFAULT_BATCH_SIZE,
};

/// Variance reduction scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VarianceReduction {
    /// Plain independent paths.
    #[default]
    None,
    /// Antithetic variates; the path count must be even.
    Antithetic,
}

/// Monte Carlo engine pricing a path payoff under risk-neutral GBM or jump-diffusion.
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloPricingEngine {
    /// Number of simulated paths.
    pub num_paths: usize,
    /// Number of time steps per path.
    pub num_steps: usize,
    /// RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Variance reduction configuration.
    pub variance_reduction: VarianceReduction,
    /// Underlying dynamics.
    pub model: ProcessModel,
    /// Payoff evaluated on each path.
    pub payoff: PathPayoff,
    /// Path rows per parallel batch.
    pub batch_size: usize,
}

impl MonteCarloPricingEngine {
    /// Creates a vanilla GBM engine with explicit path and time-step counts.
    pub fn new(num_paths: usize, num_steps: usize, seed: u64) -> Self {
        Self {
            num_paths,
            num_steps,
            seed: Some(seed),
            variance_reduction: VarianceReduction::None,
            model: ProcessModel::Gbm,
            payoff: PathPayoff::Vanilla,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the variance reduction scheme.
    pub fn with_variance_reduction(mut self, variance_reduction: VarianceReduction) -> Self {
        self.variance_reduction = variance_reduction;
        self
    }

    pub fn with_model(mut self, model: ProcessModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_payoff(mut self, payoff: PathPayoff) -> Self {
        self.payoff = payoff;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Lets the OS pick the seed; the drawn seed is reported in the diagnostics.
    pub fn with_entropy_seed(mut self) -> Self {
        self.seed = None;
        self
    }

    fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            model: self.model,
            antithetic: self.variance_reduction == VarianceReduction::Antithetic,
            seed: self.seed,
            batch_size: self.batch_size,
        }
    }

    /// Prices with a progress callback and cancellation flag.
    ///
    /// # Errors
    /// Everything [`PricingEngine::price`] returns, plus [`QuantError::Cancelled`].
    pub fn price_with_control(
        &self,
        contract: &OptionContract,
        market: &Market,
        control: &SimulationControl,
    ) -> Result<PriceResult> {
        contract.validate()?;
        market.validate()?;
        self.payoff.validate()?;

        if contract.exercise() == ExerciseStyle::American {
            return Err(QuantError::UnsupportedStyle(
                "Monte Carlo prices European exercise only; use the lattice for American"
                    .to_string(),
            ));
        }
        if self.num_paths == 0 {
            return Err(QuantError::invalid("num_paths", "must be > 0"));
        }
        if self.num_steps == 0 {
            return Err(QuantError::invalid("num_steps", "must be > 0"));
        }

        if contract.expiry() == 0.0 {
            let payoff = self.payoff.evaluate(contract, &[market.spot]);
            return Ok(PriceResult {
                stderr: Some(0.0),
                ..PriceResult::from_price(payoff)
            });
        }

        let params = StochasticProcessParams::risk_neutral(
            market.rate,
            market.dividend_yield,
            market.vol,
            contract.expiry(),
            self.num_steps,
            self.num_paths,
        )?;
        let paths = simulate_with_control(&params, market.spot, &self.simulation_config(), control)?;
        let mut result = price_from_paths(contract, &self.payoff, &paths)?;
        result.diagnostics.insert_key(DiagKey::Vol, market.vol);
        Ok(result)
    }
}

impl PricingEngine for MonteCarloPricingEngine {
    fn price(&self, contract: &OptionContract, market: &Market) -> Result<PriceResult> {
        self.price_with_control(contract, market, &SimulationControl::default())
    }
}

/// Discounted mean payoff over an existing path grid.
///
/// Discounting uses the grid's `rate` over its horizon. With antithetic paths the
/// standard error is taken over the `M/2` pair averages, the independent samples.
///
/// # Errors
/// [`QuantError::InvalidParameter`] for an invalid payoff or a grid with fewer than
/// two independent samples.
pub fn price_from_paths(
    contract: &OptionContract,
    payoff: &PathPayoff,
    paths: &SimulatedPaths,
) -> Result<PriceResult> {
    payoff.validate()?;
    let params = paths.params();
    let discount = (-params.rate * params.horizon).exp();

    let payoffs: Vec<f64> = paths.rows().map(|row| payoff.evaluate(contract, row)).collect();
    let samples: Vec<f64> = if paths.is_antithetic() {
        payoffs
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect()
    } else {
        payoffs
    };

    let n = samples.len();
    if n < 2 {
        return Err(QuantError::invalid(
            "paths",
            format!("need at least two independent samples, got {n}"),
        ));
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1) as f64;
    let price = discount * mean;
    let stderr = discount * (var / n as f64).sqrt();

    let mut diagnostics = Diagnostics::new();
    diagnostics.insert_key(DiagKey::NumPaths, paths.num_paths() as f64);
    diagnostics.insert_key(DiagKey::NumSteps, paths.num_steps() as f64);
    diagnostics.insert_key(DiagKey::Antithetic, f64::from(u8::from(paths.is_antithetic())));
    diagnostics.insert_key(DiagKey::DiscountFactor, discount);
    // Seeds above 2^53 lose precision here; the exact value lives on the paths.
    diagnostics.insert_key(DiagKey::Seed, paths.seed() as f64);

    debug!(
        price,
        stderr,
        paths = paths.num_paths(),
        seed = paths.seed(),
        "monte carlo price"
    );

    Ok(PriceResult {
        price,
        stderr: Some(stderr),
        greeks: None,
        diagnostics,
    })
}
