//! Simulation inputs: process parameters, model choice, run configuration and the
//! progress/cancellation hook.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{ensure_finite, ensure_non_negative, AnalyticsConfig, QuantError, Result};

/// Default number of path rows generated per parallel batch.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// GBM parameters and grid dimensions for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticProcessParams {
    /// Annualised drift `μ`.
    pub drift: f64,
    /// Annualised volatility `σ`.
    pub volatility: f64,
    /// Continuously compounded rate used for discounting path payoffs.
    pub rate: f64,
    /// Horizon `T` in years.
    pub horizon: f64,
    /// Time steps `N` per path.
    pub steps: usize,
    /// Number of paths `M`.
    pub paths: usize,
}

impl StochasticProcessParams {
    pub fn new(
        drift: f64,
        volatility: f64,
        rate: f64,
        horizon: f64,
        steps: usize,
        paths: usize,
    ) -> Result<Self> {
        let params = Self {
            drift,
            volatility,
            rate,
            horizon,
            steps,
            paths,
        };
        params.validate()?;
        Ok(params)
    }

    /// Risk-neutral parameters: drift `rate - dividend_yield`.
    pub fn risk_neutral(
        rate: f64,
        dividend_yield: f64,
        volatility: f64,
        horizon: f64,
        steps: usize,
        paths: usize,
    ) -> Result<Self> {
        Self::new(rate - dividend_yield, volatility, rate, horizon, steps, paths)
    }

    /// # Errors
    /// [`QuantError::InvalidParameter`] when a field is non-finite, `σ < 0`, `T < 0`,
    /// `N < 1` or `M < 1`.
    pub fn validate(&self) -> Result<()> {
        ensure_finite("drift", self.drift)?;
        ensure_non_negative("volatility", self.volatility)?;
        ensure_finite("rate", self.rate)?;
        ensure_non_negative("horizon", self.horizon)?;
        if self.steps < 1 {
            return Err(QuantError::invalid("steps", "must be >= 1"));
        }
        if self.paths < 1 {
            return Err(QuantError::invalid("paths", "must be >= 1"));
        }
        Ok(())
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.horizon / self.steps as f64
    }
}

/// Dynamics of the simulated log-price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum ProcessModel {
    /// Geometric Brownian motion.
    #[default]
    Gbm,
    /// Merton jump-diffusion: GBM plus compound-Poisson lognormal jumps, with the
    /// drift compensated so `E[S_t] = S_0 e^{μ t}` still holds.
    JumpDiffusion {
        /// Jump arrival rate `λ` per year.
        intensity: f64,
        /// Mean log jump size.
        mean_jump: f64,
        /// Log jump size volatility.
        jump_vol: f64,
    },
}

impl ProcessModel {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Gbm => Ok(()),
            Self::JumpDiffusion {
                intensity,
                mean_jump,
                jump_vol,
            } => {
                ensure_non_negative("intensity", intensity)?;
                ensure_finite("mean_jump", mean_jump)?;
                ensure_non_negative("jump_vol", jump_vol)
            }
        }
    }
}

/// How a simulation run draws its randomness and splits its work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub model: ProcessModel,
    /// Pair each path with its mirror image (`Z`, `-Z`); requires an even path count.
    pub antithetic: bool,
    /// Base seed; `None` draws one from OS entropy and records it on the output.
    pub seed: Option<u64>,
    /// Path rows per parallel batch. Part of the reproducibility key: changing it
    /// changes the random streams.
    pub batch_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            model: ProcessModel::Gbm,
            antithetic: false,
            seed: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SimulationConfig {
    pub fn with_model(mut self, model: ProcessModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if self.batch_size == 0 {
            return Err(QuantError::invalid("batch_size", "must be >= 1"));
        }
        Ok(())
    }
}

impl From<&AnalyticsConfig> for SimulationConfig {
    fn from(cfg: &AnalyticsConfig) -> Self {
        Self {
            antithetic: cfg.antithetic,
            seed: cfg.seed,
            ..Self::default()
        }
    }
}

/// Batch progress reported to a [`SimulationControl`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationProgress {
    pub completed_batches: usize,
    pub total_batches: usize,
}

pub type ProgressCallback = Arc<dyn Fn(SimulationProgress) + Send + Sync>;

/// Progress and cancellation hook checked between path batches.
///
/// Batches complete in parallel, so callbacks may arrive from any worker thread and
/// `completed_batches` counts finished batches rather than a batch index.
#[derive(Clone, Default)]
pub struct SimulationControl {
    progress: Option<ProgressCallback>,
    cancel: Option<Arc<AtomicBool>>,
}

impl SimulationControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Batches not yet started when `flag` becomes `true` are skipped and the run
    /// fails with [`QuantError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn report(&self, completed_batches: usize, total_batches: usize) {
        if let Some(callback) = &self.progress {
            callback(SimulationProgress {
                completed_batches,
                total_batches,
            });
        }
    }
}

impl fmt::Debug for SimulationControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationControl")
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_each_out_of_domain_field() {
        let ok = StochasticProcessParams::new(0.05, 0.2, 0.01, 1.0, 12, 100).unwrap();
        assert_eq!(ok.dt(), 1.0 / 12.0);

        let cases = [
            (StochasticProcessParams { volatility: -0.1, ..ok }, "volatility"),
            (StochasticProcessParams { steps: 0, ..ok }, "steps"),
            (StochasticProcessParams { paths: 0, ..ok }, "paths"),
            (StochasticProcessParams { drift: f64::INFINITY, ..ok }, "drift"),
            (StochasticProcessParams { horizon: -1.0, ..ok }, "horizon"),
        ];
        for (params, field) in cases {
            match params.validate() {
                Err(QuantError::InvalidParameter { name, .. }) => assert_eq!(name, field),
                other => panic!("expected InvalidParameter for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn analytics_config_carries_seed_and_antithetic_flag() {
        let cfg = AnalyticsConfig::default()
            .with_seed(Some(7))
            .with_antithetic(true);
        let sim = SimulationConfig::from(&cfg);
        assert_eq!(sim.seed, Some(7));
        assert!(sim.antithetic);
        assert_eq!(sim.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn cancel_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let control = SimulationControl::new().with_cancel_flag(flag.clone());
        assert!(!control.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(control.is_cancelled());
    }
}
