//! Per-call analytics configuration.
//!
//! There is no global configuration. Callers build an [`AnalyticsConfig`] (from
//! `Default`, the `with_*` setters, or a JSON document) and derive the component
//! configs from it: [`crate::mc::SimulationConfig`], [`crate::risk::RiskConfig`] and
//! [`crate::portfolio::OptimizerConfig`] all implement `From<&AnalyticsConfig>`.

use serde::{Deserialize, Serialize};

use crate::core::error::{ensure_confidence, ensure_finite, QuantError, Result};

/// Default minimum sample size for quantile-based risk estimates.
pub const DEFAULT_MIN_SAMPLES: usize = 30;

/// Default trading periods per year used by annualisation helpers.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Shared knobs for simulation, risk and optimisation calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// VaR/CVaR confidence level in `(0, 1)`.
    pub confidence: f64,
    /// Continuously compounded risk-free rate used for discounting and Sharpe ratios.
    pub risk_free_rate: f64,
    /// Base seed for random-path generation; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Use antithetic variates in simulations.
    pub antithetic: bool,
    /// Forbid short positions in the optimiser.
    pub long_only: bool,
    /// Minimum sample size for quantile estimation.
    pub min_samples: usize,
    /// Permit quantile estimation below `min_samples`.
    pub allow_small_samples: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            risk_free_rate: 0.0,
            seed: Some(42),
            antithetic: false,
            long_only: true,
            min_samples: DEFAULT_MIN_SAMPLES,
            allow_small_samples: false,
        }
    }
}

impl AnalyticsConfig {
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }

    pub fn with_long_only(mut self, long_only: bool) -> Self {
        self.long_only = long_only;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_allow_small_samples(mut self, allow: bool) -> Self {
        self.allow_small_samples = allow;
        self
    }

    /// Checks field domains.
    pub fn validate(&self) -> Result<()> {
        ensure_confidence(self.confidence)?;
        ensure_finite("risk_free_rate", self.risk_free_rate)?;
        if self.min_samples == 0 {
            return Err(QuantError::invalid("min_samples", "must be >= 1"));
        }
        Ok(())
    }

    /// Parses and validates a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = crate::core::serialization::from_json(json)?;
        config.validate()?;
        Ok(config)
    }
}
