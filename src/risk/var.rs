//! Value-at-Risk and Expected-Shortfall estimators over return samples.
//!
//! Implemented analytics:
//! - historical VaR as the `confidence` quantile of losses (`loss = -return`) with
//!   linear interpolation between order statistics,
//! - historical CVaR as the mean of losses at or beyond that VaR,
//! - parametric (normal) VaR `-(μ + σ·Φ⁻¹(1 - c))` and its closed-form ES,
//! - return builders for a weighted universe and for simulated paths.
//!
//! VaR is reported signed: a sample whose `confidence` quantile is a gain gives a
//! negative VaR. Quantile estimators refuse samples smaller than
//! [`RiskConfig::min_samples`] unless [`RiskConfig::allow_small_samples`] is set.
//!
//! References:
//! - McNeil, Frey, Embrechts, *Quantitative Risk Management* (2015), Ch. 2.
//! - Hyndman and Fan (1996), sample quantile type 7.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{
    ensure_confidence, ensure_finite, AnalyticsConfig, QuantError, Result, DEFAULT_MIN_SAMPLES,
};
use crate::market::AssetUniverse;
use crate::math::{normal_inv_cdf, normal_pdf, quantile_sorted, sample_mean, sample_std};
use crate::mc::SimulatedPaths;
use crate::portfolio::PortfolioWeights;

/// Sample-size policy for the risk estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Smallest sample accepted without an override.
    pub min_samples: usize,
    /// Estimate anyway below `min_samples`, logging a warning.
    pub allow_small_samples: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            allow_small_samples: false,
        }
    }
}

impl RiskConfig {
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn allowing_small_samples(mut self) -> Self {
        self.allow_small_samples = true;
        self
    }
}

impl From<&AnalyticsConfig> for RiskConfig {
    fn from(cfg: &AnalyticsConfig) -> Self {
        Self {
            min_samples: cfg.min_samples,
            allow_small_samples: cfg.allow_small_samples,
        }
    }
}

/// Validates a return sample against the sample-size policy.
///
/// `floor` is the hard minimum the estimator needs regardless of the override.
fn check_sample(returns: &[f64], confidence: f64, config: &RiskConfig, floor: usize) -> Result<()> {
    ensure_confidence(confidence)?;
    let n = returns.len();
    if n < config.min_samples {
        if !config.allow_small_samples {
            return Err(QuantError::InsufficientSamples {
                available: n,
                required: config.min_samples,
            });
        }
        if n >= floor {
            warn!(
                samples = n,
                min_samples = config.min_samples,
                "estimating tail risk below the minimum sample size"
            );
        }
    }
    if n < floor {
        return Err(QuantError::InsufficientSamples {
            available: n,
            required: floor,
        });
    }
    for &r in returns {
        ensure_finite("returns", r)?;
    }
    Ok(())
}

fn sorted_losses(returns: &[f64]) -> Vec<f64> {
    let mut losses: Vec<f64> = returns.iter().map(|r| -r).collect();
    losses.sort_by(f64::total_cmp);
    losses
}

/// Historical Value-at-Risk of a return sample.
///
/// # Examples
/// ```rust
/// use sierra::risk::{historical_var, RiskConfig};
///
/// let returns: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
/// let var_95 = historical_var(&returns, 0.95, &RiskConfig::default()).unwrap();
/// assert!((var_95 - 0.04505).abs() < 1e-12);
/// ```
///
/// # Errors
/// [`QuantError::InvalidParameter`] for a confidence outside `(0, 1)` or a non-finite
/// return; [`QuantError::InsufficientSamples`] below the configured minimum.
pub fn historical_var(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<f64> {
    check_sample(returns, confidence, config, 1)?;
    Ok(quantile_sorted(&sorted_losses(returns), confidence))
}

/// Historical CVaR (expected shortfall): mean loss at or beyond the historical VaR.
///
/// Never below [`historical_var`] for the same inputs.
pub fn historical_cvar(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<f64> {
    check_sample(returns, confidence, config, 1)?;
    let losses = sorted_losses(returns);
    let var = quantile_sorted(&losses, confidence);
    let tail_start = losses.partition_point(|loss| *loss < var);
    let tail = &losses[tail_start..];
    Ok(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Alias of [`historical_cvar`].
#[inline]
pub fn cvar(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<f64> {
    historical_cvar(returns, confidence, config)
}

/// Normal VaR for returns with mean `mean` and standard deviation `std_dev`.
#[inline]
pub fn normal_var(mean: f64, std_dev: f64, confidence: f64) -> f64 {
    -(mean + std_dev * normal_inv_cdf(1.0 - confidence))
}

/// Closed-form expected shortfall of normal returns.
#[inline]
pub fn normal_expected_shortfall(mean: f64, std_dev: f64, confidence: f64) -> f64 {
    let z = normal_inv_cdf(confidence);
    -mean + std_dev * normal_pdf(z) / (1.0 - confidence)
}

/// Parametric (normal) VaR using the sample mean and unbiased standard deviation.
pub fn parametric_var(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<f64> {
    check_sample(returns, confidence, config, 2)?;
    Ok(normal_var(sample_mean(returns), sample_std(returns), confidence))
}

/// Parametric (normal) CVaR using the sample mean and unbiased standard deviation.
pub fn parametric_cvar(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<f64> {
    check_sample(returns, confidence, config, 2)?;
    Ok(normal_expected_shortfall(
        sample_mean(returns),
        sample_std(returns),
        confidence,
    ))
}

/// Per-period simple returns of a weighted portfolio over the universe's aligned dates.
///
/// Asset log-returns are converted to simple returns before weighting, so the result
/// is the return of a portfolio rebalanced to `weights` every period.
///
/// # Errors
/// [`QuantError::InvalidParameter`] unless `weights` names exactly the universe's assets.
pub fn portfolio_returns(universe: &AssetUniverse, weights: &PortfolioWeights) -> Result<Vec<f64>> {
    if weights.len() != universe.n_assets() {
        return Err(QuantError::invalid(
            "weights",
            format!(
                "{} weights for a universe of {} assets",
                weights.len(),
                universe.n_assets()
            ),
        ));
    }
    let mut out = vec![0.0; universe.n_returns()];
    for (name, w) in weights.iter() {
        let i = universe.index_of(name).ok_or_else(|| {
            QuantError::invalid("weights", format!("asset `{name}` is not in the universe"))
        })?;
        for (acc, r) in out.iter_mut().zip(universe.returns(i)) {
            *acc += w * r.exp_m1();
        }
    }
    Ok(out)
}

/// Terminal log-returns `ln(S_T / S_0)` of every simulated path.
pub fn simulated_returns(paths: &SimulatedPaths) -> Vec<f64> {
    paths.terminal_log_returns()
}
