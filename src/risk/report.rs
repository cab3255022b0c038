//! Bundled VaR/CVaR records for reporting and serialization.

use serde::Serialize;

use crate::core::Result;
use crate::mc::SimulatedPaths;
use crate::risk::var::{
    historical_cvar, historical_var, parametric_cvar, parametric_var, simulated_returns,
    RiskConfig,
};

/// Estimator behind a [`RiskReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMethod {
    Historical,
    Parametric,
    MonteCarlo,
}

/// VaR and CVaR of one return sample at one confidence level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub method: RiskMethod,
    pub confidence: f64,
    pub var: f64,
    pub cvar: f64,
    pub sample_size: usize,
}

impl RiskReport {
    pub fn historical(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<Self> {
        Ok(Self {
            method: RiskMethod::Historical,
            confidence,
            var: historical_var(returns, confidence, config)?,
            cvar: historical_cvar(returns, confidence, config)?,
            sample_size: returns.len(),
        })
    }

    pub fn parametric(returns: &[f64], confidence: f64, config: &RiskConfig) -> Result<Self> {
        Ok(Self {
            method: RiskMethod::Parametric,
            confidence,
            var: parametric_var(returns, confidence, config)?,
            cvar: parametric_cvar(returns, confidence, config)?,
            sample_size: returns.len(),
        })
    }

    /// Historical estimators over the terminal log-returns of simulated paths.
    pub fn monte_carlo(paths: &SimulatedPaths, confidence: f64, config: &RiskConfig) -> Result<Self> {
        let returns = simulated_returns(paths);
        Ok(Self {
            method: RiskMethod::MonteCarlo,
            ..Self::historical(&returns, confidence, config)?
        })
    }
}
