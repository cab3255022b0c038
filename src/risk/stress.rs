//! Deterministic stress testing of portfolio weights under per-asset return shocks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ensure_finite, QuantError, Result};
use crate::portfolio::PortfolioWeights;

/// Named set of per-asset return shocks, e.g. `{"SPY": -0.20, "TLT": 0.05}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub shocks: BTreeMap<String, f64>,
}

impl StressScenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shocks: BTreeMap::new(),
        }
    }

    pub fn with_shock(mut self, asset: impl Into<String>, shock: f64) -> Self {
        self.shocks.insert(asset.into(), shock);
        self
    }

    /// Same shocks multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            name: format!("{} x{factor}", self.name),
            shocks: self
                .shocks
                .iter()
                .map(|(asset, shock)| (asset.clone(), shock * factor))
                .collect(),
        }
    }

    /// Same shock applied to every named asset.
    pub fn uniform(name: impl Into<String>, assets: &[String], shock: f64) -> Self {
        Self {
            name: name.into(),
            shocks: assets.iter().map(|a| (a.clone(), shock)).collect(),
        }
    }
}

/// Portfolio return impact of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressResult {
    pub scenario: String,
    /// Portfolio return `Σ wᵢ·shockᵢ`.
    pub pnl: f64,
    /// `wᵢ·shockᵢ` per asset, in weight order.
    pub contributions: Vec<(String, f64)>,
}

impl StressResult {
    /// P&L in currency for a portfolio worth `notional`.
    pub fn pnl_on(&self, notional: f64) -> f64 {
        self.pnl * notional
    }

    /// Asset with the most negative contribution.
    pub fn worst_contributor(&self) -> Option<(&str, f64)> {
        self.contributions
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, c)| (name.as_str(), *c))
    }
}

/// Applies `shocks` to `weights`. Assets without a shock contribute zero.
///
/// # Examples
/// ```rust
/// use std::collections::BTreeMap;
/// use sierra::portfolio::PortfolioWeights;
/// use sierra::risk::stress_test;
///
/// let weights = PortfolioWeights::new(vec!["A".into(), "B".into()], vec![0.6, 0.4]).unwrap();
/// let shocks = BTreeMap::from([("A".to_string(), -0.10), ("B".to_string(), 0.05)]);
/// let result = stress_test(&weights, &shocks).unwrap();
/// assert!((result.pnl + 0.04).abs() < 1e-12);
/// ```
///
/// # Errors
/// [`QuantError::InvalidParameter`] when a shock names an asset not in `weights` or
/// is non-finite.
pub fn stress_test(weights: &PortfolioWeights, shocks: &BTreeMap<String, f64>) -> Result<StressResult> {
    run_scenario(weights, "ad hoc", shocks)
}

fn run_scenario(
    weights: &PortfolioWeights,
    scenario: &str,
    shocks: &BTreeMap<String, f64>,
) -> Result<StressResult> {
    for (asset, &shock) in shocks {
        if weights.get(asset).is_none() {
            return Err(QuantError::invalid(
                "shocks",
                format!("scenario `{scenario}` shocks unknown asset `{asset}`"),
            ));
        }
        ensure_finite("shocks", shock)?;
    }

    let contributions: Vec<(String, f64)> = weights
        .iter()
        .map(|(name, w)| (name.to_string(), w * shocks.get(name).copied().unwrap_or(0.0)))
        .collect();
    let pnl = contributions.iter().map(|(_, c)| c).sum();
    debug!(scenario, pnl, "stress scenario applied");

    Ok(StressResult {
        scenario: scenario.to_string(),
        pnl,
        contributions,
    })
}

/// Runs every scenario against the same weights, in input order.
pub fn run_scenarios(weights: &PortfolioWeights, scenarios: &[StressScenario]) -> Result<Vec<StressResult>> {
    scenarios
        .iter()
        .map(|s| run_scenario(weights, &s.name, &s.shocks))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weights() -> PortfolioWeights {
        PortfolioWeights::new(
            vec!["EQ".to_string(), "BD".to_string(), "GD".to_string()],
            vec![0.5, 0.3, 0.2],
        )
        .unwrap()
    }

    #[test]
    fn pnl_is_weighted_sum_with_missing_shocks_as_zero() {
        let crash = StressScenario::new("equity crash")
            .with_shock("EQ", -0.30)
            .with_shock("GD", 0.10);
        let res = &run_scenarios(&weights(), &[crash]).unwrap()[0];
        assert_relative_eq!(res.pnl, -0.13, epsilon = 1e-12);
        assert_eq!(res.contributions[1], ("BD".to_string(), 0.0));
        assert_eq!(res.worst_contributor().map(|(n, _)| n), Some("EQ"));
        assert_relative_eq!(res.pnl_on(1_000_000.0), -130_000.0, epsilon = 1e-6);
    }

    #[test]
    fn unknown_asset_is_rejected() {
        let shocks = BTreeMap::from([("XX".to_string(), -0.1)]);
        let err = stress_test(&weights(), &shocks).unwrap_err();
        assert!(matches!(err, QuantError::InvalidParameter { name: "shocks", .. }));
    }

    #[test]
    fn scaled_and_uniform_scenarios() {
        let names: Vec<String> = weights().names().to_vec();
        let down = StressScenario::uniform("all down", &names, -0.1);
        let res = run_scenarios(&weights(), &[down.clone(), down.scaled(2.0)]).unwrap();
        assert_relative_eq!(res[0].pnl, -0.1, epsilon = 1e-12);
        assert_relative_eq!(res[1].pnl, -0.2, epsilon = 1e-12);
    }
}
