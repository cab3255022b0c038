//! Markowitz mean-variance optimisation.
//!
//! Without bounds and with short selling allowed the minimum-variance portfolio
//! for a return target has the closed form
//!
//! ```text
//! w = ((C - B·t)·Σ⁻¹1 + (A·t - B)·Σ⁻¹μ) / D,
//! A = 1ᵀΣ⁻¹1, B = 1ᵀΣ⁻¹μ, C = μᵀΣ⁻¹μ, D = AC - B²
//! ```
//!
//! Any bound (long-only included) routes through the active-set solver in
//! [`crate::portfolio::qp`].
//!
//! References: Merton (1972), "An Analytic Derivation of the Efficient Portfolio
//! Frontier"; Markowitz (1952).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{
    ensure_confidence, ensure_finite, AnalyticsConfig, ConvergenceWarning, QuantError, Result,
};
use crate::market::AssetUniverse;
use crate::math::DenseMatrix;
use crate::portfolio::qp::{feasible_return_range, solve_box_qp, QpOptions};
use crate::portfolio::weights::PortfolioWeights;
use crate::risk::normal_var;

const SHARPE_SCAN_POINTS: usize = 41;
const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

/// Constraints and solver settings for [`PortfolioOptimizer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Forbid negative weights.
    pub long_only: bool,
    /// Per-asset lower bound; with `long_only` the effective bound is at least 0.
    pub min_weight: Option<f64>,
    /// Per-asset upper bound.
    pub max_weight: Option<f64>,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Risk-free rate, in the units of the expected returns, for Sharpe ratios.
    pub risk_free_rate: f64,
    /// Confidence of the parametric VaR reported per portfolio.
    pub confidence: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            long_only: true,
            min_weight: None,
            max_weight: None,
            max_iterations: 500,
            tolerance: 1e-10,
            risk_free_rate: 0.0,
            confidence: 0.95,
        }
    }
}

impl OptimizerConfig {
    pub fn with_long_only(mut self, long_only: bool) -> Self {
        self.long_only = long_only;
        self
    }

    pub fn with_bounds(mut self, min_weight: Option<f64>, max_weight: Option<f64>) -> Self {
        self.min_weight = min_weight;
        self.max_weight = max_weight;
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Whether any bound is active, which rules out the closed form.
    pub fn is_bounded(&self) -> bool {
        self.long_only || self.min_weight.is_some() || self.max_weight.is_some()
    }

    fn lower_bound(&self) -> f64 {
        match (self.long_only, self.min_weight) {
            (true, Some(lo)) => lo.max(0.0),
            (true, None) => 0.0,
            (false, Some(lo)) => lo,
            (false, None) => f64::NEG_INFINITY,
        }
    }

    fn upper_bound(&self) -> f64 {
        self.max_weight.unwrap_or(f64::INFINITY)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_confidence(self.confidence)?;
        ensure_finite("risk_free_rate", self.risk_free_rate)?;
        if !(self.tolerance > 0.0) {
            return Err(QuantError::invalid("tolerance", "must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(QuantError::invalid("max_iterations", "must be >= 1"));
        }
        if !self.long_only && self.max_weight.is_some() && self.min_weight.is_none() {
            return Err(QuantError::invalid(
                "min_weight",
                "an upper bound with short selling needs a finite lower bound",
            ));
        }
        Ok(())
    }
}

impl From<&AnalyticsConfig> for OptimizerConfig {
    fn from(cfg: &AnalyticsConfig) -> Self {
        Self {
            long_only: cfg.long_only,
            risk_free_rate: cfg.risk_free_rate,
            confidence: cfg.confidence,
            ..Self::default()
        }
    }
}

/// Weights plus the statistics of the resulting portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedPortfolio {
    pub weights: PortfolioWeights,
    pub expected_return: f64,
    pub variance: f64,
    /// Standard deviation of the portfolio return.
    pub risk: f64,
    /// `(expected_return - risk_free_rate) / risk`; zero for a riskless portfolio.
    pub sharpe: f64,
    /// Parametric normal VaR at the configured confidence.
    pub value_at_risk: f64,
    pub iterations: usize,
    /// Set when the bounded solver stopped at its iteration limit.
    pub warning: Option<ConvergenceWarning>,
}

/// Mean-variance optimiser over one set of expected returns and covariances.
#[derive(Debug, Clone)]
pub struct PortfolioOptimizer {
    names: Vec<String>,
    mean: Vec<f64>,
    covariance: DenseMatrix,
    config: OptimizerConfig,
}

impl PortfolioOptimizer {
    /// # Errors
    /// [`QuantError::InvalidParameter`] for mismatched dimensions, non-finite inputs,
    /// an asymmetric covariance or an invalid config; [`QuantError::InsufficientData`]
    /// for an empty asset list.
    pub fn new(
        names: Vec<String>,
        mean: Vec<f64>,
        covariance: DenseMatrix,
        config: OptimizerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let n = names.len();
        if n == 0 {
            return Err(QuantError::InsufficientData("no assets to optimise".to_string()));
        }
        if mean.len() != n || covariance.rows() != n || covariance.cols() != n {
            return Err(QuantError::invalid(
                "covariance",
                format!(
                    "{n} assets, {} means and a {}x{} covariance",
                    mean.len(),
                    covariance.rows(),
                    covariance.cols()
                ),
            ));
        }
        for &m in &mean {
            ensure_finite("mean", m)?;
        }
        if !covariance.is_finite() || !covariance.is_symmetric(1e-12 * covariance.max_abs().max(1.0)) {
            return Err(QuantError::invalid(
                "covariance",
                "must be finite and symmetric",
            ));
        }
        // Duplicate names are caught here rather than on every result.
        PortfolioWeights::equal(&names)?;
        Ok(Self {
            names,
            mean,
            covariance,
            config,
        })
    }

    /// Optimiser over a universe's annualised log-return moments.
    pub fn from_universe(
        universe: &AssetUniverse,
        periods_per_year: f64,
        config: OptimizerConfig,
    ) -> Result<Self> {
        Self::new(
            universe.names().to_vec(),
            universe.annualised_mean(periods_per_year),
            universe.annualised_covariance(periods_per_year),
            config,
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn covariance(&self) -> &DenseMatrix {
        &self.covariance
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.names.len();
        (
            vec![self.config.lower_bound(); n],
            vec![self.config.upper_bound(); n],
        )
    }

    fn qp_options(&self) -> QpOptions {
        QpOptions {
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance,
        }
    }

    /// Portfolio statistics for arbitrary weights in asset order.
    pub fn evaluate(&self, weights: &[f64]) -> Result<OptimizedPortfolio> {
        let weights = PortfolioWeights::new(self.names.clone(), weights.to_vec())?;
        Ok(self.portfolio(weights, 0, None))
    }

    fn portfolio(
        &self,
        weights: PortfolioWeights,
        iterations: usize,
        warning: Option<ConvergenceWarning>,
    ) -> OptimizedPortfolio {
        let w = weights.values();
        let expected_return: f64 = w.iter().zip(&self.mean).map(|(a, b)| a * b).sum();
        let variance = self.covariance.quad_form(w).max(0.0);
        let risk = variance.sqrt();
        let sharpe = if risk > 0.0 {
            (expected_return - self.config.risk_free_rate) / risk
        } else {
            0.0
        };
        OptimizedPortfolio {
            value_at_risk: normal_var(expected_return, risk, self.config.confidence),
            weights,
            expected_return,
            variance,
            risk,
            sharpe,
            iterations,
            warning,
        }
    }

    /// Lowest and highest achievable expected return.
    ///
    /// Unbounded problems can reach any return; the range reported for them spans
    /// the individual asset means.
    pub fn return_range(&self) -> Result<(f64, f64)> {
        if self.config.is_bounded() {
            let (lower, upper) = self.bounds();
            feasible_return_range(&self.mean, &lower, &upper)
        } else {
            let lo = self.mean.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = self.mean.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Ok((lo, hi))
        }
    }

    /// Minimum-variance portfolio with expected return `target_return`.
    ///
    /// # Errors
    /// [`QuantError::SingularCovariance`] when the closed form cannot invert Σ;
    /// [`QuantError::InvalidParameter`] when the target is unreachable under the bounds.
    pub fn minimize_variance(&self, target_return: f64) -> Result<OptimizedPortfolio> {
        ensure_finite("target_return", target_return)?;
        self.solve(Some(target_return))
    }

    /// Portfolio of least variance regardless of return.
    pub fn global_minimum_variance(&self) -> Result<OptimizedPortfolio> {
        self.solve(None)
    }

    fn solve(&self, target: Option<f64>) -> Result<OptimizedPortfolio> {
        if !self.config.is_bounded() {
            let w = self.closed_form(target)?;
            let weights = PortfolioWeights::new(self.names.clone(), w)?;
            return Ok(self.portfolio(weights, 0, None));
        }

        let (lower, upper) = self.bounds();
        let solution = solve_box_qp(
            &self.covariance,
            &self.mean,
            target,
            &lower,
            &upper,
            &self.qp_options(),
        )?;
        let warning = (!solution.converged).then(|| {
            let warning = ConvergenceWarning {
                solver: "active_set_qp".to_string(),
                iterations: solution.iterations,
                residual: solution.residual,
            };
            warn!(%warning, ?target, "returning best feasible portfolio");
            warning
        });
        let weights = PortfolioWeights::new(self.names.clone(), solution.weights)?;
        Ok(self.portfolio(weights, solution.iterations, warning))
    }

    fn closed_form(&self, target: Option<f64>) -> Result<Vec<f64>> {
        let inv = self.covariance.inverse("covariance")?;
        let ones = vec![1.0; self.names.len()];
        let a_vec = inv.mul_vec(&ones);
        let b_vec = inv.mul_vec(&self.mean);
        let a: f64 = a_vec.iter().sum();
        let b: f64 = b_vec.iter().sum();
        let c: f64 = self.mean.iter().zip(&b_vec).map(|(m, x)| m * x).sum();
        let d = a * c - b * b;
        debug!(a, b, c, d, "closed-form frontier coefficients");

        match target {
            Some(t) if d > 1e-14 * (a * c).abs().max(f64::MIN_POSITIVE) => Ok(a_vec
                .iter()
                .zip(&b_vec)
                .map(|(x, y)| ((c - b * t) * x + (a * t - b) * y) / d)
                .collect()),
            Some(t) => {
                // Every portfolio earns B/A when expected returns are all equal.
                let only = b / a;
                if (t - only).abs() > 1e-12 * only.abs().max(1.0) {
                    return Err(QuantError::invalid(
                        "target_return",
                        format!("all assets return {only}; {t} is unreachable"),
                    ));
                }
                Ok(a_vec.iter().map(|x| x / a).collect())
            }
            None => Ok(a_vec.iter().map(|x| x / a).collect()),
        }
    }

    /// Tangency portfolio maximising the Sharpe ratio.
    ///
    /// Closed form `Σ⁻¹(μ - r_f·1)` when unbounded; otherwise a frontier scan refined
    /// by golden-section search on the target return.
    ///
    /// # Errors
    /// [`QuantError::InvalidParameter`] when no portfolio beats the risk-free rate.
    pub fn max_sharpe(&self) -> Result<OptimizedPortfolio> {
        let rf = self.config.risk_free_rate;
        if !self.config.is_bounded() {
            let inv = self.covariance.inverse("covariance")?;
            let excess: Vec<f64> = self.mean.iter().map(|m| m - rf).collect();
            let raw = inv.mul_vec(&excess);
            let total: f64 = raw.iter().sum();
            if !(total > 0.0) {
                return Err(QuantError::invalid(
                    "risk_free_rate",
                    "the minimum-variance portfolio does not beat the risk-free rate",
                ));
            }
            let weights =
                PortfolioWeights::new(self.names.clone(), raw.iter().map(|x| x / total).collect())?;
            return Ok(self.portfolio(weights, 0, None));
        }

        let gmv = self.global_minimum_variance()?;
        let (_, r_max) = self.return_range()?;
        let r_min = gmv.expected_return.min(r_max);
        let step = (r_max - r_min) / (SHARPE_SCAN_POINTS - 1) as f64;

        let mut best = gmv;
        let mut best_k = 0usize;
        for k in 1..SHARPE_SCAN_POINTS {
            let target = if k + 1 == SHARPE_SCAN_POINTS { r_max } else { r_min + step * k as f64 };
            let candidate = self.minimize_variance(target)?;
            if candidate.sharpe > best.sharpe {
                best = candidate;
                best_k = k;
            }
        }
        if !(best.expected_return > rf && best.risk > 0.0) {
            return Err(QuantError::invalid(
                "risk_free_rate",
                "no feasible portfolio beats the risk-free rate",
            ));
        }

        // Sharpe is unimodal along the efficient branch; refine inside the bracket.
        let mut lo = r_min + step * best_k.saturating_sub(1) as f64;
        let mut hi = (r_min + step * (best_k + 1) as f64).min(r_max);
        let mut x1 = hi - GOLDEN_RATIO_CONJUGATE * (hi - lo);
        let mut x2 = lo + GOLDEN_RATIO_CONJUGATE * (hi - lo);
        let mut p1 = self.minimize_variance(x1)?;
        let mut p2 = self.minimize_variance(x2)?;
        for _ in 0..40 {
            if hi - lo <= 1e-10 * (1.0 + hi.abs()) {
                break;
            }
            if p1.sharpe < p2.sharpe {
                lo = x1;
                x1 = x2;
                p1 = p2;
                x2 = lo + GOLDEN_RATIO_CONJUGATE * (hi - lo);
                p2 = self.minimize_variance(x2)?;
            } else {
                hi = x2;
                x2 = x1;
                p2 = p1;
                x1 = hi - GOLDEN_RATIO_CONJUGATE * (hi - lo);
                p1 = self.minimize_variance(x1)?;
            }
        }
        for candidate in [p1, p2] {
            if candidate.sharpe > best.sharpe {
                best = candidate;
            }
        }
        debug!(sharpe = best.sharpe, expected_return = best.expected_return, "max sharpe");
        Ok(best)
    }
}
