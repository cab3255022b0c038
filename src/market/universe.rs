//! Aligned multi-asset price universe and its return statistics.
//!
//! References: Ledoit and Wolf (2004), "A well-conditioned estimator for
//! large-dimensional covariance matrices", for the shrinkage intensity.
//!
//! The universe aligns every series onto one date grid at construction, then
//! derives the per-asset log-return rows, their means and the unbiased sample
//! covariance. The covariance is filled for `j >= i` and mirrored, so
//! `cov[(i, j)] == cov[(j, i)]` holds bit-for-bit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{QuantError, Result, DEFAULT_PERIODS_PER_YEAR};
use crate::market::series::PriceSeries;
use crate::math::{sample_mean, sample_variance, DenseMatrix};

/// How series with different date grids are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentPolicy {
    /// Keep only dates present in every series.
    #[default]
    InnerJoin,
    /// Require identical date grids.
    Strict,
}

/// Named price series on a shared date grid, with derived return statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetUniverse {
    names: Vec<String>,
    dates: Vec<NaiveDate>,
    series: Vec<PriceSeries>,
    returns: DenseMatrix,
    mean_returns: Vec<f64>,
    covariance: DenseMatrix,
}

impl AssetUniverse {
    /// Aligns `series` under `policy`; assets are ordered by name.
    ///
    /// # Errors
    /// - [`QuantError::InsufficientData`] for an empty input or fewer than three aligned
    ///   dates (two returns are needed for a covariance).
    /// - [`QuantError::Alignment`] when grids differ under `Strict`, or fewer than two
    ///   dates are common under `InnerJoin`.
    /// - [`QuantError::InvalidParameter`] for two series with the same name.
    pub fn from_prices(
        series: impl IntoIterator<Item = PriceSeries>,
        policy: AlignmentPolicy,
    ) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for s in series {
            let name = s.name().to_string();
            if by_name.insert(name.clone(), s).is_some() {
                return Err(QuantError::invalid(
                    "series",
                    format!("duplicate asset name `{name}`"),
                ));
            }
        }
        if by_name.is_empty() {
            return Err(QuantError::InsufficientData(
                "universe needs at least one price series".to_string(),
            ));
        }

        let dates = match policy {
            AlignmentPolicy::Strict => strict_grid(&by_name)?,
            AlignmentPolicy::InnerJoin => common_dates(&by_name)?,
        };
        if dates.len() < 3 {
            return Err(QuantError::InsufficientData(format!(
                "{} aligned dates; covariance needs at least 3",
                dates.len()
            )));
        }

        let series = by_name
            .values()
            .map(|s| {
                if s.dates() == dates.as_slice() {
                    Ok(s.clone())
                } else {
                    s.restricted_to(&dates)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        let names: Vec<String> = by_name.into_keys().collect();

        let n_obs = dates.len() - 1;
        let mut returns = DenseMatrix::zeros(names.len(), n_obs);
        for (i, s) in series.iter().enumerate() {
            returns.row_mut(i).copy_from_slice(&s.log_returns()?);
        }
        let mean_returns: Vec<f64> = (0..names.len())
            .map(|i| sample_mean(returns.row(i)))
            .collect();
        let covariance = sample_covariance(&returns, &mean_returns);

        debug!(
            assets = names.len(),
            observations = dates.len(),
            ?policy,
            "aligned asset universe"
        );

        Ok(Self {
            names,
            dates,
            series,
            returns,
            mean_returns,
            covariance,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn n_assets(&self) -> usize {
        self.names.len()
    }

    /// Number of log-return observations per asset (aligned dates minus one).
    pub fn n_returns(&self) -> usize {
        self.returns.cols()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    pub fn series(&self, name: &str) -> Option<&PriceSeries> {
        self.index_of(name).map(|i| &self.series[i])
    }

    /// Log-returns of asset `i`.
    pub fn returns(&self, i: usize) -> &[f64] {
        self.returns.row(i)
    }

    /// Asset-by-time log-return matrix.
    pub fn return_matrix(&self) -> &DenseMatrix {
        &self.returns
    }

    /// Per-period mean log-returns, in asset order.
    pub fn mean_returns(&self) -> &[f64] {
        &self.mean_returns
    }

    /// Per-period unbiased sample covariance of log-returns.
    pub fn covariance(&self) -> &DenseMatrix {
        &self.covariance
    }

    pub fn correlation(&self) -> DenseMatrix {
        covariance_to_correlation(&self.covariance)
    }

    pub fn annualised_mean(&self, periods_per_year: f64) -> Vec<f64> {
        self.mean_returns
            .iter()
            .map(|m| m * periods_per_year)
            .collect()
    }

    pub fn annualised_covariance(&self, periods_per_year: f64) -> DenseMatrix {
        self.covariance.scaled(periods_per_year)
    }

    /// Ledoit-Wolf shrinkage of the sample covariance toward `(tr(S)/k) · I`.
    pub fn ledoit_wolf(&self) -> ShrinkageEstimate {
        let k = self.n_assets();
        let n = self.n_returns();
        let n_f = n as f64;

        // Population-normalised covariance drives the intensity estimate.
        let s_pop = self.covariance.scaled((n_f - 1.0) / n_f);
        let mu = s_pop.trace() / k as f64;

        let mut pi_hat = 0.0;
        for t in 0..n {
            for i in 0..k {
                let xi = self.returns.get(i, t) - self.mean_returns[i];
                for j in 0..k {
                    let xj = self.returns.get(j, t) - self.mean_returns[j];
                    let diff = xi * xj - s_pop.get(i, j);
                    pi_hat += diff * diff;
                }
            }
        }
        pi_hat /= n_f;

        let mut delta_hat = 0.0;
        for i in 0..k {
            for j in 0..k {
                let target = if i == j { mu } else { 0.0 };
                let diff = s_pop.get(i, j) - target;
                delta_hat += diff * diff;
            }
        }

        let intensity = if delta_hat <= f64::EPSILON {
            1.0
        } else {
            (pi_hat / n_f / delta_hat).clamp(0.0, 1.0)
        };
        let covariance = blend_with_identity(&self.covariance, intensity);
        ShrinkageEstimate {
            covariance,
            intensity,
        }
    }
}

/// Unbiased sample covariance of the universe's aligned log-returns.
pub fn covariance(universe: &AssetUniverse) -> DenseMatrix {
    universe.covariance().clone()
}

/// Covariance of the rows of an asset-by-time matrix given the row means.
pub fn sample_covariance(returns: &DenseMatrix, means: &[f64]) -> DenseMatrix {
    let k = returns.rows();
    let denom = (returns.cols() as f64 - 1.0).max(1.0);
    let mut cov = DenseMatrix::zeros(k, k);
    for i in 0..k {
        let ri = returns.row(i);
        for j in i..k {
            let rj = returns.row(j);
            let c = ri
                .iter()
                .zip(rj)
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum::<f64>()
                / denom;
            cov.set(i, j, c);
            cov.set(j, i, c);
        }
    }
    cov
}

pub fn covariance_to_correlation(cov: &DenseMatrix) -> DenseMatrix {
    let k = cov.rows();
    let std: Vec<f64> = cov.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect();
    let mut corr = DenseMatrix::zeros(k, k);
    for i in 0..k {
        for j in i..k {
            let c = if i == j {
                1.0
            } else if std[i] > 0.0 && std[j] > 0.0 {
                (cov.get(i, j) / (std[i] * std[j])).clamp(-1.0, 1.0)
            } else {
                0.0
            };
            corr.set(i, j, c);
            corr.set(j, i, c);
        }
    }
    corr
}

/// Shrunk covariance with the intensity that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShrinkageEstimate {
    pub covariance: DenseMatrix,
    pub intensity: f64,
}

/// `(1 - intensity) · S + intensity · (tr(S)/k) · I`.
///
/// Any positive intensity turns a singular but nonzero PSD covariance into a
/// positive definite one.
pub fn shrink_covariance(cov: &DenseMatrix, intensity: f64) -> Result<DenseMatrix> {
    if !cov.is_square() || cov.rows() == 0 {
        return Err(QuantError::invalid("cov", "must be square and non-empty"));
    }
    if !(0.0..=1.0).contains(&intensity) {
        return Err(QuantError::invalid(
            "intensity",
            format!("must lie in [0, 1], got {intensity}"),
        ));
    }
    Ok(blend_with_identity(cov, intensity))
}

fn blend_with_identity(cov: &DenseMatrix, intensity: f64) -> DenseMatrix {
    let k = cov.rows();
    let mu = cov.trace() / k as f64;
    let mut out = cov.scaled(1.0 - intensity);
    for i in 0..k {
        out.set(i, i, out.get(i, i) + intensity * mu);
    }
    out
}

/// GBM drift and volatility estimated from a price history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmCalibration {
    /// Annualised drift `μ` such that `E[S_t] = S_0 e^{μ t}`.
    pub drift: f64,
    /// Annualised log-return volatility `σ`.
    pub volatility: f64,
    pub periods_per_year: f64,
}

impl GbmCalibration {
    /// Estimates `σ² = Var(r)·P` and `μ = mean(r)·P + σ²/2` from log-returns `r`
    /// observed `P` times per year.
    pub fn from_series(series: &PriceSeries, periods_per_year: f64) -> Result<Self> {
        if !periods_per_year.is_finite() || periods_per_year <= 0.0 {
            return Err(QuantError::invalid(
                "periods_per_year",
                format!("must be finite and > 0, got {periods_per_year}"),
            ));
        }
        let returns = series.log_returns()?;
        if returns.len() < 2 {
            return Err(QuantError::InsufficientData(format!(
                "`{}` needs at least 3 prices to estimate volatility",
                series.name()
            )));
        }
        let variance = sample_variance(&returns) * periods_per_year;
        let drift = sample_mean(&returns) * periods_per_year + 0.5 * variance;
        Ok(Self {
            drift,
            volatility: variance.sqrt(),
            periods_per_year,
        })
    }

    /// Calibration assuming daily observations.
    pub fn from_daily(series: &PriceSeries) -> Result<Self> {
        Self::from_series(series, DEFAULT_PERIODS_PER_YEAR)
    }
}

fn strict_grid(by_name: &BTreeMap<String, PriceSeries>) -> Result<Vec<NaiveDate>> {
    let mut iter = by_name.values();
    let first = match iter.next() {
        Some(s) => s,
        None => return Ok(Vec::new()),
    };
    for other in iter {
        if other.dates() != first.dates() {
            return Err(QuantError::Alignment(format!(
                "`{}` ({} dates) and `{}` ({} dates) do not share a timestamp grid",
                first.name(),
                first.len(),
                other.name(),
                other.len()
            )));
        }
    }
    Ok(first.dates().to_vec())
}

fn common_dates(by_name: &BTreeMap<String, PriceSeries>) -> Result<Vec<NaiveDate>> {
    let mut iter = by_name.values();
    let mut common: BTreeSet<NaiveDate> = match iter.next() {
        Some(s) => s.dates().iter().copied().collect(),
        None => BTreeSet::new(),
    };
    for s in iter {
        let dates: BTreeSet<NaiveDate> = s.dates().iter().copied().collect();
        common = common.intersection(&dates).copied().collect();
    }
    if common.len() < 2 {
        return Err(QuantError::Alignment(format!(
            "only {} common date(s) across {} series",
            common.len(),
            by_name.len()
        )));
    }
    Ok(common.into_iter().collect())
}
