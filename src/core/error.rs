//! Library-wide error type and the non-fatal solver warning.
//!
//! Every fallible operation returns [`Result<T>`]. Failures are deterministic
//! given identical inputs, so nothing in the crate retries internally; each
//! variant carries enough context (parameter name, matrix label, pivot value,
//! sample counts) for the caller to remediate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate result alias.
pub type Result<T> = std::result::Result<T, QuantError>;

/// Coarse classification of [`QuantError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed, misaligned or out-of-domain caller input.
    Input,
    /// A numerically ill-posed problem (singular matrix, arbitrage, too few samples).
    Numerical,
    /// A long-running computation stopped by its cancellation flag.
    Cancelled,
    /// Reading or writing an external file failed.
    Io,
}

/// Errors surfaced by market-data, simulation, pricing, risk and optimisation APIs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantError {
    /// Price series do not share a timestamp grid, or timestamps are not strictly increasing.
    #[error("alignment error: {0}")]
    Alignment(String),
    /// Too few observations to derive the requested statistic.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// A scalar or vector argument is non-finite or outside its domain.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the public API.
        name: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
    /// The engine cannot price the requested exercise style.
    #[error("unsupported exercise style: {0}")]
    UnsupportedStyle(String),
    /// Lattice parameters admit arbitrage (risk-neutral probability outside `(0, 1)`).
    #[error("arbitrage-violating lattice: p={p}, u={u}, d={d}")]
    Arbitrage {
        /// Risk-neutral up probability.
        p: f64,
        /// Up factor.
        u: f64,
        /// Down factor.
        d: f64,
    },
    /// Quantile estimation requested on fewer samples than the configured minimum.
    #[error("insufficient samples: {available} available, {required} required")]
    InsufficientSamples {
        /// Number of samples supplied.
        available: usize,
        /// Configured minimum.
        required: usize,
    },
    /// Matrix factorisation hit a pivot below tolerance; regularise (e.g. shrinkage) and retry.
    #[error("singular matrix `{matrix}`: pivot {pivot:e} at column {column}")]
    SingularCovariance {
        /// Label of the matrix being factorised.
        matrix: String,
        /// Column at which elimination broke down.
        column: usize,
        /// Offending pivot magnitude.
        pivot: f64,
    },
    /// A simulation observed its cancellation flag between batches.
    #[error("cancelled after {completed} of {total} batches")]
    Cancelled {
        /// Batches finished before cancellation was observed.
        completed: usize,
        /// Total batches scheduled.
        total: usize,
    },
    /// Filesystem failure.
    #[error("io error on `{path}`: {message}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying error text.
        message: String,
    },
    /// Malformed CSV content.
    #[error("csv error in `{path}`: {message}")]
    Csv {
        /// Path or label of the CSV source.
        path: String,
        /// Underlying parser error text.
        message: String,
    },
}

impl QuantError {
    /// Shorthand for [`QuantError::InvalidParameter`].
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Returns the error's category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Alignment(_)
            | Self::InsufficientData(_)
            | Self::InvalidParameter { .. }
            | Self::UnsupportedStyle(_) => ErrorCategory::Input,
            Self::Arbitrage { .. }
            | Self::InsufficientSamples { .. }
            | Self::SingularCovariance { .. } => ErrorCategory::Numerical,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Io { .. } | Self::Csv { .. } => ErrorCategory::Io,
        }
    }
}

/// Fails with [`QuantError::InvalidParameter`] unless `value` is finite.
#[inline]
pub fn ensure_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(QuantError::invalid(name, format!("must be finite, got {value}")))
    }
}

/// Fails unless `value` is finite and strictly positive.
#[inline]
pub fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(QuantError::invalid(name, format!("must be > 0, got {value}")))
    }
}

/// Fails unless `value` is finite and non-negative.
#[inline]
pub fn ensure_non_negative(name: &'static str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(QuantError::invalid(name, format!("must be >= 0, got {value}")))
    }
}

/// Fails unless `confidence` lies strictly inside `(0, 1)`.
#[inline]
pub fn ensure_confidence(confidence: f64) -> Result<()> {
    if confidence.is_finite() && confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(QuantError::invalid(
            "confidence",
            format!("must lie in (0, 1), got {confidence}"),
        ))
    }
}

/// Iterative solver stopped at its iteration limit; the accompanying result is the
/// best feasible point found and may be approximate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    /// Solver that stopped early.
    pub solver: String,
    /// Iterations performed.
    pub iterations: usize,
    /// Optimality residual at the returned point.
    pub residual: f64,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reached its iteration limit after {} iterations (residual {:e})",
            self.solver, self.iterations, self.residual
        )
    }
}
