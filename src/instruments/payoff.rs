//! Payoffs evaluated on a simulated price path.
//!
//! A path is one row of [`crate::mc::SimulatedPaths`]: element `0` is the spot at
//! inception and the last element the price at expiry. Asian averages use the
//! monitoring dates after inception; barriers are monitored discretely on every
//! element, inception included.

use serde::{Deserialize, Serialize};

use crate::core::{ensure_non_negative, ensure_positive, Averaging, BarrierSpec, BarrierStyle, Result};
use crate::instruments::vanilla::OptionContract;

/// Path-dependent payoff applied to a contract's side and strike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PathPayoff {
    /// Terminal `max(±(S_T − K), 0)`.
    #[default]
    Vanilla,
    /// Fixed-strike average-price option.
    Asian(Averaging),
    /// Knock-in/out option paying the vanilla payoff, or the rebate at expiry
    /// when knocked out or never knocked in.
    Barrier(BarrierSpec),
}

impl PathPayoff {
    pub fn validate(&self) -> Result<()> {
        if let Self::Barrier(spec) = self {
            ensure_positive("barrier.level", spec.level)?;
            ensure_non_negative("barrier.rebate", spec.rebate)?;
        }
        Ok(())
    }

    /// Undiscounted payoff of `contract` on `path`.
    pub fn evaluate(&self, contract: &OptionContract, path: &[f64]) -> f64 {
        let terminal = path[path.len() - 1];
        match self {
            Self::Vanilla => contract.intrinsic(terminal),
            Self::Asian(averaging) => contract.intrinsic(path_average(*averaging, path)),
            Self::Barrier(spec) => {
                let hit = path.iter().any(|s| spec.is_breached(*s));
                let alive = match spec.style {
                    BarrierStyle::Out => !hit,
                    BarrierStyle::In => hit,
                };
                if alive {
                    contract.intrinsic(terminal)
                } else {
                    spec.rebate
                }
            }
        }
    }
}

fn path_average(averaging: Averaging, path: &[f64]) -> f64 {
    let fixings = if path.len() > 1 { &path[1..] } else { path };
    let n = fixings.len() as f64;
    match averaging {
        Averaging::Arithmetic => fixings.iter().sum::<f64>() / n,
        Averaging::Geometric => (fixings.iter().map(|s| s.ln()).sum::<f64>() / n).exp(),
    }
}
