//! Pricing engine contract and its result payload.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::error::Result;
use crate::instruments::OptionContract;
use crate::market::Market;

/// Standardized Greeks container used by engine results.
///
/// Theta is reported per year of calendar time (`∂V/∂t`), vega per unit of
/// volatility and rho per unit of rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, serde::Deserialize)]
pub struct Greeks {
    /// First derivative to spot.
    pub delta: f64,
    /// Second derivative to spot.
    pub gamma: f64,
    /// First derivative to volatility.
    pub vega: f64,
    /// First derivative to time.
    pub theta: f64,
    /// First derivative to rate.
    pub rho: f64,
}

/// Pricing engine abstraction shared by the closed-form, lattice and Monte Carlo engines.
pub trait PricingEngine {
    /// Prices `contract` under the provided market state.
    fn price(&self, contract: &OptionContract, market: &Market) -> Result<PriceResult>;
}

/// Compact key set for engine diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagKey {
    /// 1.0 when antithetic pairs were simulated.
    Antithetic,
    /// Black-Scholes `d1`.
    D1,
    /// Black-Scholes `d2`.
    D2,
    /// `exp(-rT)`.
    DiscountFactor,
    NumPaths,
    NumSteps,
    /// Risk-neutral up probability of a lattice step.
    Pu,
    /// Seed actually used, including one drawn from entropy.
    Seed,
    /// Lattice up factor.
    U,
    Vol,
}

impl DiagKey {
    /// Snake-case name used in [`Diagnostics::get`] and serialized output.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Antithetic => "antithetic",
            Self::D1 => "d1",
            Self::D2 => "d2",
            Self::DiscountFactor => "discount_factor",
            Self::NumPaths => "num_paths",
            Self::NumSteps => "num_steps",
            Self::Pu => "pu",
            Self::Seed => "seed",
            Self::U => "u",
            Self::Vol => "vol",
        }
    }
}

impl std::str::FromStr for DiagKey {
    type Err = ();

    fn from_str(key: &str) -> std::result::Result<Self, Self::Err> {
        match key {
            "antithetic" => Ok(Self::Antithetic),
            "d1" => Ok(Self::D1),
            "d2" => Ok(Self::D2),
            "discount_factor" => Ok(Self::DiscountFactor),
            "num_paths" => Ok(Self::NumPaths),
            "num_steps" => Ok(Self::NumSteps),
            "pu" => Ok(Self::Pu),
            "seed" => Ok(Self::Seed),
            "u" => Ok(Self::U),
            "vol" => Ok(Self::Vol),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DiagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Small keyed store of engine scalars (steps, paths, seed, tree factors).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<(DiagKey, f64)>,
}

impl Diagnostics {
    /// Empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites `key`, returning the previous value.
    pub fn insert_key(&mut self, key: DiagKey, value: f64) -> Option<f64> {
        for (entry_key, existing) in &mut self.entries {
            if *entry_key == key {
                return Some(std::mem::replace(existing, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    /// Value recorded under `key`, if any.
    #[inline]
    pub fn get_key(&self, key: DiagKey) -> Option<f64> {
        self.entries
            .iter()
            .find_map(|(entry_key, value)| (*entry_key == key).then_some(*value))
    }

    /// Looks a value up by its string name (`"num_paths"`, `"pu"`, ...).
    #[inline]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.get_key(key.parse().ok()?)
    }

    /// `(name, value)` pairs in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Serialize for Diagnostics {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

/// Unified engine result payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceResult {
    /// Present value.
    pub price: f64,
    /// Standard error (Monte Carlo only).
    pub stderr: Option<f64>,
    /// Greeks when available from the engine.
    pub greeks: Option<Greeks>,
    /// Engine-specific scalar diagnostics.
    pub diagnostics: Diagnostics,
}

impl PriceResult {
    /// Result carrying only a price.
    pub fn from_price(price: f64) -> Self {
        Self {
            price,
            stderr: None,
            greeks: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Half-width of the symmetric confidence interval at `z` standard errors, if any.
    pub fn confidence_half_width(&self, z: f64) -> Option<f64> {
        self.stderr.map(|se| z * se)
    }
}
