//! Named portfolio weight vectors.

use serde::{Deserialize, Serialize};

use crate::core::{ensure_finite, QuantError, Result};

/// Weights keyed by asset name, in universe order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioWeights {
    names: Vec<String>,
    values: Vec<f64>,
}

impl PortfolioWeights {
    /// # Errors
    /// [`QuantError::InvalidParameter`] on a length mismatch, a duplicate name or a
    /// non-finite weight.
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if names.len() != values.len() {
            return Err(QuantError::invalid(
                "weights",
                format!("{} names but {} weights", names.len(), values.len()),
            ));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(QuantError::invalid("weights", format!("duplicate asset `{name}`")));
            }
        }
        for &w in &values {
            ensure_finite("weights", w)?;
        }
        Ok(Self { names, values })
    }

    /// `1/n` in every asset.
    pub fn equal(names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Err(QuantError::InsufficientData("no assets to weight".to_string()));
        }
        let w = 1.0 / names.len() as f64;
        Self::new(names.to_vec(), vec![w; names.len()])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Sum of negative weights.
    pub fn short_exposure(&self) -> f64 {
        self.values.iter().filter(|w| **w < 0.0).sum()
    }
}
