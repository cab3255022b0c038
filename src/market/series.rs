//! Single-asset price history.

use chrono::NaiveDate;
use serde::Serialize;

use crate::core::{QuantError, Result};

/// Ordered `(date, price)` observations for one asset.
///
/// Dates are strictly increasing and prices finite and positive; both are checked
/// once at construction and the series is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    name: String,
    dates: Vec<NaiveDate>,
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Builds a series from observations already in chronological order.
    ///
    /// # Errors
    /// - [`QuantError::InvalidParameter`] for a non-finite or non-positive price.
    /// - [`QuantError::Alignment`] when a date does not strictly follow its predecessor.
    pub fn new(name: impl Into<String>, observations: Vec<(NaiveDate, f64)>) -> Result<Self> {
        let name = name.into();
        let mut dates = Vec::with_capacity(observations.len());
        let mut prices = Vec::with_capacity(observations.len());
        for (date, price) in observations {
            if !price.is_finite() || price <= 0.0 {
                return Err(QuantError::invalid(
                    "price",
                    format!("`{name}` has price {price} on {date}; prices must be finite and > 0"),
                ));
            }
            if let Some(prev) = dates.last() {
                if date <= *prev {
                    return Err(QuantError::Alignment(format!(
                        "`{name}`: {date} does not strictly follow {prev}"
                    )));
                }
            }
            dates.push(date);
            prices.push(price);
        }
        Ok(Self {
            name,
            dates,
            prices,
        })
    }

    /// Sorts observations by date before validating; duplicate dates are still rejected.
    pub fn from_unordered(
        name: impl Into<String>,
        mut observations: Vec<(NaiveDate, f64)>,
    ) -> Result<Self> {
        observations.sort_by_key(|(date, _)| *date);
        Self::new(name, observations)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last_price(&self) -> Option<f64> {
        self.prices.last().copied()
    }

    /// Price on `date`, if observed.
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.prices[idx])
    }

    /// `ln(P_t / P_{t-1})`, length `len - 1`.
    pub fn log_returns(&self) -> Result<Vec<f64>> {
        self.require_two()?;
        Ok(self.prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
    }

    /// `P_t / P_{t-1} - 1`, length `len - 1`.
    pub fn simple_returns(&self) -> Result<Vec<f64>> {
        self.require_two()?;
        Ok(self.prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect())
    }

    fn require_two(&self) -> Result<()> {
        if self.prices.len() < 2 {
            return Err(QuantError::InsufficientData(format!(
                "`{}` has {} observation(s); returns need at least 2",
                self.name,
                self.prices.len()
            )));
        }
        Ok(())
    }

    /// Restriction of the series to `dates`, which must all be present.
    pub(crate) fn restricted_to(&self, dates: &[NaiveDate]) -> Result<Self> {
        let observations = dates
            .iter()
            .map(|date| {
                self.price_on(*date).map(|p| (*date, p)).ok_or_else(|| {
                    QuantError::Alignment(format!("`{}` has no observation on {date}", self.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.name.clone(), observations)
    }
}

/// Log-returns of a series; fails with [`QuantError::InsufficientData`] below two observations.
pub fn log_returns(series: &PriceSeries) -> Result<Vec<f64>> {
    series.log_returns()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn log_returns_have_length_n_minus_one() {
        let s = PriceSeries::new("A", vec![(d(1), 100.0), (d(2), 110.0), (d(3), 99.0)]).unwrap();
        let r = log_returns(&s).unwrap();
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], (1.1_f64).ln(), epsilon = 1e-15);
        assert_relative_eq!(r[1], (0.9_f64).ln(), epsilon = 1e-15);
        let simple = s.simple_returns().unwrap();
        assert_relative_eq!(simple[1], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn single_observation_is_insufficient() {
        let s = PriceSeries::new("A", vec![(d(1), 100.0)]).unwrap();
        assert!(matches!(
            s.log_returns(),
            Err(QuantError::InsufficientData(_))
        ));
    }

    #[test]
    fn duplicate_or_decreasing_dates_are_alignment_errors() {
        let dup = PriceSeries::new("A", vec![(d(1), 100.0), (d(1), 101.0)]);
        assert!(matches!(dup, Err(QuantError::Alignment(_))));
        let back = PriceSeries::new("A", vec![(d(2), 100.0), (d(1), 101.0)]);
        assert!(matches!(back, Err(QuantError::Alignment(_))));
        let sorted = PriceSeries::from_unordered("A", vec![(d(2), 100.0), (d(1), 101.0)]).unwrap();
        assert_eq!(sorted.dates(), &[d(1), d(2)]);
    }

    #[test]
    fn non_positive_prices_are_rejected() {
        assert!(PriceSeries::new("A", vec![(d(1), 0.0)]).is_err());
        assert!(PriceSeries::new("A", vec![(d(1), f64::NAN)]).is_err());
    }
}
