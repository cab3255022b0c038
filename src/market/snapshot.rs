//! Single-underlying market snapshot consumed by the pricing engines.

use serde::{Deserialize, Serialize};

use crate::core::{ensure_finite, ensure_non_negative, ensure_positive, QuantError, Result};
use crate::market::series::PriceSeries;
use crate::market::universe::GbmCalibration;

/// Spot, flat rates and flat volatility for one underlying.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Spot price.
    pub spot: f64,
    /// Continuously compounded risk-free rate.
    pub rate: f64,
    /// Continuously compounded dividend yield.
    pub dividend_yield: f64,
    /// Flat Black-Scholes volatility.
    pub vol: f64,
}

impl Market {
    /// Starts a market builder.
    ///
    /// # Examples
    /// ```
    /// use sierra::market::Market;
    ///
    /// let market = Market::builder()
    ///     .spot(100.0)
    ///     .rate(0.03)
    ///     .dividend_yield(0.01)
    ///     .flat_vol(0.20)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(market.spot(), 100.0);
    /// ```
    #[inline]
    pub fn builder() -> MarketBuilder {
        MarketBuilder::default()
    }

    /// Snapshot at the last observed price of `series`, with volatility calibrated
    /// from its log-returns.
    pub fn calibrated(series: &PriceSeries, rate: f64, periods_per_year: f64) -> Result<Self> {
        let calibration = GbmCalibration::from_series(series, periods_per_year)?;
        let spot = series.last_price().ok_or_else(|| {
            QuantError::InsufficientData(format!("`{}` has no prices", series.name()))
        })?;
        Self::builder()
            .spot(spot)
            .rate(rate)
            .flat_vol(calibration.volatility)
            .build()
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn dividend(&self) -> f64 {
        self.dividend_yield
    }

    #[inline]
    pub fn vol(&self) -> f64 {
        self.vol
    }

    /// Copy with a different spot.
    pub fn with_spot(&self, spot: f64) -> Self {
        Self { spot, ..*self }
    }

    /// Copy with a different volatility.
    pub fn with_vol(&self, vol: f64) -> Self {
        Self { vol, ..*self }
    }

    /// Copy with a different rate.
    pub fn with_rate(&self, rate: f64) -> Self {
        Self { rate, ..*self }
    }

    /// Checks field domains: positive spot, finite rates, non-negative volatility.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("spot", self.spot)?;
        ensure_finite("rate", self.rate)?;
        ensure_finite("dividend_yield", self.dividend_yield)?;
        ensure_non_negative("vol", self.vol)
    }
}

/// Builder for [`Market`].
#[derive(Debug, Clone, Default)]
pub struct MarketBuilder {
    spot: Option<f64>,
    rate: Option<f64>,
    dividend_yield: Option<f64>,
    flat_vol: Option<f64>,
}

impl MarketBuilder {
    #[inline]
    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    #[inline]
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    #[inline]
    pub fn dividend_yield(mut self, dividend_yield: f64) -> Self {
        self.dividend_yield = Some(dividend_yield);
        self
    }

    #[inline]
    pub fn flat_vol(mut self, vol: f64) -> Self {
        self.flat_vol = Some(vol);
        self
    }

    /// Validates and builds a [`Market`].
    ///
    /// # Errors
    /// [`QuantError::InvalidParameter`] when spot or volatility is missing, spot is not
    /// positive, volatility is negative, or any field is non-finite. Rate and dividend
    /// yield default to zero.
    pub fn build(self) -> Result<Market> {
        let spot = self
            .spot
            .ok_or_else(|| QuantError::invalid("spot", "market spot is required"))?;
        let vol = self
            .flat_vol
            .ok_or_else(|| QuantError::invalid("vol", "market flat_vol is required"))?;
        let market = Market {
            spot,
            rate: self.rate.unwrap_or(0.0),
            dividend_yield: self.dividend_yield.unwrap_or(0.0),
            vol,
        };
        market.validate()?;
        Ok(market)
    }
}
