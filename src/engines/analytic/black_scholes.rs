//! Module `engines::analytic::black_scholes`.
//!
//! Black-Scholes-Merton closed form for European vanillas with a continuous
//! dividend yield, its analytic Greeks, and implied-volatility inversion.
//!
//! References: Hull (11th ed.) Ch. 15 and 19, Eq. (15.20)-(15.21) for prices and
//! Table 19.6 for the Greeks.
//!
//! Numerical considerations: `expiry == 0` returns intrinsic value with zero
//! Greeks; implied volatility uses Newton on vega with a bisection fallback when
//! vega is too small (deep in/out of the money).

use tracing::debug;

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, Greeks, OptionType, PriceResult, PricingEngine,
    QuantError, Result,
};
use crate::instruments::OptionContract;
use crate::market::Market;
use crate::math::{bisection, newton_raphson, normal_cdf, normal_pdf};

/// Analytic Black-Scholes engine for European vanilla options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackScholesEngine;

impl BlackScholesEngine {
    pub fn new() -> Self {
        Self
    }
}

#[inline]
fn d1_d2(
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> (f64, f64) {
    let sig_sqrt_t = vol * expiry.sqrt();
    let d1 =
        ((spot / strike).ln() + (rate - dividend_yield + 0.5 * vol * vol) * expiry) / sig_sqrt_t;
    (d1, d1 - sig_sqrt_t)
}

#[inline]
pub fn bs_price(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 {
        return option_type.intrinsic(spot, strike);
    }
    let df_r = (-rate * expiry).exp();
    let df_q = (-dividend_yield * expiry).exp();
    if vol <= 0.0 {
        return option_type.intrinsic(spot * df_q, strike * df_r);
    }

    let (d1, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    match option_type {
        OptionType::Call => spot * df_q * normal_cdf(d1) - strike * df_r * normal_cdf(d2),
        OptionType::Put => strike * df_r * normal_cdf(-d2) - spot * df_q * normal_cdf(-d1),
    }
}

#[inline]
pub fn bs_delta(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 {
        return 0.0;
    }
    let (d1, _) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let df_q = (-dividend_yield * expiry).exp();
    match option_type {
        OptionType::Call => df_q * normal_cdf(d1),
        OptionType::Put => df_q * (normal_cdf(d1) - 1.0),
    }
}

#[inline]
pub fn bs_gamma(
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 || spot <= 0.0 {
        return 0.0;
    }
    let (d1, _) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let df_q = (-dividend_yield * expiry).exp();
    df_q * normal_pdf(d1) / (spot * vol * expiry.sqrt())
}

#[inline]
pub fn bs_vega(
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 || spot <= 0.0 {
        return 0.0;
    }
    let (d1, _) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let df_q = (-dividend_yield * expiry).exp();
    spot * df_q * normal_pdf(d1) * expiry.sqrt()
}

/// Calendar-time theta `∂V/∂t` per year.
#[inline]
pub fn bs_theta(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 || spot <= 0.0 {
        return 0.0;
    }
    let (d1, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let sqrt_t = expiry.sqrt();
    let df_q = (-dividend_yield * expiry).exp();
    let df_r = (-rate * expiry).exp();
    let decay = -spot * df_q * normal_pdf(d1) * vol / (2.0 * sqrt_t);
    match option_type {
        OptionType::Call => {
            decay + dividend_yield * spot * df_q * normal_cdf(d1)
                - rate * strike * df_r * normal_cdf(d2)
        }
        OptionType::Put => {
            decay - dividend_yield * spot * df_q * normal_cdf(-d1)
                + rate * strike * df_r * normal_cdf(-d2)
        }
    }
}

#[inline]
pub fn bs_rho(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> f64 {
    if expiry <= 0.0 || vol <= 0.0 || spot <= 0.0 {
        return 0.0;
    }
    let (_, d2) = d1_d2(spot, strike, rate, dividend_yield, vol, expiry);
    let df_r = (-rate * expiry).exp();
    match option_type {
        OptionType::Call => strike * expiry * df_r * normal_cdf(d2),
        OptionType::Put => -strike * expiry * df_r * normal_cdf(-d2),
    }
}

/// All five analytic Greeks.
pub fn bs_greeks(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
) -> Greeks {
    Greeks {
        delta: bs_delta(option_type, spot, strike, rate, dividend_yield, vol, expiry),
        gamma: bs_gamma(spot, strike, rate, dividend_yield, vol, expiry),
        vega: bs_vega(spot, strike, rate, dividend_yield, vol, expiry),
        theta: bs_theta(option_type, spot, strike, rate, dividend_yield, vol, expiry),
        rho: bs_rho(option_type, spot, strike, rate, dividend_yield, vol, expiry),
    }
}

impl PricingEngine for BlackScholesEngine {
    fn price(&self, contract: &OptionContract, market: &Market) -> Result<PriceResult> {
        contract.validate()?;
        market.validate()?;

        if contract.exercise() != ExerciseStyle::European {
            return Err(QuantError::UnsupportedStyle(format!(
                "closed-form Black-Scholes prices European exercise only, got {}",
                contract.exercise().as_str()
            )));
        }

        if contract.expiry() <= 0.0 {
            return Ok(PriceResult {
                greeks: Some(Greeks::default()),
                ..PriceResult::from_price(contract.intrinsic(market.spot))
            });
        }

        let vol = market.vol;
        if vol <= 0.0 {
            return Err(QuantError::invalid("vol", "market volatility must be > 0"));
        }

        let (d1, d2) = d1_d2(
            market.spot,
            contract.strike(),
            market.rate,
            market.dividend_yield,
            vol,
            contract.expiry(),
        );
        let price = bs_price(
            contract.option_type(),
            market.spot,
            contract.strike(),
            market.rate,
            market.dividend_yield,
            vol,
            contract.expiry(),
        );
        let greeks = bs_greeks(
            contract.option_type(),
            market.spot,
            contract.strike(),
            market.rate,
            market.dividend_yield,
            vol,
            contract.expiry(),
        );

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::Vol, vol);
        diagnostics.insert_key(DiagKey::D1, d1);
        diagnostics.insert_key(DiagKey::D2, d2);
        debug!(price, d1, d2, vol, "black-scholes price");

        Ok(PriceResult {
            price,
            stderr: None,
            greeks: Some(greeks),
            diagnostics,
        })
    }
}

/// Volatility at which the Black-Scholes price of `contract` equals `target_price`.
///
/// # Errors
/// [`QuantError::InvalidParameter`] when `target_price` lies outside the no-arbitrage
/// band `(intrinsic forward value, upper bound)` or the expiry is zero.
pub fn implied_volatility(
    contract: &OptionContract,
    market: &Market,
    target_price: f64,
) -> Result<f64> {
    contract.validate()?;
    let expiry = contract.expiry();
    if expiry <= 0.0 {
        return Err(QuantError::invalid("expiry", "implied volatility needs expiry > 0"));
    }
    let (spot, strike, rate, q) = (
        market.spot,
        contract.strike(),
        market.rate,
        market.dividend_yield,
    );
    let option_type = contract.option_type();
    let df_q = (-q * expiry).exp();
    let df_r = (-rate * expiry).exp();
    let lower = option_type.intrinsic(spot * df_q, strike * df_r);
    let upper = match option_type {
        OptionType::Call => spot * df_q,
        OptionType::Put => strike * df_r,
    };
    if !target_price.is_finite() || target_price <= lower || target_price >= upper {
        return Err(QuantError::invalid(
            "target_price",
            format!("{target_price} is outside the no-arbitrage band ({lower}, {upper})"),
        ));
    }

    let objective = |vol: f64| bs_price(option_type, spot, strike, rate, q, vol, expiry) - target_price;
    let vega = |vol: f64| bs_vega(spot, strike, rate, q, vol, expiry);

    match newton_raphson(objective, vega, 0.2, 1e-12, 100) {
        Ok(vol) if vol > 0.0 => Ok(vol),
        _ => bisection(objective, 1e-8, 10.0, 1e-12, 500).map_err(|_| {
            QuantError::invalid("target_price", "implied volatility did not converge")
        }),
    }
}
