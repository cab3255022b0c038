//! Module `engines::tree::binomial`.
//!
//! Cox-Ross-Rubinstein binomial lattice for European and American vanillas.
//!
//! References: Hull (11th ed.) Ch. 13 and 21, Cox-Ross-Rubinstein (1979), backward
//! induction around Eq. (13.10).
//!
//! Numerical considerations: plain CRR prices oscillate with the parity of the step
//! count. With `smoothing` enabled (the default) the engine averages the `N` and
//! `N + 1` step trees, which removes most of the odd/even wobble at the cost of
//! one extra tree. Delta, gamma and theta are read from the first two tree layers;
//! vega and rho use central bumps of the whole lattice, falling back to a one-sided
//! bump when the shifted lattice would violate `0 < p < 1`.

use tracing::debug;

use crate::core::{
    DiagKey, Diagnostics, ExerciseStyle, Greeks, OptionType, PriceResult, PricingEngine,
    QuantError, Result,
};
use crate::instruments::OptionContract;
use crate::market::Market;

const VEGA_BUMP: f64 = 1e-3;
const RHO_BUMP: f64 = 1e-4;
const MAX_BUMP_HALVINGS: usize = 8;

/// Cox-Ross-Rubinstein binomial tree engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinomialTreeEngine {
    /// Number of tree steps.
    pub steps: usize,
    /// Average the `steps` and `steps + 1` trees.
    pub smoothing: bool,
    /// Report lattice Greeks alongside the price.
    pub compute_greeks: bool,
}

impl BinomialTreeEngine {
    /// Creates a smoothed tree engine with the given number of steps.
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            smoothing: true,
            compute_greeks: true,
        }
    }

    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_greeks(mut self, compute_greeks: bool) -> Self {
        self.compute_greeks = compute_greeks;
        self
    }

    /// Bump-and-reprice sensitivity around `base`.
    ///
    /// Central difference when both bumped lattices are arbitrage-free, one-sided when
    /// only one is, otherwise the bump is halved. NaN if no bump admits a lattice.
    fn bumped_slope(&self, base: f64, bump: f64, shifted: impl Fn(f64) -> LatticeInputs) -> f64 {
        let mut h = bump;
        for _ in 0..MAX_BUMP_HALVINGS {
            let up = self.smoothed(&shifted(h)).ok();
            let down = self.smoothed(&shifted(-h)).ok();
            match (up, down) {
                (Some(up), Some(down)) => return (up.value - down.value) / (2.0 * h),
                (Some(up), None) => return (up.value - base) / h,
                (None, Some(down)) => return (base - down.value) / h,
                (None, None) => h *= 0.5,
            }
        }
        debug!(bump, "no arbitrage-free bump for lattice sensitivity");
        f64::NAN
    }

    fn smoothed(&self, inputs: &LatticeInputs) -> Result<LatticeOutput> {
        let base = crr_lattice(inputs, self.steps)?;
        if !self.smoothing {
            return Ok(base);
        }
        let next = crr_lattice(inputs, self.steps + 1)?;
        Ok(base.averaged(&next))
    }
}

#[derive(Debug, Clone, Copy)]
struct LatticeInputs {
    option_type: OptionType,
    american: bool,
    spot: f64,
    strike: f64,
    rate: f64,
    dividend_yield: f64,
    vol: f64,
    expiry: f64,
}

/// Root value plus the greeks read off the first two layers.
#[derive(Debug, Clone, Copy)]
struct LatticeOutput {
    value: f64,
    delta: f64,
    gamma: f64,
    theta: f64,
    u: f64,
    p: f64,
}

impl LatticeOutput {
    fn averaged(&self, other: &Self) -> Self {
        Self {
            value: 0.5 * (self.value + other.value),
            delta: 0.5 * (self.delta + other.delta),
            gamma: 0.5 * (self.gamma + other.gamma),
            theta: 0.5 * (self.theta + other.theta),
            u: self.u,
            p: self.p,
        }
    }
}

/// Risk-neutral CRR parameters `(u, d, p)` for one step of length `dt`.
///
/// # Errors
/// [`QuantError::Arbitrage`] unless `0 < p < 1`.
pub fn crr_parameters(rate: f64, dividend_yield: f64, vol: f64, dt: f64) -> Result<(f64, f64, f64)> {
    let u = (vol * dt.sqrt()).exp();
    let d = 1.0 / u;
    let growth = ((rate - dividend_yield) * dt).exp();
    let p = (growth - d) / (u - d);
    if !(p > 0.0 && p < 1.0) {
        return Err(QuantError::Arbitrage { p, u, d });
    }
    Ok((u, d, p))
}

fn crr_lattice(inputs: &LatticeInputs, steps: usize) -> Result<LatticeOutput> {
    let dt = inputs.expiry / steps as f64;
    let (u, d, p) = crr_parameters(inputs.rate, inputs.dividend_yield, inputs.vol, dt)?;
    let disc = (-inputs.rate * dt).exp();
    let disc_p = disc * p;
    let disc_1mp = disc * (1.0 - p);

    // spot * u^j * d^(steps-j) = spot * d^steps * (u/d)^j
    let ratio = u / d;
    let (option_type, strike) = (inputs.option_type, inputs.strike);

    let mut layer1 = [0.0; 2];
    let mut layer2 = [0.0; 3];
    let mut capture = |layer: usize, values: &[f64]| match layer {
        2 => layer2.copy_from_slice(&values[..3]),
        1 => layer1.copy_from_slice(&values[..2]),
        _ => {}
    };

    let mut values = vec![0.0_f64; steps + 1];
    let mut st = inputs.spot * d.powi(steps as i32);
    for value in values.iter_mut() {
        *value = option_type.intrinsic(st, strike);
        st *= ratio;
    }
    capture(steps, &values);

    let mut base = inputs.spot * d.powi(steps as i32 - 1);
    for i in (0..steps).rev() {
        if inputs.american {
            let mut st = base;
            for j in 0..=i {
                let continuation = disc_p.mul_add(values[j + 1], disc_1mp * values[j]);
                values[j] = continuation.max(option_type.intrinsic(st, strike));
                st *= ratio;
            }
        } else {
            for j in 0..=i {
                values[j] = disc_p.mul_add(values[j + 1], disc_1mp * values[j]);
            }
        }
        capture(i, &values);
        base *= u;
    }

    let spot = inputs.spot;
    let value = values[0];
    let delta = (layer1[1] - layer1[0]) / (spot * u - spot * d);
    let (gamma, theta) = if steps >= 2 {
        let (s_uu, s_dd) = (spot * u * u, spot * d * d);
        let delta_up = (layer2[2] - layer2[1]) / (s_uu - spot);
        let delta_down = (layer2[1] - layer2[0]) / (spot - s_dd);
        (
            (delta_up - delta_down) / (0.5 * (s_uu - s_dd)),
            (layer2[1] - value) / (2.0 * dt),
        )
    } else {
        (0.0, 0.0)
    };

    Ok(LatticeOutput {
        value,
        delta,
        gamma,
        theta,
        u,
        p,
    })
}

impl PricingEngine for BinomialTreeEngine {
    fn price(&self, contract: &OptionContract, market: &Market) -> Result<PriceResult> {
        contract.validate()?;
        market.validate()?;

        if self.steps == 0 {
            return Err(QuantError::invalid("steps", "binomial steps must be > 0"));
        }

        if contract.expiry() <= 0.0 {
            return Ok(PriceResult {
                greeks: Some(Greeks::default()),
                ..PriceResult::from_price(contract.intrinsic(market.spot))
            });
        }

        let inputs = LatticeInputs {
            option_type: contract.option_type(),
            american: contract.exercise() == ExerciseStyle::American,
            spot: market.spot,
            strike: contract.strike(),
            rate: market.rate,
            dividend_yield: market.dividend_yield,
            vol: market.vol,
            expiry: contract.expiry(),
        };
        let out = self.smoothed(&inputs)?;

        let greeks = if self.compute_greeks {
            let h_vol = VEGA_BUMP.min(0.5 * inputs.vol);
            let vega = self.bumped_slope(out.value, h_vol, |h| LatticeInputs {
                vol: inputs.vol + h,
                ..inputs
            });
            let rho = self.bumped_slope(out.value, RHO_BUMP, |h| LatticeInputs {
                rate: inputs.rate + h,
                ..inputs
            });
            Some(Greeks {
                delta: out.delta,
                gamma: out.gamma,
                vega,
                theta: out.theta,
                rho,
            })
        } else {
            None
        };

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert_key(DiagKey::NumSteps, self.steps as f64);
        diagnostics.insert_key(DiagKey::Vol, inputs.vol);
        diagnostics.insert_key(DiagKey::U, out.u);
        diagnostics.insert_key(DiagKey::Pu, out.p);
        debug!(
            steps = self.steps,
            smoothing = self.smoothing,
            price = out.value,
            "binomial price"
        );

        Ok(PriceResult {
            price: out.value,
            stderr: None,
            greeks,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::analytic::{bs_greeks, bs_price};
    use approx::assert_relative_eq;

    fn market() -> Market {
        Market::builder()
            .spot(100.0)
            .rate(0.05)
            .flat_vol(0.2)
            .build()
            .unwrap()
    }

    #[test]
    fn european_converges_to_black_scholes() {
        let m = market();
        for contract in [
            OptionContract::european_call(100.0, 1.0).unwrap(),
            OptionContract::european_put(110.0, 0.5).unwrap(),
        ] {
            let bs = bs_price(contract.option_type(), 100.0, contract.strike(), 0.05, 0.0, 0.2, contract.expiry());
            let tree = BinomialTreeEngine::new(500).price(&contract, &m).unwrap();
            assert!((tree.price - bs).abs() < 1e-3, "tree {} vs bs {}", tree.price, bs);
        }
    }

    #[test]
    fn lattice_greeks_track_analytic_values() {
        let contract = OptionContract::european_call(100.0, 1.0).unwrap();
        let g = BinomialTreeEngine::new(400)
            .price(&contract, &market())
            .unwrap()
            .greeks
            .unwrap();
        let bs = bs_greeks(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        assert_relative_eq!(g.delta, bs.delta, epsilon = 5e-3);
        assert_relative_eq!(g.gamma, bs.gamma, epsilon = 1e-3);
        assert_relative_eq!(g.vega, bs.vega, epsilon = 0.3);
        assert_relative_eq!(g.theta, bs.theta, epsilon = 0.05);
        assert_relative_eq!(g.rho, bs.rho, epsilon = 0.1);
    }

    #[test]
    fn american_put_carries_early_exercise_premium() {
        let m = market();
        let european = OptionContract::european_put(100.0, 1.0).unwrap();
        let american = european.with_exercise(ExerciseStyle::American);
        let engine = BinomialTreeEngine::new(300).with_greeks(false);
        let eu = engine.price(&european, &m).unwrap().price;
        let am = engine.price(&american, &m).unwrap().price;
        assert!(am > eu + 0.1);
        // Reference value for S=K=100, r=5%, σ=20%, T=1 is about 6.09.
        assert!((am - 6.09).abs() < 0.02, "american put {am}");
    }

    #[test]
    fn american_call_without_dividends_matches_european() {
        let m = market();
        let european = OptionContract::european_call(100.0, 1.0).unwrap();
        let american = european.with_exercise(ExerciseStyle::American);
        let engine = BinomialTreeEngine::new(200).with_greeks(false);
        assert_relative_eq!(
            engine.price(&american, &m).unwrap().price,
            engine.price(&european, &m).unwrap().price,
            epsilon = 1e-10
        );
    }

    #[test]
    fn extreme_rates_are_reported_as_arbitrage() {
        let m = Market::builder()
            .spot(100.0)
            .rate(2.0)
            .flat_vol(0.05)
            .build()
            .unwrap();
        let contract = OptionContract::european_call(100.0, 1.0).unwrap();
        let err = BinomialTreeEngine::new(10).price(&contract, &m).unwrap_err();
        assert!(matches!(err, QuantError::Arbitrage { .. }));
    }

    #[test]
    fn low_vol_lattice_prices_even_when_a_vega_bump_would_break_it() {
        // p is fine at σ = 0.003 but the σ - 0.001 lattice would have p > 1.
        let m = Market::builder()
            .spot(100.0)
            .rate(0.05)
            .flat_vol(0.003)
            .build()
            .unwrap();
        assert!(crr_parameters(0.05, 0.0, 0.002, 1.0 / 500.0).is_err());
        let contract = OptionContract::european_call(100.0, 1.0).unwrap();
        let res = BinomialTreeEngine::new(500).price(&contract, &m).unwrap();
        let forward_value = 100.0 - 100.0 * (-0.05_f64).exp();
        assert_relative_eq!(res.price, forward_value, epsilon = 1e-4);

        let g = res.greeks.unwrap();
        assert!(g.vega.is_finite() && g.vega.abs() < 1e-3, "vega {}", g.vega);
        assert_relative_eq!(g.rho, 100.0 * (-0.05_f64).exp(), epsilon = 0.5);
        assert_relative_eq!(g.delta, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn diagnostics_report_lattice_parameters() {
        let contract = OptionContract::european_call(100.0, 1.0).unwrap();
        let res = BinomialTreeEngine::new(100)
            .with_greeks(false)
            .price(&contract, &market())
            .unwrap();
        assert_eq!(res.diagnostics.get("num_steps"), Some(100.0));
        assert_relative_eq!(res.diagnostics.get("u").unwrap(), (0.2_f64 * 0.1).exp(), epsilon = 1e-12);
        let pu = res.diagnostics.get("pu").unwrap();
        assert!(pu > 0.0 && pu < 1.0);
        assert!(res.greeks.is_none());
    }

    #[test]
    fn zero_steps_are_rejected() {
        let contract = OptionContract::european_call(100.0, 1.0).unwrap();
        assert!(BinomialTreeEngine::new(0).price(&contract, &market()).is_err());
    }
}
