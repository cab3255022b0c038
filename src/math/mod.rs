//! Module `math`.
//!
//! Standard normal density, cumulative distribution and inverse (via `statrs`
//! `erfc`), sample moments and type-7 quantiles, plus the Newton-Raphson and
//! bisection root finders used for implied volatility.

use statrs::function::erf::{erfc, erfc_inv};

pub mod matrix;
pub mod rng;

pub use matrix::DenseMatrix;
pub use rng::{resolve_seed, seeded_rng, stream_seed};

#[derive(Debug, Clone, PartialEq)]
pub enum MathError {
    NonConvergence,
    ZeroDerivative,
    InvalidInput(&'static str),
}

pub fn normal_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF via the complementary error function (full double precision
/// in both tails).
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Inverse standard normal CDF. Returns `-inf`/`+inf` at the closed endpoints and
/// `NaN` outside `[0, 1]`.
pub fn normal_inv_cdf(p: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

pub fn sample_mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Unbiased (`n - 1`) sample variance; zero for fewer than two samples.
pub fn sample_variance(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let mean = sample_mean(xs);
    xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1) as f64
}

pub fn sample_std(xs: &[f64]) -> f64 {
    sample_variance(xs).sqrt()
}

/// Unbiased sample covariance of two equally long slices.
pub fn sample_covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mx = sample_mean(&xs[..n]);
    let my = sample_mean(&ys[..n]);
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Linearly interpolated quantile of an ascending-sorted slice (`rank = q * (n - 1)`).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let w = rank - lo as f64;
                (sorted[lo] + w * (sorted[hi] - sorted[lo])).clamp(sorted[lo], sorted[hi])
            }
        }
    }
}

pub fn newton_raphson<F, G>(
    f: F,
    df: G,
    x0: f64,
    tol: f64,
    max_iter: usize,
) -> Result<f64, MathError>
where
    F: Fn(f64) -> f64,
    G: Fn(f64) -> f64,
{
    if tol <= 0.0 {
        return Err(MathError::InvalidInput("tol must be positive"));
    }
    if max_iter == 0 {
        return Err(MathError::InvalidInput("max_iter must be > 0"));
    }

    let mut x = x0;
    for _ in 0..max_iter {
        let fx = f(x);
        if fx.abs() <= tol {
            return Ok(x);
        }
        let dfx = df(x);
        if dfx.abs() <= 1e-14 {
            return Err(MathError::ZeroDerivative);
        }
        let x_next = x - fx / dfx;
        if !x_next.is_finite() {
            return Err(MathError::NonConvergence);
        }
        if (x_next - x).abs() <= tol {
            return Ok(x_next);
        }
        x = x_next;
    }

    Err(MathError::NonConvergence)
}

/// Bisection on `[lo, hi]`; requires a sign change.
pub fn bisection<F>(f: F, mut lo: f64, mut hi: f64, tol: f64, max_iter: usize) -> Result<f64, MathError>
where
    F: Fn(f64) -> f64,
{
    let mut f_lo = f(lo);
    if f_lo * f(hi) > 0.0 {
        return Err(MathError::InvalidInput("root is not bracketed"));
    }
    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid.abs() <= tol || 0.5 * (hi - lo) <= tol {
            return Ok(mid);
        }
        if f_lo * f_mid <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    Err(MathError::NonConvergence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normal_cdf_matches_reference_values() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_relative_eq!(normal_cdf(1.959_963_984_540_054), 0.975, epsilon = 1e-12);
        assert_relative_eq!(normal_cdf(-1.0), 0.158_655_253_931_457_05, epsilon = 1e-12);
    }

    #[test]
    fn inverse_cdf_round_trips_through_the_cdf() {
        for &p in &[1e-6, 0.01, 0.05, 0.5, 0.95, 0.999] {
            assert_relative_eq!(normal_cdf(normal_inv_cdf(p)), p, max_relative = 1e-10);
        }
        assert_eq!(normal_inv_cdf(0.0), f64::NEG_INFINITY);
        assert!(normal_inv_cdf(1.5).is_nan());
    }

    #[test]
    fn moments_use_unbiased_denominator() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(sample_mean(&xs), 2.5);
        assert_relative_eq!(sample_variance(&xs), 5.0 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(sample_covariance(&xs, &xs), sample_variance(&xs), epsilon = 1e-15);
        assert_eq!(sample_variance(&[1.0]), 0.0);
    }

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let sorted = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_sorted(&sorted, 0.5), 2.0);
        assert_relative_eq!(quantile_sorted(&sorted, 0.9), 3.6, epsilon = 1e-12);
        assert_relative_eq!(quantile_sorted(&sorted, 1.0), 4.0);
    }

    #[test]
    fn root_finders_agree_on_sqrt_two() {
        let newton = newton_raphson(|x| x * x - 2.0, |x| 2.0 * x, 1.0, 1e-12, 50).unwrap();
        let bisect = bisection(|x| x * x - 2.0, 0.0, 2.0, 1e-12, 200).unwrap();
        assert_relative_eq!(newton, std::f64::consts::SQRT_2, epsilon = 1e-10);
        assert_relative_eq!(bisect, std::f64::consts::SQRT_2, epsilon = 1e-10);
    }
}
