//! Module `mc::generator`.
//!
//! Parallel, reproducible path generation for GBM and Merton jump-diffusion.
//!
//! References: Glasserman (2004) Ch. 3.2 (exact GBM stepping) and Ch. 3.5 (jump
//! processes); Merton (1976) for the compensated jump drift.
//!
//! Each step multiplies the price by `exp((μ − σ²/2)Δt + σ√Δt·Z)`, which is exact
//! for GBM at any step size. The grid is split into fixed-size row batches written
//! in parallel through `par_chunks_mut`; batch `b` draws from its own stream seeded
//! with `stream_seed(seed, b)`, so the grid is bit-identical for any worker count.
//! The batch size is therefore part of the reproducibility key.
//!
//! Numerical considerations: the antithetic mirror shares the Poisson jump count
//! with its partner and negates both the diffusion and jump-size normals.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use rayon::prelude::*;
use tracing::debug;

use crate::core::{ensure_positive, QuantError, Result};
use crate::math::{resolve_seed, seeded_rng, DenseMatrix};
use crate::mc::params::{
    ProcessModel, SimulationConfig, SimulationControl, StochasticProcessParams,
    DEFAULT_BATCH_SIZE,
};
use crate::mc::paths::SimulatedPaths;

/// Random inputs for one time step, shared by an antithetic pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepShock {
    /// Diffusion normal.
    pub diffusion: f64,
    /// Number of jumps in the step.
    pub jump_count: f64,
    /// Normal driving the aggregate jump size.
    pub jump_normal: f64,
}

/// One-step transition of a simulated price.
pub trait PathGenerator: Send + Sync {
    fn steps(&self) -> usize;

    /// Draws the random inputs of one step.
    fn draw_shock(&self, rng: &mut StdRng) -> StepShock;

    /// Advances `spot` by one step; `mirrored` negates the normals.
    fn advance(&self, spot: f64, shock: &StepShock, mirrored: bool) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct GbmPathGenerator {
    drift_dt: f64,
    diffusion: f64,
    steps: usize,
}

impl GbmPathGenerator {
    pub fn new(params: &StochasticProcessParams) -> Self {
        let dt = params.dt();
        let sigma = params.volatility;
        Self {
            drift_dt: (params.drift - 0.5 * sigma * sigma) * dt,
            diffusion: sigma * dt.sqrt(),
            steps: params.steps,
        }
    }
}

impl PathGenerator for GbmPathGenerator {
    fn steps(&self) -> usize {
        self.steps
    }

    #[inline]
    fn draw_shock(&self, rng: &mut StdRng) -> StepShock {
        StepShock {
            diffusion: StandardNormal.sample(rng),
            ..StepShock::default()
        }
    }

    #[inline]
    fn advance(&self, spot: f64, shock: &StepShock, mirrored: bool) -> f64 {
        let z = if mirrored {
            -shock.diffusion
        } else {
            shock.diffusion
        };
        spot * self.diffusion.mul_add(z, self.drift_dt).exp()
    }
}

#[derive(Debug, Clone)]
pub struct JumpDiffusionPathGenerator {
    drift_dt: f64,
    diffusion: f64,
    mean_jump: f64,
    jump_vol: f64,
    arrivals: Option<Poisson<f64>>,
    steps: usize,
}

impl JumpDiffusionPathGenerator {
    /// Drift is compensated by `λ(e^{m + v²/2} − 1)` so the jumps do not change the
    /// expected growth rate.
    pub fn new(
        params: &StochasticProcessParams,
        intensity: f64,
        mean_jump: f64,
        jump_vol: f64,
    ) -> Result<Self> {
        let dt = params.dt();
        let sigma = params.volatility;
        let compensator = intensity * ((mean_jump + 0.5 * jump_vol * jump_vol).exp() - 1.0);
        let step_rate = intensity * dt;
        let arrivals = if step_rate > 0.0 {
            Some(
                Poisson::new(step_rate)
                    .map_err(|err| QuantError::invalid("intensity", err.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            drift_dt: (params.drift - 0.5 * sigma * sigma - compensator) * dt,
            diffusion: sigma * dt.sqrt(),
            mean_jump,
            jump_vol,
            arrivals,
            steps: params.steps,
        })
    }
}

impl PathGenerator for JumpDiffusionPathGenerator {
    fn steps(&self) -> usize {
        self.steps
    }

    #[inline]
    fn draw_shock(&self, rng: &mut StdRng) -> StepShock {
        let diffusion = StandardNormal.sample(rng);
        let jump_count: f64 = self
            .arrivals
            .as_ref()
            .map_or(0.0, |p| Distribution::<f64>::sample(p, rng));
        let jump_normal = if jump_count > 0.0 {
            StandardNormal.sample(rng)
        } else {
            0.0
        };
        StepShock {
            diffusion,
            jump_count,
            jump_normal,
        }
    }

    #[inline]
    fn advance(&self, spot: f64, shock: &StepShock, mirrored: bool) -> f64 {
        let sign = if mirrored { -1.0 } else { 1.0 };
        let jump = if shock.jump_count > 0.0 {
            shock.jump_count * self.mean_jump
                + shock.jump_count.sqrt() * self.jump_vol * sign * shock.jump_normal
        } else {
            0.0
        };
        spot * (self.diffusion.mul_add(sign * shock.diffusion, self.drift_dt) + jump).exp()
    }
}

/// Simulates `params.paths` price paths from `start_price`.
///
/// # Errors
/// [`QuantError::InvalidParameter`] for invalid parameters, a non-positive start price,
/// an invalid model, or antithetic sampling with an odd path count.
pub fn simulate(
    params: &StochasticProcessParams,
    start_price: f64,
    config: &SimulationConfig,
) -> Result<SimulatedPaths> {
    simulate_with_control(params, start_price, config, &SimulationControl::default())
}

/// [`simulate`] with a progress callback and cancellation flag checked between batches.
///
/// # Errors
/// Additionally [`QuantError::Cancelled`] when the flag is raised before all batches ran.
pub fn simulate_with_control(
    params: &StochasticProcessParams,
    start_price: f64,
    config: &SimulationConfig,
    control: &SimulationControl,
) -> Result<SimulatedPaths> {
    params.validate()?;
    config.validate()?;
    ensure_positive("start_price", start_price)?;
    if config.antithetic && params.paths % 2 != 0 {
        return Err(QuantError::invalid(
            "paths",
            format!("antithetic sampling needs an even path count, got {}", params.paths),
        ));
    }

    let seed = resolve_seed(config.seed);
    match config.model {
        ProcessModel::Gbm => {
            let generator = GbmPathGenerator::new(params);
            fill_grid(&generator, params, start_price, config, seed, control)
        }
        ProcessModel::JumpDiffusion {
            intensity,
            mean_jump,
            jump_vol,
        } => {
            let generator =
                JumpDiffusionPathGenerator::new(params, intensity, mean_jump, jump_vol)?;
            fill_grid(&generator, params, start_price, config, seed, control)
        }
    }
}

fn fill_grid<G: PathGenerator>(
    generator: &G,
    params: &StochasticProcessParams,
    start_price: f64,
    config: &SimulationConfig,
    seed: u64,
    control: &SimulationControl,
) -> Result<SimulatedPaths> {
    let stride = generator.steps() + 1;
    let unit = if config.antithetic { 2 } else { 1 };
    let rows_per_batch = (config.batch_size.max(unit) / unit) * unit;
    let total_batches = params.paths.div_ceil(rows_per_batch);

    debug!(
        paths = params.paths,
        steps = params.steps,
        seed,
        antithetic = config.antithetic,
        batches = total_batches,
        model = ?config.model,
        "simulating price paths"
    );

    let mut data = vec![0.0_f64; params.paths * stride];
    let completed = AtomicUsize::new(0);

    data.par_chunks_mut(rows_per_batch * stride)
        .enumerate()
        .try_for_each(|(batch, chunk)| {
            if control.is_cancelled() {
                return Err(QuantError::Cancelled {
                    completed: completed.load(Ordering::Relaxed),
                    total: total_batches,
                });
            }
            let mut rng = seeded_rng(seed, batch);
            fill_batch(generator, chunk, stride, start_price, config.antithetic, &mut rng);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            control.report(done, total_batches);
            Ok(())
        })?;

    Ok(SimulatedPaths::from_parts(
        *params,
        config.model,
        seed,
        config.antithetic,
        data,
    ))
}

fn fill_batch<G: PathGenerator>(
    generator: &G,
    chunk: &mut [f64],
    stride: usize,
    start_price: f64,
    antithetic: bool,
    rng: &mut StdRng,
) {
    if antithetic {
        for pair in chunk.chunks_exact_mut(2 * stride) {
            let (plus, minus) = pair.split_at_mut(stride);
            let (mut s_plus, mut s_minus) = (start_price, start_price);
            plus[0] = start_price;
            minus[0] = start_price;
            for j in 1..stride {
                let shock = generator.draw_shock(rng);
                s_plus = generator.advance(s_plus, &shock, false);
                s_minus = generator.advance(s_minus, &shock, true);
                plus[j] = s_plus;
                minus[j] = s_minus;
            }
        }
    } else {
        for row in chunk.chunks_exact_mut(stride) {
            let mut s = start_price;
            row[0] = s;
            for cell in row.iter_mut().skip(1) {
                let shock = generator.draw_shock(rng);
                s = generator.advance(s, &shock, false);
                *cell = s;
            }
        }
    }
}

/// Generic path simulator driven by a caller-supplied transition.
///
/// Each path starts at `initial` and applies `step_fn(previous_state, step_index, rng)`
/// `steps` times. Path `i` draws from `stream_seed(seed, i)`, so the output does not
/// depend on the worker count. Every returned path has `steps + 1` states.
///
/// # Examples
/// ```
/// use rand_distr::{Distribution, StandardNormal};
/// use sierra::mc::simulate_with_step;
///
/// let walks = simulate_with_step(0.0_f64, 10, 4, 42, |x, _step, rng| {
///     let z: f64 = StandardNormal.sample(rng);
///     x + z
/// })
/// .unwrap();
/// assert_eq!(walks.len(), 4);
/// assert_eq!(walks[0].len(), 11);
/// assert_eq!(walks[3][0], 0.0);
/// ```
pub fn simulate_with_step<S, F>(
    initial: S,
    steps: usize,
    paths: usize,
    seed: u64,
    step_fn: F,
) -> Result<Vec<Vec<S>>>
where
    S: Clone + Send + Sync,
    F: Fn(&S, usize, &mut StdRng) -> S + Sync,
{
    if steps < 1 {
        return Err(QuantError::invalid("steps", "must be >= 1"));
    }
    if paths < 1 {
        return Err(QuantError::invalid("paths", "must be >= 1"));
    }
    Ok((0..paths)
        .into_par_iter()
        .map(|path| {
            let mut rng = seeded_rng(seed, path);
            let mut states = Vec::with_capacity(steps + 1);
            states.push(initial.clone());
            for step in 0..steps {
                let next = step_fn(&states[step], step, &mut rng);
                states.push(next);
            }
            states
        })
        .collect())
}

/// Scenarios of jointly normal one-period log-returns `r ~ N(mean, cov)` built
/// from the Cholesky factor of `cov`. Returns a `scenarios × assets` matrix.
///
/// # Errors
/// [`QuantError::SingularCovariance`] when `cov` is not positive definite;
/// [`QuantError::InvalidParameter`] on dimension mismatches or zero scenarios.
pub fn simulate_correlated_returns(
    mean: &[f64],
    cov: &DenseMatrix,
    scenarios: usize,
    seed: u64,
) -> Result<DenseMatrix> {
    let k = mean.len();
    if k == 0 || cov.rows() != k || cov.cols() != k {
        return Err(QuantError::invalid(
            "cov",
            format!("expected {k}x{k}, got {}x{}", cov.rows(), cov.cols()),
        ));
    }
    if scenarios == 0 {
        return Err(QuantError::invalid("scenarios", "must be >= 1"));
    }
    let chol = cov
        .cholesky_lower()
        .ok_or_else(|| QuantError::SingularCovariance {
            matrix: "covariance (cholesky)".to_string(),
            column: 0,
            pivot: cov.min_eigenvalue().unwrap_or(0.0),
        })?;

    let mut out = vec![0.0_f64; scenarios * k];
    out.par_chunks_mut(k * DEFAULT_BATCH_SIZE)
        .enumerate()
        .for_each(|(batch, chunk)| {
            let mut rng = seeded_rng(seed, batch);
            let mut z = vec![0.0_f64; k];
            for row in chunk.chunks_exact_mut(k) {
                for zi in z.iter_mut() {
                    *zi = StandardNormal.sample(&mut rng);
                }
                for (i, cell) in row.iter_mut().enumerate() {
                    let li = chol.row(i);
                    *cell = mean[i] + li[..=i].iter().zip(&z).map(|(l, x)| l * x).sum::<f64>();
                }
            }
        });
    DenseMatrix::from_row_major(scenarios, k, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{sample_covariance, sample_mean, sample_std};
    use approx::assert_relative_eq;

    fn params(paths: usize) -> StochasticProcessParams {
        StochasticProcessParams::new(0.05, 0.2, 0.05, 1.0, 16, paths).unwrap()
    }

    #[test]
    fn first_column_is_start_price_and_prices_stay_positive() {
        let cfg = SimulationConfig::default().with_seed(1);
        let paths = simulate(&params(64), 100.0, &cfg).unwrap();
        assert_eq!(paths.num_paths(), 64);
        assert_eq!(paths.stride(), 17);
        assert!(paths.rows().all(|row| row[0] == 100.0));
        assert!(paths.as_slice().iter().all(|s| *s > 0.0 && s.is_finite()));
        assert_eq!(paths.seed(), 1);
    }

    #[test]
    fn antithetic_pairs_mirror_their_log_increments() {
        let cfg = SimulationConfig::default().with_seed(3).with_antithetic(true);
        let p = params(8);
        let paths = simulate(&p, 100.0, &cfg).unwrap();
        let drift = (p.drift - 0.5 * p.volatility * p.volatility) * p.dt();
        for pair in 0..4 {
            let a = paths.row(2 * pair);
            let b = paths.row(2 * pair + 1);
            for j in 1..a.len() {
                let da = (a[j] / a[j - 1]).ln() - drift;
                let db = (b[j] / b[j - 1]).ln() - drift;
                assert_relative_eq!(da, -db, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn odd_path_count_with_antithetic_is_rejected() {
        let cfg = SimulationConfig::default().with_antithetic(true);
        let err = simulate(&params(7), 100.0, &cfg).unwrap_err();
        assert!(matches!(err, QuantError::InvalidParameter { name: "paths", .. }));
    }

    #[test]
    fn zero_volatility_paths_grow_deterministically() {
        let p = StochasticProcessParams::new(0.1, 0.0, 0.0, 2.0, 4, 3).unwrap();
        let paths = simulate(&p, 50.0, &SimulationConfig::default()).unwrap();
        for row in paths.rows() {
            assert_relative_eq!(row[4], 50.0 * (0.2_f64).exp(), epsilon = 1e-10);
        }
    }

    #[test]
    fn batch_size_does_not_change_shape_but_seed_drives_content() {
        let p = params(100);
        let a = simulate(&p, 100.0, &SimulationConfig::default().with_seed(5).with_batch_size(7))
            .unwrap();
        let b = simulate(&p, 100.0, &SimulationConfig::default().with_seed(5).with_batch_size(7))
            .unwrap();
        assert_eq!(a, b);
        let c = simulate(&p, 100.0, &SimulationConfig::default().with_seed(6).with_batch_size(7))
            .unwrap();
        assert_ne!(a.as_slice(), c.as_slice());
    }

    #[test]
    fn jump_diffusion_keeps_the_expected_growth_rate() {
        let p = StochasticProcessParams::new(0.03, 0.15, 0.03, 1.0, 4, 40_000).unwrap();
        let cfg = SimulationConfig::default()
            .with_seed(11)
            .with_model(ProcessModel::JumpDiffusion {
                intensity: 1.0,
                mean_jump: -0.05,
                jump_vol: 0.1,
            });
        let paths = simulate(&p, 100.0, &cfg).unwrap();
        let terminal = paths.terminal_prices();
        let mean = sample_mean(&terminal);
        let se = sample_std(&terminal) / (terminal.len() as f64).sqrt();
        let expected = 100.0 * (0.03_f64).exp();
        assert!((mean - expected).abs() < 4.0 * se, "mean {mean} vs {expected} (se {se})");
    }

    #[test]
    fn generic_step_simulator_is_reproducible() {
        let step = |x: &f64, _i: usize, rng: &mut StdRng| {
            let z: f64 = StandardNormal.sample(rng);
            x * (0.01 * z).exp()
        };
        let a = simulate_with_step(1.0, 5, 3, 42, step).unwrap();
        let b = simulate_with_step(1.0, 5, 3, 42, step).unwrap();
        assert_eq!(a, b);
        assert!(simulate_with_step(1.0, 0, 3, 42, step).is_err());
    }

    #[test]
    fn correlated_returns_reproduce_the_input_covariance() {
        let cov = DenseMatrix::from_rows(&[vec![0.04, 0.018], vec![0.018, 0.09]]).unwrap();
        let draws = simulate_correlated_returns(&[0.01, 0.02], &cov, 50_000, 9).unwrap();
        let a: Vec<f64> = (0..draws.rows()).map(|i| draws.get(i, 0)).collect();
        let b: Vec<f64> = (0..draws.rows()).map(|i| draws.get(i, 1)).collect();
        assert_relative_eq!(sample_mean(&a), 0.01, epsilon = 5e-3);
        assert_relative_eq!(sample_covariance(&a, &b), 0.018, epsilon = 3e-3);
        assert_relative_eq!(sample_covariance(&b, &b), 0.09, epsilon = 5e-3);

        let singular = DenseMatrix::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        assert!(matches!(
            simulate_correlated_returns(&[0.0, 0.0], &singular, 10, 1),
            Err(QuantError::SingularCovariance { .. })
        ));
    }
}
