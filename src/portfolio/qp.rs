//! Primal active-set solver for the box-constrained minimum-variance problem.
//!
//! Solves
//!
//! ```text
//! minimise   ½ wᵀΣw
//! subject to 1ᵀw = 1,  μᵀw = target (optional),  l ≤ w ≤ u
//! ```
//!
//! Each iteration solves the equality-constrained KKT system on the free
//! variables, steps toward its minimiser until a bound blocks, and releases the
//! bound with the most negative multiplier once the step vanishes. The iterate
//! stays feasible throughout, so stopping at the iteration limit still returns a
//! feasible portfolio.
//!
//! References: Nocedal and Wright, *Numerical Optimization* (2nd ed.), Algorithm 16.3.

use tracing::debug;

use crate::core::{QuantError, Result};
use crate::math::DenseMatrix;

/// Termination settings for [`solve_box_qp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QpOptions {
    pub max_iterations: usize,
    /// Step and multiplier tolerance.
    pub tolerance: f64,
}

impl Default for QpOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
        }
    }
}

/// Solver output. `weights` is feasible even when `converged` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    pub weights: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Largest step component or negative multiplier at exit.
    pub residual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Free,
    Lower,
    Upper,
    /// Pinned for the whole solve; never released.
    Fixed,
}

/// Greedy allocation filling the budget left after the lower bounds, cheapest
/// asset first when `ascending`, richest first otherwise.
fn knapsack_allocation(mean: &[f64], lower: &[f64], upper: &[f64], ascending: bool) -> Vec<f64> {
    let mut order: Vec<usize> = (0..mean.len()).collect();
    order.sort_by(|&a, &b| mean[a].total_cmp(&mean[b]));
    if !ascending {
        order.reverse();
    }
    let mut w = lower.to_vec();
    let mut budget = 1.0 - lower.iter().sum::<f64>();
    for i in order {
        if budget <= 0.0 {
            break;
        }
        let add = (upper[i] - lower[i]).min(budget);
        w[i] += add;
        budget -= add;
    }
    w
}

/// Mean of the last asset the greedy allocation put money into.
fn marginal_mean(mean: &[f64], lower: &[f64], upper: &[f64], ascending: bool) -> Option<f64> {
    let mut order: Vec<usize> = (0..mean.len()).collect();
    order.sort_by(|&a, &b| mean[a].total_cmp(&mean[b]));
    if !ascending {
        order.reverse();
    }
    let mut budget = 1.0 - lower.iter().sum::<f64>();
    let mut last = None;
    for i in order {
        if budget <= 0.0 {
            break;
        }
        let add = (upper[i] - lower[i]).min(budget);
        if add > 0.0 {
            last = Some(mean[i]);
        }
        budget -= add;
    }
    last
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Lowest and highest `μᵀw` over the budget-and-box feasible set.
///
/// # Errors
/// [`QuantError::InvalidParameter`] when no weights within the bounds sum to one.
pub fn feasible_return_range(mean: &[f64], lower: &[f64], upper: &[f64]) -> Result<(f64, f64)> {
    check_box(lower, upper)?;
    let lo = knapsack_allocation(mean, lower, upper, true);
    let hi = knapsack_allocation(mean, lower, upper, false);
    Ok((dot(mean, &lo), dot(mean, &hi)))
}

fn check_box(lower: &[f64], upper: &[f64]) -> Result<()> {
    if lower.iter().zip(upper).any(|(l, u)| !(l <= u) || l.is_infinite()) {
        return Err(QuantError::invalid(
            "bounds",
            "lower bounds must be finite and not above the upper bounds",
        ));
    }
    let floor: f64 = lower.iter().sum();
    let ceiling: f64 = upper.iter().sum();
    if floor > 1.0 + 1e-12 || ceiling < 1.0 - 1e-12 {
        return Err(QuantError::invalid(
            "bounds",
            format!("weights in the box sum to [{floor}, {ceiling}], which excludes 1"),
        ));
    }
    Ok(())
}

/// Minimises `wᵀΣw` over the box with a full budget and an optional return target.
///
/// # Errors
/// [`QuantError::InvalidParameter`] for mismatched dimensions, an empty feasible
/// box or a target outside the achievable return range;
/// [`QuantError::SingularCovariance`] when a KKT system is singular.
pub fn solve_box_qp(
    covariance: &DenseMatrix,
    mean: &[f64],
    target: Option<f64>,
    lower: &[f64],
    upper: &[f64],
    options: &QpOptions,
) -> Result<QpSolution> {
    let n = mean.len();
    if covariance.rows() != n || !covariance.is_square() || lower.len() != n || upper.len() != n {
        return Err(QuantError::invalid(
            "covariance",
            "covariance, mean and bounds must share one dimension",
        ));
    }
    check_box(lower, upper)?;
    let tol = options.tolerance;

    let w_lo = knapsack_allocation(mean, lower, upper, true);
    let w_hi = knapsack_allocation(mean, lower, upper, false);
    let (r_lo, r_hi) = (dot(mean, &w_lo), dot(mean, &w_hi));
    let spread = mean.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - mean.iter().copied().fold(f64::INFINITY, f64::min);
    let scale = mean.iter().fold(0.0_f64, |m, x| m.max(x.abs())).max(1.0);

    if 1.0 - lower.iter().sum::<f64>() <= 1e-12 {
        // The lower bounds already spend the whole budget.
        return Ok(QpSolution {
            weights: lower.to_vec(),
            iterations: 0,
            converged: true,
            residual: 0.0,
        });
    }

    let mut state = vec![Bound::Free; n];
    let (mut w, return_row) = match target {
        Some(t) => {
            let slack = 1e-9 * scale;
            if !t.is_finite() || t < r_lo - slack || t > r_hi + slack {
                return Err(QuantError::invalid(
                    "target_return",
                    format!("{t} is outside the achievable range [{r_lo}, {r_hi}]"),
                ));
            }
            let tie = 1e-14 * scale;
            let at_end = r_hi - r_lo > tie && (t >= r_hi - slack || t <= r_lo + slack);
            if at_end {
                // An extreme target pins every asset outside the marginal return
                // group; the return constraint then follows from the budget.
                let ascending = t <= r_lo + slack;
                let start = if ascending { w_lo.clone() } else { w_hi.clone() };
                if let Some(marginal) = marginal_mean(mean, lower, upper, ascending) {
                    for i in 0..n {
                        if (mean[i] - marginal).abs() > tie {
                            state[i] = Bound::Fixed;
                        }
                    }
                }
                (start, None)
            } else {
                // A collapsed range means every feasible portfolio already earns `t`.
                let collapsed = r_hi - r_lo <= tie;
                let theta = if collapsed {
                    0.5
                } else {
                    ((t - r_lo) / (r_hi - r_lo)).clamp(0.0, 1.0)
                };
                let start: Vec<f64> = w_lo
                    .iter()
                    .zip(&w_hi)
                    .map(|(a, b)| (1.0 - theta) * a + theta * b)
                    .collect();
                // Constant expected returns make the return constraint a copy of the budget.
                let row = (spread > tie && !collapsed).then(|| {
                    let centre = mean.iter().sum::<f64>() / n as f64;
                    mean.iter().map(|m| (m - centre) / spread).collect::<Vec<f64>>()
                });
                (start, row)
            }
        }
        None => {
            let start: Vec<f64> = w_lo.iter().zip(&w_hi).map(|(a, b)| 0.5 * (a + b)).collect();
            (start, None)
        }
    };

    let mut rows: Vec<Vec<f64>> = vec![vec![1.0; n]];
    rows.extend(return_row);
    let m = rows.len();

    let mut residual = f64::INFINITY;

    for iteration in 1..=options.max_iterations {
        let free: Vec<usize> = (0..n).filter(|&i| state[i] == Bound::Free).collect();
        let g = covariance.mul_vec(&w);
        let (p_free, lambda) = kkt_step(covariance, &rows, &free, &g)?;

        let step_size = p_free.iter().fold(0.0_f64, |a, p| a.max(p.abs()));
        if step_size <= tol {
            // Bound multipliers: g = Aᵀλ ± ν e_i with ν ≥ 0 at optimality.
            let mut worst: Option<(usize, f64)> = None;
            for i in 0..n {
                let sign = match state[i] {
                    Bound::Free | Bound::Fixed => continue,
                    Bound::Lower => 1.0,
                    Bound::Upper => -1.0,
                };
                let row_term: f64 = (0..m).map(|k| rows[k][i] * lambda[k]).sum();
                let nu = sign * (g[i] - row_term);
                if worst.map_or(true, |(_, v)| nu < v) {
                    worst = Some((i, nu));
                }
            }
            match worst {
                Some((i, nu)) if nu < -tol => {
                    state[i] = Bound::Free;
                    residual = -nu;
                }
                _ => {
                    debug!(iterations = iteration, active = n - free.len(), "qp converged");
                    return Ok(QpSolution {
                        weights: w,
                        iterations: iteration,
                        converged: true,
                        residual: step_size,
                    });
                }
            }
            continue;
        }

        let mut alpha = 1.0_f64;
        let mut blocking: Option<(usize, Bound)> = None;
        for (k, &i) in free.iter().enumerate() {
            let p = p_free[k];
            let (limit, bound) = if p < -tol {
                ((lower[i] - w[i]) / p, Bound::Lower)
            } else if p > tol {
                ((upper[i] - w[i]) / p, Bound::Upper)
            } else {
                continue;
            };
            if limit < alpha {
                alpha = limit.max(0.0);
                blocking = Some((i, bound));
            }
        }
        for (k, &i) in free.iter().enumerate() {
            w[i] = (w[i] + alpha * p_free[k]).clamp(lower[i], upper[i]);
        }
        if let Some((i, bound)) = blocking {
            w[i] = if bound == Bound::Lower { lower[i] } else { upper[i] };
            state[i] = bound;
        }
        residual = step_size;
    }

    debug!(iterations = options.max_iterations, residual, "qp hit its iteration limit");
    Ok(QpSolution {
        weights: w,
        iterations: options.max_iterations,
        converged: false,
        residual,
    })
}

/// Solves `[Σ_FF A_Fᵀ; A_F 0][p; y] = [-g_F; 0]` and returns `(p, λ = -y)`.
fn kkt_step(
    covariance: &DenseMatrix,
    rows: &[Vec<f64>],
    free: &[usize],
    g: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    let nf = free.len();
    let m = rows.len();
    let dim = nf + m;
    let mut kkt = DenseMatrix::zeros(dim, dim);
    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            kkt.set(a, b, covariance.get(i, j));
        }
        for (k, row) in rows.iter().enumerate() {
            kkt.set(a, nf + k, row[i]);
            kkt.set(nf + k, a, row[i]);
        }
    }
    let mut rhs = vec![0.0; dim];
    for (a, &i) in free.iter().enumerate() {
        rhs[a] = -g[i];
    }
    let sol = kkt.solve(&rhs, "kkt")?;
    let lambda = sol[nf..].iter().map(|y| -y).collect();
    Ok((sol[..nf].to_vec(), lambda))
}
