//! Simulated price grid.

use serde::Serialize;

use crate::mc::params::{ProcessModel, StochasticProcessParams};

/// `M × (N + 1)` grid of simulated prices in one row-major buffer.
///
/// Row `i` is path `i`; column `0` of every row is the deterministic start price.
/// With antithetic sampling rows `2i` and `2i + 1` are a mirrored pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedPaths {
    params: StochasticProcessParams,
    model: ProcessModel,
    seed: u64,
    antithetic: bool,
    data: Vec<f64>,
}

impl SimulatedPaths {
    pub(crate) fn from_parts(
        params: StochasticProcessParams,
        model: ProcessModel,
        seed: u64,
        antithetic: bool,
        data: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(data.len(), params.paths * (params.steps + 1));
        Self {
            params,
            model,
            seed,
            antithetic,
            data,
        }
    }

    #[inline]
    pub fn num_paths(&self) -> usize {
        self.params.paths
    }

    #[inline]
    pub fn num_steps(&self) -> usize {
        self.params.steps
    }

    /// Row length, `N + 1`.
    #[inline]
    pub fn stride(&self) -> usize {
        self.params.steps + 1
    }

    pub fn params(&self) -> &StochasticProcessParams {
        &self.params
    }

    pub fn model(&self) -> ProcessModel {
        self.model
    }

    /// Base seed the grid was generated from (drawn from entropy when none was given).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_antithetic(&self) -> bool {
        self.antithetic
    }

    pub fn start_price(&self) -> f64 {
        self.data[0]
    }

    /// Observation times `0, Δt, ..., T`.
    pub fn time_grid(&self) -> Vec<f64> {
        let dt = self.params.dt();
        (0..self.stride()).map(|j| j as f64 * dt).collect()
    }

    #[inline]
    pub fn row(&self, path: usize) -> &[f64] {
        let stride = self.stride();
        &self.data[path * stride..(path + 1) * stride]
    }

    #[inline]
    pub fn get(&self, path: usize, step: usize) -> f64 {
        self.data[path * self.stride() + step]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.data.chunks_exact(self.stride())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn terminal_prices(&self) -> Vec<f64> {
        self.rows().map(|row| row[row.len() - 1]).collect()
    }

    /// `ln(S_T / S_0)` per path.
    pub fn terminal_log_returns(&self) -> Vec<f64> {
        self.rows()
            .map(|row| (row[row.len() - 1] / row[0]).ln())
            .collect()
    }
}
