//! Monte Carlo path simulation.
//!
//! [`simulate`] fills an `M × (N + 1)` [`SimulatedPaths`] grid under GBM or
//! Merton jump-diffusion, in parallel and reproducibly for a given seed.
//! [`simulate_with_step`] runs an arbitrary caller-supplied transition and
//! [`simulate_correlated_returns`] draws multi-asset normal return scenarios.

pub mod generator;
pub mod params;
pub mod paths;

pub use generator::{
    simulate, simulate_correlated_returns, simulate_with_control, simulate_with_step,
    GbmPathGenerator, JumpDiffusionPathGenerator, PathGenerator, StepShock,
};
pub use params::{
    ProcessModel, ProgressCallback, SimulationConfig, SimulationControl, SimulationProgress,
    StochasticProcessParams, DEFAULT_BATCH_SIZE,
};
pub use paths::SimulatedPaths;
