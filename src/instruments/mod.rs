//! Option contracts and the path payoffs evaluated by the Monte Carlo engine.

pub mod payoff;
pub mod vanilla;

pub use payoff::PathPayoff;
pub use vanilla::OptionContract;
