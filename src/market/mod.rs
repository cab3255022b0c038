//! Market data: price histories, aligned multi-asset universes, CSV input and the
//! single-underlying snapshot used by the pricers.

pub mod loader;
pub mod series;
pub mod snapshot;
pub mod universe;

pub use loader::{load_price_csv, load_universe_csv, read_price_csv};
pub use series::{log_returns, PriceSeries};
pub use snapshot::{Market, MarketBuilder};
pub use universe::{
    covariance, covariance_to_correlation, sample_covariance, shrink_covariance,
    AlignmentPolicy, AssetUniverse, GbmCalibration, ShrinkageEstimate,
};
