//! Core traits, common domain types, configuration and library-wide result/error structures.

pub mod config;
pub mod engine;
pub mod error;
pub mod serialization;
pub mod types;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use serialization::*;
pub use types::*;
