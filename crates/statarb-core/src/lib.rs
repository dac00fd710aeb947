//! Statarb Core Library
//!
//! Shared types, configuration, errors and statistical kernels for the pair
//! discovery, spread modeling and backtesting crates.

pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::Config;
pub use error::{Error, Result, Stage};
pub use types::*;
