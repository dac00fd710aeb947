//! Statarb: cointegrated pair discovery and spread backtesting
//!
//! This is the root crate that provides benchmark access to the internal modules.
//! For actual functionality, use the individual crates directly:
//!
//! - `statarb-core`: Price panels, configuration, errors, statistical kernels
//! - `pair-discovery`: Engle-Granger pair scan and spread models
//! - `backtester`: Z-score signals, simulation, price loading
//! - `pair-scanner`: End-to-end pipeline and CLI

// Re-export for benchmarks and integration tests
pub use backtester as backtest;
pub use pair_discovery as discovery;
pub use pair_scanner as scanner;
pub use statarb_core as core;
