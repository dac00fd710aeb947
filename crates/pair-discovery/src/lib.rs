//! Pair Discovery
//!
//! Finds cointegrated instrument pairs in a price panel and fits the static
//! spread model for a chosen pair.
//!
//! # Features
//!
//! - **Engle-Granger test**: OLS cointegrating regression, ADF on residuals,
//!   MacKinnon p-values and critical values
//! - **Pairwise scan**: every unordered pair once, optional rayon fan-out,
//!   deterministic ranking
//! - **Strictness levels**: residual-only, minimum sample size, or integrated legs
//! - **Spread model**: hedge ratio, intercept, spread, R² and half-life
//!
//! # Example
//!
//! ```ignore
//! use pair_discovery::{calculate_spread, PairDiscovery};
//! use statarb_core::config::DiscoveryConfig;
//!
//! let discovery = PairDiscovery::new(DiscoveryConfig::default())?;
//! let result = discovery.find_cointegrated_pairs(&panel)?;
//! if let Some(best) = result.best() {
//!     let spread = calculate_spread(
//!         panel.require(&best.symbol_a, Stage::SpreadModel)?,
//!         panel.require(&best.symbol_b, Stage::SpreadModel)?,
//!     )?;
//! }
//! ```

pub mod coint;
pub mod discovery;
pub mod spread;

pub use coint::{CointegrationResult, CointegrationTest};
pub use discovery::{
    find_cointegrated_pairs, DiscoveryResult, FilteredPair, PairDiscovery, PairFailure,
};
pub use spread::{calculate_spread, SpreadModelResult};
