//! Core domain types for the pair trading research engine.

pub mod pair;
pub mod series;
pub mod signal;

pub use pair::*;
pub use series::*;
pub use signal::*;
