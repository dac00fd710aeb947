//! Backtester
//!
//! Signal generation and historical simulation for a single spread.
//!
//! # Features
//!
//! - **Signal Engine**: static or rolling z-scores and an explicit
//!   FLAT/LONG/SHORT state machine with configurable hold policy
//! - **Backtest Simulator**: owned positions, forced close at series end,
//!   mark-to-market equity and risk metrics
//! - **Price Sources**: wide CSV loader behind the [`PriceSource`] trait
//!
//! # Example
//!
//! ```ignore
//! use backtester::{BacktestSimulator, SignalEngine};
//! use statarb_core::config::{BacktestConfig, SignalConfig};
//!
//! let engine = SignalEngine::new(SignalConfig::default())?;
//! let signals = engine.generate(&model.spread)?;
//!
//! let simulator = BacktestSimulator::new(BacktestConfig::default())?;
//! let result = simulator.run_series(&signals, &model.spread, model.hedge_ratio)?;
//! println!("Sharpe: {:?}", result.report.sharpe_ratio);
//! ```

pub mod data_store;
pub mod signals;
pub mod simulator;

// Re-exports
pub use data_store::{CsvPriceSource, DataQuery, PriceSource, TimeResolution};
pub use signals::{
    calculate_zscore, classify_strength, generate_signals, sizing_advice, transition, Side,
    SignalEngine, SignalPoint, SignalSeries, SignalState, SizingAdvice,
};
pub use simulator::{
    backtest_strategy, BacktestResult, BacktestSimulator, ExitReason, PerformanceReport,
    Position, TradeRecord,
};
