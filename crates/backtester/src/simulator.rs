//! Spread backtest simulator with mark-to-market equity accounting.

use serde::{Deserialize, Serialize};
use statarb_core::config::{BacktestConfig, EquityBasis};
use statarb_core::stats;
use statarb_core::{Error, Result, Signal, Stage};
use tracing::{debug, info};
use uuid::Uuid;

use crate::signals::{SignalSeries, Side};

impl Side {
    fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            Signal::LongSpread => Some(Side::Long),
            Signal::ShortSpread => Some(Side::Short),
            Signal::Flat | Signal::Exit => None,
        }
    }
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    EndOfSeries,
}

/// An open spread position. Sizing is fixed when it is opened.
#[derive(Debug, PartialEq)]
pub struct Position {
    side: Side,
    entry_index: usize,
    entry_spread: f64,
    units: f64,
    hedge_units: f64,
}

impl Position {
    pub fn open(side: Side, index: usize, spread: f64, units: f64, hedge_ratio: f64) -> Self {
        Self {
            side,
            entry_index: index,
            entry_spread: spread,
            units,
            hedge_units: units * hedge_ratio,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Unrealized P&L at `spread`.
    pub fn mark(&self, spread: f64) -> f64 {
        self.units * self.side.sign() * (spread - self.entry_spread)
    }

    /// Realize the position, consuming it.
    pub fn close(self, index: usize, spread: f64, reason: ExitReason) -> TradeRecord {
        TradeRecord {
            id: Uuid::new_v4(),
            side: self.side,
            entry_index: self.entry_index,
            exit_index: index,
            entry_spread: self.entry_spread,
            exit_spread: spread,
            units: self.units,
            hedge_units: self.hedge_units,
            pnl: self.mark(spread),
            holding_bars: index - self.entry_index,
            exit_reason: reason,
        }
    }
}

/// Record of a completed open-close cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub side: Side,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_spread: f64,
    pub exit_spread: f64,
    /// Dependent-leg units.
    pub units: f64,
    /// Independent-leg units (`units * hedge_ratio` at entry).
    pub hedge_units: f64,
    /// Realized P&L in spread units.
    pub pnl: f64,
    pub holding_bars: usize,
    pub exit_reason: ExitReason,
}

/// Aggregate metrics derived from the equity curve and trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// `final - initial` (additive) or `final / initial - 1` (capital).
    pub total_return: f64,
    /// Annualized; `None` when return dispersion is zero or too few points.
    pub sharpe_ratio: Option<f64>,
    /// Annualized; `None` without downside returns.
    pub sortino_ratio: Option<f64>,
    /// Non-negative; absolute (additive) or fraction of peak (capital).
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// Gross profit over gross loss; `None` without losing trades.
    pub profit_factor: Option<f64>,
    pub avg_holding_bars: f64,
    pub best_trade: Option<f64>,
    pub worst_trade: Option<f64>,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Mean realized P&L per trade.
    pub expectancy: f64,
    pub periods_per_year: f64,
}

impl PerformanceReport {
    /// Sharpe ratio, or an error explaining why it is undefined.
    pub fn sharpe(&self) -> Result<f64> {
        self.sharpe_ratio.ok_or(Error::UndefinedMetric {
            metric: "sharpe_ratio",
            reason: "period returns have zero standard deviation or fewer than two points"
                .to_string(),
        })
    }

    pub fn is_profitable(&self) -> bool {
        self.total_return > 0.0
    }
}

/// Result of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub report: PerformanceReport,
    pub equity_basis: EquityBasis,
    /// One mark-to-market point per spread index.
    pub equity_curve: Vec<f64>,
    pub trades: Vec<TradeRecord>,
}

/// The backtest simulator engine.
#[derive(Debug, Clone)]
pub struct BacktestSimulator {
    config: BacktestConfig,
}

impl BacktestSimulator {
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run_series(
        &self,
        signals: &SignalSeries,
        spread: &[f64],
        hedge_ratio: f64,
    ) -> Result<BacktestResult> {
        self.run(&signals.signals(), spread, hedge_ratio)
    }

    /// Single pass over `signals` and `spread`; any position still open at the
    /// end is closed at the last spread value.
    pub fn run(&self, signals: &[Signal], spread: &[f64], hedge_ratio: f64) -> Result<BacktestResult> {
        if signals.len() != spread.len() {
            return Err(Error::configuration(format!(
                "{} signals for {} spread points",
                signals.len(),
                spread.len()
            )));
        }
        if !hedge_ratio.is_finite() {
            return Err(Error::configuration(format!("hedge ratio {hedge_ratio} is not finite")));
        }
        if let Some(i) = spread.iter().position(|s| !s.is_finite()) {
            return Err(Error::data_quality(
                Stage::Backtest,
                format!("non-finite spread value at index {i}"),
            ));
        }

        let initial = self.initial_equity();
        let mut position: Option<Position> = None;
        let mut trades = Vec::new();
        let mut realized = 0.0;
        let mut equity_curve = Vec::with_capacity(spread.len());

        for (index, (&signal, &value)) in signals.iter().zip(spread).enumerate() {
            position = match (position.take(), signal) {
                // EXIT while flat is a no-op
                (None, signal) => Side::from_signal(signal).map(|side| {
                    debug!(index, ?side, spread = value, "Opening position");
                    Position::open(side, index, value, self.config.units, hedge_ratio)
                }),
                (Some(open), Signal::Exit) => {
                    let trade = open.close(index, value, ExitReason::Signal);
                    debug!(index, pnl = trade.pnl, "Closed position");
                    realized += trade.pnl;
                    trades.push(trade);
                    None
                }
                (Some(open), Signal::Flat) => Some(open),
                (Some(open), signal) => {
                    if Side::from_signal(signal) != Some(open.side()) {
                        return Err(Error::Simulation {
                            index,
                            message: format!(
                                "{signal} while a {:?} position is open",
                                open.side()
                            ),
                        });
                    }
                    Some(open)
                }
            };

            let unrealized = position.as_ref().map_or(0.0, |p| p.mark(value));
            equity_curve.push(initial + realized + unrealized);
        }

        if let Some(open) = position.take() {
            let last = spread.len() - 1;
            let trade = open.close(last, spread[last], ExitReason::EndOfSeries);
            debug!(index = last, pnl = trade.pnl, "Force-closed position at end of series");
            trades.push(trade);
        }

        let report = self.calculate_report(&equity_curve, &trades);

        info!(
            trades = report.total_trades,
            total_return = report.total_return,
            sharpe = ?report.sharpe_ratio,
            max_drawdown = report.max_drawdown,
            "Backtest complete"
        );

        Ok(BacktestResult {
            report,
            equity_basis: self.config.equity,
            equity_curve,
            trades,
        })
    }

    fn initial_equity(&self) -> f64 {
        match self.config.equity {
            EquityBasis::Additive => 0.0,
            EquityBasis::Capital { initial } => initial,
        }
    }

    fn period_returns(&self, equity_curve: &[f64]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .map(|w| match self.config.equity {
                EquityBasis::Additive => w[1] - w[0],
                EquityBasis::Capital { .. } if w[0] > 0.0 => w[1] / w[0] - 1.0,
                EquityBasis::Capital { .. } => 0.0,
            })
            .collect()
    }

    fn calculate_report(&self, equity_curve: &[f64], trades: &[TradeRecord]) -> PerformanceReport {
        let initial = self.initial_equity();
        let final_value = equity_curve.last().copied().unwrap_or(initial);
        let total_return = match self.config.equity {
            EquityBasis::Additive => final_value - initial,
            EquityBasis::Capital { .. } => final_value / initial - 1.0,
        };

        let returns = self.period_returns(equity_curve);
        let (sharpe_ratio, sortino_ratio) = self.calculate_risk_metrics(&returns);
        let max_drawdown = self.calculate_max_drawdown(equity_curve);

        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = trades.iter().filter(|t| t.pnl < 0.0).count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let gross_profit: f64 = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).sum();
        let gross_loss: f64 = -trades.iter().map(|t| t.pnl).filter(|p| *p < 0.0).sum::<f64>();
        let profit_factor = (gross_loss > 0.0).then(|| gross_profit / gross_loss);

        let avg_holding_bars = if total_trades > 0 {
            trades.iter().map(|t| t.holding_bars as f64).sum::<f64>() / total_trades as f64
        } else {
            0.0
        };
        let expectancy = stats::mean(&trades.iter().map(|t| t.pnl).collect::<Vec<_>>()).unwrap_or(0.0);

        let best_trade = trades.iter().map(|t| t.pnl).reduce(f64::max);
        let worst_trade = trades.iter().map(|t| t.pnl).reduce(f64::min);
        let (max_consecutive_wins, max_consecutive_losses) =
            self.calculate_consecutive_streaks(trades);

        PerformanceReport {
            total_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            avg_holding_bars,
            best_trade,
            worst_trade,
            max_consecutive_wins,
            max_consecutive_losses,
            expectancy,
            periods_per_year: self.config.periods_per_year,
        }
    }

    /// Calculate maximum consecutive wins and losses.
    fn calculate_consecutive_streaks(&self, trades: &[TradeRecord]) -> (usize, usize) {
        let mut max_wins = 0;
        let mut max_losses = 0;
        let mut current_wins = 0;
        let mut current_losses = 0;

        for trade in trades {
            if trade.pnl > 0.0 {
                current_wins += 1;
                current_losses = 0;
                max_wins = max_wins.max(current_wins);
            } else if trade.pnl < 0.0 {
                current_losses += 1;
                current_wins = 0;
                max_losses = max_losses.max(current_losses);
            }
        }

        (max_wins, max_losses)
    }

    fn calculate_max_drawdown(&self, equity_curve: &[f64]) -> f64 {
        let Some(&first) = equity_curve.first() else {
            return 0.0;
        };

        let mut peak = first;
        let mut max_drawdown: f64 = 0.0;

        for &value in equity_curve {
            if value > peak {
                peak = value;
            }
            let drawdown = match self.config.equity {
                EquityBasis::Additive => peak - value,
                EquityBasis::Capital { .. } if peak > 0.0 => (peak - value) / peak,
                EquityBasis::Capital { .. } => 0.0,
            };
            max_drawdown = max_drawdown.max(drawdown);
        }

        max_drawdown
    }

    fn calculate_risk_metrics(&self, returns: &[f64]) -> (Option<f64>, Option<f64>) {
        let Some(mean_return) = stats::mean(returns) else {
            return (None, None);
        };
        let annualizer = self.config.periods_per_year.sqrt();

        let sharpe = stats::sample_std(returns)
            .filter(|std| *std > 0.0)
            .map(|std| mean_return / std * annualizer);

        // Downside deviation spreads negative returns over every period
        let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|&r| r * r).sum();
        let downside_dev = (downside_sq / returns.len() as f64).sqrt();
        let sortino = (downside_dev > 0.0).then(|| mean_return / downside_dev * annualizer);

        (sharpe, sortino)
    }
}

/// Simulate `signals` over `spread` with default settings (252 periods per
/// year, additive equity, one spread unit).
pub fn backtest_strategy(
    signals: &SignalSeries,
    spread: &[f64],
    hedge_ratio: f64,
) -> Result<BacktestResult> {
    BacktestSimulator::new(BacktestConfig::default())?.run_series(signals, spread, hedge_ratio)
}
