//! Pair Scanner
//!
//! Runs the research pipeline end to end: discover cointegrated pairs, fit a
//! spread model per pair, generate signals and backtest them.

use backtester::{
    sizing_advice, BacktestResult, BacktestSimulator, DataQuery, PerformanceReport, PriceSource,
    SignalEngine, SignalPoint, SizingAdvice,
};
use pair_discovery::{
    calculate_spread, CointegrationResult, CointegrationTest, DiscoveryResult, PairDiscovery,
    PairFailure, SpreadModelResult,
};
use serde::Serialize;
use statarb_core::{Config, Error, PairKey, PricePanel, Result, Stage};
use tracing::{info, warn};

/// Spread model and backtest for one pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairEvaluation {
    pub pair: PairKey,
    /// Fitted on the training window when a split is used.
    pub model: SpreadModelResult,
    /// Spread the signals and backtest ran on.
    pub trading_spread: Vec<f64>,
    pub backtest: BacktestResult,
}

/// Compact view of a [`PairEvaluation`] for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PairSummary {
    pub dependent: String,
    pub independent: String,
    pub hedge_ratio: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub half_life: Option<f64>,
    pub observations: usize,
    pub report: PerformanceReport,
}

impl PairEvaluation {
    pub fn summary(&self) -> PairSummary {
        PairSummary {
            dependent: self.model.dependent_symbol.clone(),
            independent: self.model.independent_symbol.clone(),
            hedge_ratio: self.model.hedge_ratio,
            intercept: self.model.intercept,
            r_squared: self.model.r_squared,
            half_life: self.model.half_life,
            observations: self.trading_spread.len(),
            report: self.backtest.report.clone(),
        }
    }
}

/// Output of a full scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub discovery: DiscoveryResult,
    pub evaluations: Vec<PairEvaluation>,
    /// Pairs dropped after discovery, with the reason.
    pub skipped: Vec<PairFailure>,
}

impl ScanReport {
    /// Evaluations ordered by Sharpe ratio, undefined ratios last.
    pub fn ranked_by_sharpe(&self) -> Vec<&PairEvaluation> {
        let mut ranked: Vec<&PairEvaluation> = self.evaluations.iter().collect();
        ranked.sort_by(|a, b| {
            let key = |e: &PairEvaluation| e.backtest.report.sharpe_ratio.unwrap_or(f64::NEG_INFINITY);
            key(b).total_cmp(&key(a))
        });
        ranked
    }
}

/// Monitoring view of one pair at the latest observation.
#[derive(Debug, Clone, Serialize)]
pub struct PairSnapshot {
    pub pair: PairKey,
    pub cointegration: CointegrationResult,
    pub model: SpreadModelResult,
    pub latest: Option<SignalPoint>,
    pub sizing: Option<SizingAdvice>,
}

/// Configured pipeline; every stage is validated on construction.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    discovery: PairDiscovery,
    engine: SignalEngine,
    simulator: BacktestSimulator,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            discovery: PairDiscovery::new(config.discovery.clone())?,
            engine: SignalEngine::new(config.signals.clone())?,
            simulator: BacktestSimulator::new(config.backtest.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn discover(&self, panel: &PricePanel) -> Result<DiscoveryResult> {
        self.discovery.find_cointegrated_pairs(panel)
    }

    /// Fit, signal and backtest one pair.
    ///
    /// With `train_fraction`, coefficients come from the leading share of the
    /// panel and signals run only on the remainder, so the backtest never sees
    /// data the hedge ratio was fitted on.
    pub fn evaluate_pair(
        &self,
        panel: &PricePanel,
        dependent: &str,
        independent: &str,
        train_fraction: Option<f64>,
    ) -> Result<PairEvaluation> {
        let pair = PairKey::new(dependent, independent);

        let (model, trading_spread) = match train_fraction {
            None => {
                let model = calculate_spread(
                    panel.require(dependent, Stage::SpreadModel)?,
                    panel.require(independent, Stage::SpreadModel)?,
                )?;
                let spread = model.spread.clone();
                (model, spread)
            }
            Some(fraction) => {
                let (train, test) = panel.split_at(split_index(panel.observations(), fraction)?)?;
                let model = calculate_spread(
                    train.require(dependent, Stage::SpreadModel)?,
                    train.require(independent, Stage::SpreadModel)?,
                )?;
                let spread = model.apply(
                    test.require(dependent, Stage::SpreadModel)?,
                    test.require(independent, Stage::SpreadModel)?,
                )?;
                (model, spread)
            }
        };

        let signals = self.engine.generate(&trading_spread)?;
        let backtest = self
            .simulator
            .run_series(&signals, &trading_spread, model.hedge_ratio)
            .map_err(|e| e.for_pair(pair.clone()))?;

        Ok(PairEvaluation {
            pair,
            model,
            trading_spread,
            backtest,
        })
    }

    /// Discover pairs, then evaluate each one. Pairs whose spread or signals
    /// cannot be computed are skipped; configuration and simulation errors abort.
    pub fn run(&self, panel: &PricePanel, train_fraction: Option<f64>) -> Result<ScanReport> {
        let discovery = self.discover(panel)?;
        let mut evaluations = Vec::with_capacity(discovery.pairs.len());
        let mut skipped = Vec::new();

        for candidate in &discovery.pairs {
            match self.evaluate_pair(panel, &candidate.symbol_a, &candidate.symbol_b, train_fraction) {
                Ok(evaluation) => {
                    info!(
                        pair = %evaluation.pair,
                        p_value = candidate.p_value,
                        hedge_ratio = evaluation.model.hedge_ratio,
                        trades = evaluation.backtest.report.total_trades,
                        total_return = evaluation.backtest.report.total_return,
                        "Evaluated pair"
                    );
                    evaluations.push(evaluation);
                }
                Err(e) if e.is_model_fit() || e.is_data_quality() => {
                    warn!(pair = %candidate.key(), error = %e, "Skipping pair");
                    skipped.push(PairFailure {
                        pair: candidate.key(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ScanReport {
            discovery,
            evaluations,
            skipped,
        })
    }

    /// Load a panel from `source` and run the full scan.
    pub fn run_source(
        &self,
        source: &dyn PriceSource,
        query: &DataQuery,
        train_fraction: Option<f64>,
    ) -> Result<ScanReport> {
        let panel = source.load(query)?;
        self.run(&panel, train_fraction)
    }

    /// Current state of one pair for monitoring.
    pub fn snapshot(&self, panel: &PricePanel, dependent: &str, independent: &str) -> Result<PairSnapshot> {
        let pair = PairKey::new(dependent, independent);
        let y = panel.require(dependent, Stage::PairDiscovery)?;
        let x = panel.require(independent, Stage::PairDiscovery)?;

        let cointegration = CointegrationTest::new(self.config.discovery.lag_selection)
            .engle_granger(y.prices(), x.prices())
            .map_err(|e| e.for_pair(pair.clone()))?;
        let model = calculate_spread(y, x)?;
        let signals = self.engine.generate(&model.spread)?;
        let latest = signals.latest().copied();
        let sizing = latest
            .and_then(|p| p.zscore)
            .map(|z| sizing_advice(z, model.hedge_ratio));

        Ok(PairSnapshot {
            pair,
            cointegration,
            model,
            latest,
            sizing,
        })
    }
}

fn split_index(observations: usize, fraction: f64) -> Result<usize> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(Error::configuration(format!(
            "train fraction {fraction} must lie strictly between 0 and 1"
        )));
    }
    let index = (observations as f64 * fraction).floor() as usize;
    if index < 2 || observations - index < 2 {
        return Err(Error::configuration(format!(
            "train fraction {fraction} leaves too few observations on one side of {observations}"
        )));
    }
    Ok(index)
}
