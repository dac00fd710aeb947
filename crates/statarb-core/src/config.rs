//! Run configuration for discovery, signal generation and backtesting.
//!
//! Every parameter is explicit and validated up front; no stage reads hidden
//! state. Values come from defaults, a config file, `STATARB_*` environment
//! variables or CLI overrides, in increasing precedence.

use std::env;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::LagSelection;
use crate::types::Thresholds;
use crate::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub signals: SignalConfig,
    pub backtest: BacktestConfig,
}

/// Which pairs survive beyond a significant residual test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Strictness {
    /// Residual stationarity alone decides.
    #[default]
    Residual,
    /// Also require at least `min_samples` aligned observations.
    MinSamples { min_samples: usize },
    /// Minimum samples, and both legs must individually look non-stationary.
    Strict { min_samples: usize },
}

impl Strictness {
    pub fn min_samples(&self) -> Option<usize> {
        match self {
            Self::Residual => None,
            Self::MinSamples { min_samples } | Self::Strict { min_samples } => Some(*min_samples),
        }
    }

    pub fn requires_integrated_legs(&self) -> bool {
        matches!(self, Self::Strict { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub significance: f64,
    pub lag_selection: LagSelection,
    pub strictness: Strictness,
    pub parallel: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            lag_selection: LagSelection::default(),
            strictness: Strictness::default(),
            parallel: true,
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.significance > 0.0 && self.significance <= 0.5) {
            return Err(Error::configuration(format!(
                "significance {} outside (0, 0.5]",
                self.significance
            )));
        }
        if self.strictness.min_samples() == Some(0) {
            return Err(Error::configuration("min_samples must be positive"));
        }
        Ok(())
    }
}

/// Mean/std estimation window for z-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZScoreWindow {
    /// Full-series mean and standard deviation.
    #[default]
    Static,
    /// Trailing window of `size` points ending at each index.
    Rolling { size: usize },
}

impl ZScoreWindow {
    pub fn from_size(size: Option<usize>) -> Self {
        match size {
            Some(size) => Self::Rolling { size },
            None => Self::Static,
        }
    }

    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Static => None,
            Self::Rolling { size } => Some(*size),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Rolling { size } if *size < 2 => Err(Error::configuration(format!(
                "rolling window {size} must be at least 2"
            ))),
            _ => Ok(()),
        }
    }
}

/// Signal emitted while a position is held and no exit fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldPolicy {
    /// Emit FLAT (no new instruction) while holding.
    #[default]
    Flat,
    /// Repeat the open signal while holding.
    Repeat,
}

impl FromStr for HoldPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "repeat" | "hold" => Ok(Self::Repeat),
            other => Err(Error::configuration(format!("unknown hold policy {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub window: ZScoreWindow,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub hold_policy: HoldPolicy,
    /// Advisory "approaching" label as a fraction of the exit to entry gap;
    /// `None` disables it.
    pub alert_fraction: Option<f64>,
    /// Multiple of the entry threshold labelled "strong".
    pub strong_multiplier: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window: ZScoreWindow::Static,
            entry_threshold: 1.0,
            exit_threshold: 0.0,
            hold_policy: HoldPolicy::Flat,
            alert_fraction: Some(0.8),
            strong_multiplier: 2.0,
        }
    }
}

impl SignalConfig {
    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::new(self.entry_threshold, self.exit_threshold)
    }

    /// Absolute |z| level of the "approaching" label for these thresholds.
    pub fn alert_threshold(&self) -> Option<f64> {
        self.alert_fraction.map(|fraction| {
            self.exit_threshold + fraction * (self.entry_threshold - self.exit_threshold)
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.thresholds()?;
        if !(self.strong_multiplier.is_finite() && self.strong_multiplier >= 1.0) {
            return Err(Error::configuration(format!(
                "strong multiplier {} must be at least 1",
                self.strong_multiplier
            )));
        }
        if let Some(fraction) = self.alert_fraction {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(Error::configuration(format!(
                    "alert fraction {fraction} must lie strictly between 0 and 1"
                )));
            }
        }
        Ok(())
    }
}

/// How the equity curve is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EquityBasis {
    /// Cumulative P&L in spread units starting at zero.
    #[default]
    Additive,
    /// Starting capital plus P&L; returns and drawdowns are relative.
    Capital { initial: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub periods_per_year: f64,
    pub equity: EquityBasis,
    /// Spread units traded per position.
    pub units: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            equity: EquityBasis::Additive,
            units: 1.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(Error::configuration(format!(
                "periods_per_year {} must be positive",
                self.periods_per_year
            )));
        }
        if !(self.units.is_finite() && self.units > 0.0) {
            return Err(Error::configuration(format!(
                "units {} must be positive",
                self.units
            )));
        }
        if let EquityBasis::Capital { initial } = self.equity {
            if !(initial.is_finite() && initial > 0.0) {
                return Err(Error::configuration(format!(
                    "initial capital {initial} must be positive"
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables on top of defaults.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(significance) = env_parse("STATARB_SIGNIFICANCE")? {
            config.discovery.significance = significance;
        }
        if let Some(max_lag) = env_parse::<usize>("STATARB_MAX_LAG")? {
            config.discovery.lag_selection = LagSelection::Aic {
                max_lag: Some(max_lag),
            };
        }
        if let Some(lags) = env_parse::<usize>("STATARB_ADF_LAGS")? {
            config.discovery.lag_selection = LagSelection::Fixed { lags };
        }
        if let Some(min_samples) = env_parse::<usize>("STATARB_MIN_SAMPLES")? {
            config.discovery.strictness = if env_parse("STATARB_STRICT")?.unwrap_or(false) {
                Strictness::Strict { min_samples }
            } else {
                Strictness::MinSamples { min_samples }
            };
        }
        if let Some(parallel) = env_parse("STATARB_PARALLEL")? {
            config.discovery.parallel = parallel;
        }

        if let Some(size) = env_parse::<usize>("STATARB_ZSCORE_WINDOW")? {
            config.signals.window = ZScoreWindow::Rolling { size };
        }
        if let Some(entry) = env_parse("STATARB_ENTRY_THRESHOLD")? {
            config.signals.entry_threshold = entry;
        }
        if let Some(exit) = env_parse("STATARB_EXIT_THRESHOLD")? {
            config.signals.exit_threshold = exit;
        }
        if let Some(policy) = env_parse("STATARB_HOLD_POLICY")? {
            config.signals.hold_policy = policy;
        }
        if let Some(fraction) = env_parse("STATARB_ALERT_FRACTION")? {
            config.signals.alert_fraction = Some(fraction);
        }
        if let Some(multiplier) = env_parse("STATARB_STRONG_MULTIPLIER")? {
            config.signals.strong_multiplier = multiplier;
        }

        if let Some(periods) = env_parse("STATARB_PERIODS_PER_YEAR")? {
            config.backtest.periods_per_year = periods;
        }
        if let Some(initial) = env_parse("STATARB_INITIAL_CAPITAL")? {
            config.backtest.equity = EquityBasis::Capital { initial };
        }
        if let Some(units) = env_parse("STATARB_UNITS")? {
            config.backtest.units = units;
        }

        config.validate()?;
        debug!(?config, "Loaded configuration from environment");
        Ok(config)
    }

    /// Load a TOML/YAML/JSON file, overlaid by `STATARB__SECTION__KEY` variables.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("STATARB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.discovery.validate()?;
        self.signals.validate()?;
        self.backtest.validate()
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::configuration(format!("{name}={raw:?} is not valid"))),
        Err(_) => Ok(None),
    }
}
