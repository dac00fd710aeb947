//! Z-score normalization and the threshold state machine.

use serde::{Deserialize, Serialize};
use statarb_core::config::{HoldPolicy, SignalConfig, ZScoreWindow};
use statarb_core::stats;
use statarb_core::{Error, Result, Signal, SignalStrength, Stage, Thresholds};
use tracing::debug;

/// Z-score of each spread point; `None` where it is undefined (rolling
/// warm-up, or a rolling window with zero dispersion).
///
/// A static window with zero dispersion is a data quality error.
pub fn calculate_zscore(spread: &[f64], window: ZScoreWindow) -> Result<Vec<Option<f64>>> {
    window.validate()?;
    if let Some(i) = spread.iter().position(|s| !s.is_finite()) {
        return Err(Error::data_quality(
            Stage::SignalEngine,
            format!("non-finite spread value at index {i}"),
        ));
    }
    if spread.is_empty() {
        return Ok(Vec::new());
    }

    match window {
        ZScoreWindow::Static => {
            let (mean, std) = match (stats::mean(spread), stats::sample_std(spread)) {
                (Some(mean), Some(std)) if std > 0.0 => (mean, std),
                _ => {
                    return Err(Error::data_quality(
                        Stage::SignalEngine,
                        "spread has zero dispersion; z-score undefined",
                    ))
                }
            };
            Ok(spread.iter().map(|s| Some((s - mean) / std)).collect())
        }
        ZScoreWindow::Rolling { size } => Ok((0..spread.len())
            .map(|t| {
                if t + 1 < size {
                    return None;
                }
                let window = &spread[t + 1 - size..=t];
                let mean = stats::mean(window)?;
                let std = stats::sample_std(window).filter(|s| *s > 0.0)?;
                Some((spread[t] - mean) / std)
            })
            .collect()),
    }
}

/// Position state carried between indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    #[default]
    Flat,
    Long,
    Short,
}

impl SignalState {
    fn open_signal(self) -> Signal {
        match self {
            SignalState::Flat => Signal::Flat,
            SignalState::Long => Signal::LongSpread,
            SignalState::Short => Signal::ShortSpread,
        }
    }
}

/// One step of the signal state machine.
///
/// An undefined z-score never triggers a transition.
pub fn transition(
    state: SignalState,
    zscore: Option<f64>,
    thresholds: &Thresholds,
    policy: HoldPolicy,
) -> (SignalState, Signal) {
    let hold = |state: SignalState| match policy {
        HoldPolicy::Flat => (state, Signal::Flat),
        HoldPolicy::Repeat => (state, state.open_signal()),
    };

    match (state, zscore) {
        (SignalState::Flat, Some(z)) if z <= -thresholds.entry() => {
            (SignalState::Long, Signal::LongSpread)
        }
        (SignalState::Flat, Some(z)) if z >= thresholds.entry() => {
            (SignalState::Short, Signal::ShortSpread)
        }
        (SignalState::Flat, _) => (SignalState::Flat, Signal::Flat),
        (_, Some(z)) if z.abs() <= thresholds.exit() => (SignalState::Flat, Signal::Exit),
        (held, _) => hold(held),
    }
}

/// Advisory magnitude label.
pub fn classify_strength(zscore: Option<f64>, config: &SignalConfig) -> SignalStrength {
    let Some(z) = zscore.map(f64::abs) else {
        return SignalStrength::Neutral;
    };
    if z >= config.strong_multiplier * config.entry_threshold {
        SignalStrength::Strong
    } else if z >= config.entry_threshold {
        SignalStrength::Regular
    } else if config.alert_threshold().is_some_and(|alert| z >= alert) {
        SignalStrength::Approaching
    } else {
        SignalStrength::Neutral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub index: usize,
    pub zscore: Option<f64>,
    pub signal: Signal,
    /// State after this step.
    pub state: SignalState,
    pub strength: SignalStrength,
}

/// Signals aligned 1:1 with the spread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSeries {
    points: Vec<SignalPoint>,
    thresholds: Thresholds,
    hold_policy: HoldPolicy,
}

impl SignalSeries {
    pub fn points(&self) -> &[SignalPoint] {
        &self.points
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.points.iter().map(|p| p.signal).collect()
    }

    pub fn zscores(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.zscore).collect()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn hold_policy(&self) -> HoldPolicy {
        self.hold_policy
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Most recent point, for monitoring snapshots.
    pub fn latest(&self) -> Option<&SignalPoint> {
        self.points.last()
    }
}

/// Spread-side of a position or recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Long dependent, short `hedge_ratio` independent.
    Long,
    /// Short dependent, long `hedge_ratio` independent.
    Short,
}

/// Suggested scale for a new position, proportional to signal magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingAdvice {
    /// `None` when the z-score is exactly zero.
    pub side: Option<Side>,
    /// `min(|z|, 3) / 3`.
    pub multiplier: f64,
    pub dependent_units: f64,
    pub independent_units: f64,
}

pub fn sizing_advice(zscore: f64, hedge_ratio: f64) -> SizingAdvice {
    let multiplier = zscore.abs().min(3.0) / 3.0;
    let side = if zscore < 0.0 {
        Some(Side::Long)
    } else if zscore > 0.0 {
        Some(Side::Short)
    } else {
        None
    };
    SizingAdvice {
        side,
        multiplier,
        dependent_units: multiplier,
        independent_units: multiplier * hedge_ratio,
    }
}

/// Validated signal generator.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: SignalConfig,
    thresholds: Thresholds,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Result<Self> {
        config.validate()?;
        let thresholds = config.thresholds()?;
        Ok(Self { config, thresholds })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Z-score the spread with the configured window, then run the state machine.
    pub fn generate(&self, spread: &[f64]) -> Result<SignalSeries> {
        let zscore = calculate_zscore(spread, self.config.window)?;
        Ok(self.signals_for(&zscore))
    }

    pub fn signals_for(&self, zscore: &[Option<f64>]) -> SignalSeries {
        let mut state = SignalState::Flat;
        let points: Vec<SignalPoint> = zscore
            .iter()
            .enumerate()
            .map(|(index, &z)| {
                let (next, signal) = transition(state, z, &self.thresholds, self.config.hold_policy);
                state = next;
                SignalPoint {
                    index,
                    zscore: z,
                    signal,
                    state: next,
                    strength: classify_strength(z, &self.config),
                }
            })
            .collect();

        debug!(
            points = points.len(),
            entries = points.iter().filter(|p| p.signal.is_open()).count(),
            exits = points.iter().filter(|p| p.signal == Signal::Exit).count(),
            "Generated signals"
        );

        SignalSeries {
            points,
            thresholds: self.thresholds,
            hold_policy: self.config.hold_policy,
        }
    }
}

/// Run the state machine over precomputed z-scores with the FLAT hold policy.
pub fn generate_signals(
    zscore: &[Option<f64>],
    entry_threshold: f64,
    exit_threshold: f64,
) -> Result<SignalSeries> {
    let config = SignalConfig {
        entry_threshold,
        exit_threshold,
        alert_fraction: None,
        ..SignalConfig::default()
    };
    Ok(SignalEngine::new(config)?.signals_for(zscore))
}
