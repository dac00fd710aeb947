//! Trading signal vocabulary shared by the signal engine and the simulator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Discrete instruction emitted per spread index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// Buy the dependent leg, sell `hedge_ratio` units of the independent leg.
    LongSpread,
    /// Sell the dependent leg, buy `hedge_ratio` units of the independent leg.
    ShortSpread,
    Flat,
    Exit,
}

impl Signal {
    pub fn is_open(self) -> bool {
        matches!(self, Self::LongSpread | Self::ShortSpread)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LongSpread => "LONG_SPREAD",
            Self::ShortSpread => "SHORT_SPREAD",
            Self::Flat => "FLAT",
            Self::Exit => "EXIT",
        };
        f.write_str(s)
    }
}

/// Advisory label for the magnitude of a z-score. Never changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Neutral,
    Approaching,
    Regular,
    Strong,
}

/// Validated entry/exit z-score thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    entry: f64,
    exit: f64,
}

impl Thresholds {
    /// Requires finite values with `entry > exit >= 0`.
    pub fn new(entry: f64, exit: f64) -> Result<Self> {
        if !entry.is_finite() || !exit.is_finite() {
            return Err(Error::configuration(format!(
                "thresholds must be finite (entry {entry}, exit {exit})"
            )));
        }
        if exit < 0.0 {
            return Err(Error::configuration(format!(
                "exit threshold {exit} must be non-negative"
            )));
        }
        if entry <= exit {
            return Err(Error::configuration(format!(
                "entry threshold {entry} must exceed exit threshold {exit}"
            )));
        }
        Ok(Self { entry, exit })
    }

    pub fn entry(&self) -> f64 {
        self.entry
    }

    pub fn exit(&self) -> f64 {
        self.exit
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            entry: 1.0,
            exit: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_thresholds_rejected() {
        let err = Thresholds::new(0.5, 1.0).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_equal_and_negative_thresholds_rejected() {
        assert!(Thresholds::new(1.0, 1.0).is_err());
        assert!(Thresholds::new(1.0, -0.1).is_err());
        assert!(Thresholds::new(f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_signal_wire_names() {
        assert_eq!(serde_json::to_string(&Signal::LongSpread).unwrap(), "\"LONG_SPREAD\"");
        assert_eq!(Signal::Exit.to_string(), "EXIT");
        assert!(Signal::ShortSpread.is_open());
        assert!(!Signal::Flat.is_open());
    }
}
