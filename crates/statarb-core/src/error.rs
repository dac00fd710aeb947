//! Error types for the pair trading research engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PairKey;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    PairDiscovery,
    SpreadModel,
    SignalEngine,
    Backtest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::PairDiscovery => "pair_discovery",
            Stage::SpreadModel => "spread_model",
            Stage::SignalEngine => "signal_engine",
            Stage::Backtest => "backtest",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Data quality error in {stage}: {message}")]
    DataQuality { stage: Stage, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Model fit error in {stage}{}: {message}", .pair.as_ref().map(|p| format!(" for {p}")).unwrap_or_default())]
    ModelFit {
        stage: Stage,
        pair: Option<PairKey>,
        message: String,
    },

    #[error("Simulation error at index {index}: {message}")]
    Simulation { index: usize, message: String },

    #[error("Undefined metric {metric}: {reason}")]
    UndefinedMetric { metric: &'static str, reason: String },

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn data_quality(stage: Stage, message: impl Into<String>) -> Self {
        Error::DataQuality {
            stage,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn model_fit(stage: Stage, message: impl Into<String>) -> Self {
        Error::ModelFit {
            stage,
            pair: None,
            message: message.into(),
        }
    }

    /// Attach pair context to a model fit error. Other variants pass through.
    pub fn for_pair(self, key: PairKey) -> Self {
        match self {
            Error::ModelFit { stage, message, .. } => Error::ModelFit {
                stage,
                pair: Some(key),
                message,
            },
            other => other,
        }
    }

    pub fn is_model_fit(&self) -> bool {
        matches!(self, Error::ModelFit { .. })
    }

    pub fn is_data_quality(&self) -> bool {
        matches!(self, Error::DataQuality { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. } | Error::ConfigFile(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
