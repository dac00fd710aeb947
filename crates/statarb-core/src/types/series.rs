//! Price series and aligned multi-instrument panels.

use std::collections::HashMap;
use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Stage};

/// Ordered, immutable price history for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct PriceSeries {
    symbol: String,
    timestamps: Vec<DateTime<Utc>>,
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Build a series, rejecting misaligned, non-monotonic or non-finite input.
    pub fn new(
        symbol: impl Into<String>,
        timestamps: Vec<DateTime<Utc>>,
        prices: Vec<f64>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if timestamps.len() != prices.len() {
            return Err(Error::data_quality(
                Stage::Load,
                format!(
                    "{symbol}: {} timestamps but {} prices",
                    timestamps.len(),
                    prices.len()
                ),
            ));
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::data_quality(
                Stage::Load,
                format!("{symbol}: timestamps not strictly increasing at index {}", i + 1),
            ));
        }
        if let Some(i) = prices.iter().position(|p| !p.is_finite()) {
            return Err(Error::data_quality(
                Stage::Load,
                format!("{symbol}: non-finite price at index {i}"),
            ));
        }

        Ok(Self {
            symbol,
            timestamps,
            prices,
        })
    }

    /// Build a series from (timestamp, price) points.
    pub fn from_points(symbol: impl Into<String>, points: Vec<(DateTime<Utc>, f64)>) -> Result<Self> {
        let (timestamps, prices) = points.into_iter().unzip();
        Self::new(symbol, timestamps, prices)
    }

    /// Build a series on a synthetic daily timeline starting at the Unix epoch.
    pub fn from_values(symbol: impl Into<String>, prices: Vec<f64>) -> Result<Self> {
        let timestamps = daily_timeline(prices.len())?;
        Self::new(symbol, timestamps, prices)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.timestamps.iter().copied().zip(self.prices.iter().copied())
    }

    /// Whether every price is identical (zero variance).
    pub fn is_constant(&self) -> bool {
        match self.prices.first() {
            Some(first) => self.prices.iter().all(|p| p == first),
            None => true,
        }
    }

    fn slice(&self, range: Range<usize>) -> Self {
        Self {
            symbol: self.symbol.clone(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            prices: self.prices[range].to_vec(),
        }
    }
}

#[derive(Deserialize)]
struct RawSeries {
    symbol: String,
    timestamps: Vec<DateTime<Utc>>,
    prices: Vec<f64>,
}

impl TryFrom<RawSeries> for PriceSeries {
    type Error = Error;

    fn try_from(raw: RawSeries) -> Result<Self> {
        Self::new(raw.symbol, raw.timestamps, raw.prices)
    }
}

/// Instruments sharing one aligned timeline, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPanel")]
pub struct PricePanel {
    timeline: Vec<DateTime<Utc>>,
    series: Vec<PriceSeries>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PricePanel {
    /// Build a panel. Every series must share the first series' timeline.
    pub fn new(series: Vec<PriceSeries>) -> Result<Self> {
        let timeline = series
            .first()
            .map(|s| s.timestamps.clone())
            .unwrap_or_default();

        let mut index = HashMap::with_capacity(series.len());
        for (i, s) in series.iter().enumerate() {
            if s.timestamps != timeline {
                return Err(Error::data_quality(
                    Stage::Load,
                    format!(
                        "{}: timeline differs from {} ({} vs {} points)",
                        s.symbol,
                        series[0].symbol,
                        s.len(),
                        timeline.len()
                    ),
                ));
            }
            if index.insert(s.symbol.clone(), i).is_some() {
                return Err(Error::data_quality(
                    Stage::Load,
                    format!("duplicate symbol {}", s.symbol),
                ));
            }
        }

        Ok(Self {
            timeline,
            series,
            index,
        })
    }

    /// Symbols in panel order.
    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.symbol()).collect()
    }

    pub fn series(&self) -> &[PriceSeries] {
        &self.series
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.index.get(symbol).map(|&i| &self.series[i])
    }

    /// Look up a symbol, reporting a missing one as a data quality error of `stage`.
    pub fn require(&self, symbol: &str, stage: Stage) -> Result<&PriceSeries> {
        self.get(symbol)
            .ok_or_else(|| Error::data_quality(stage, format!("symbol {symbol} not in panel")))
    }

    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn timeline(&self) -> &[DateTime<Utc>] {
        &self.timeline
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of aligned observations per instrument.
    pub fn observations(&self) -> usize {
        self.timeline.len()
    }

    /// Restrict to a contiguous range of time indices.
    pub fn slice(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.observations() {
            return Err(Error::data_quality(
                Stage::Load,
                format!(
                    "slice {}..{} out of bounds for {} observations",
                    range.start,
                    range.end,
                    self.observations()
                ),
            ));
        }
        Self::new(self.series.iter().map(|s| s.slice(range.clone())).collect())
    }

    /// Split into (train, test) panels at `index`; the test panel starts at `index`.
    pub fn split_at(&self, index: usize) -> Result<(Self, Self)> {
        let train = self.slice(0..index)?;
        let test = self.slice(index..self.observations())?;
        Ok((train, test))
    }

    /// Keep only the given symbols, in the given order.
    pub fn select(&self, symbols: &[String]) -> Result<Self> {
        let picked = symbols
            .iter()
            .map(|s| self.require(s, Stage::Load).cloned())
            .collect::<Result<Vec<_>>>()?;
        Self::new(picked)
    }

}

#[derive(Deserialize)]
struct RawPanel {
    #[serde(default)]
    timeline: Vec<DateTime<Utc>>,
    series: Vec<PriceSeries>,
}

impl TryFrom<RawPanel> for PricePanel {
    type Error = Error;

    fn try_from(raw: RawPanel) -> Result<Self> {
        let panel = Self::new(raw.series)?;
        if !panel.series.is_empty() && !raw.timeline.is_empty() && raw.timeline != panel.timeline {
            return Err(Error::data_quality(
                Stage::Load,
                "panel timeline differs from its series",
            ));
        }
        Ok(panel)
    }
}

fn daily_timeline(len: usize) -> Result<Vec<DateTime<Utc>>> {
    (0..len)
        .map(|i| {
            DateTime::<Utc>::UNIX_EPOCH
                .checked_add_signed(Duration::days(i as i64))
                .ok_or_else(|| Error::data_quality(Stage::Load, "synthetic timeline overflow"))
        })
        .collect()
}
