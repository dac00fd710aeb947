//! Historical price loading for backtests.
//!
//! Acquisition and cleaning happen upstream; this module only reads an
//! already aligned, gap-free table and refuses anything else.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statarb_core::{Error, PricePanel, PriceSeries, Result, Stage};
use tracing::{debug, info};

/// Sampling frequency of a price table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeResolution {
    Minute,
    Hour,
    /// Trading day
    #[default]
    Day,
    Week,
    Month,
}

impl TimeResolution {
    /// Get the nominal interval as a chrono Duration.
    pub fn to_duration(&self) -> Duration {
        match self {
            TimeResolution::Minute => Duration::minutes(1),
            TimeResolution::Hour => Duration::hours(1),
            TimeResolution::Day => Duration::days(1),
            TimeResolution::Week => Duration::weeks(1),
            TimeResolution::Month => Duration::days(30),
        }
    }

    /// Periods per year used to annualize ratios (252 trading days).
    pub fn periods_per_year(&self) -> f64 {
        match self {
            TimeResolution::Minute => 252.0 * 24.0 * 60.0,
            TimeResolution::Hour => 252.0 * 24.0,
            TimeResolution::Day => 252.0,
            TimeResolution::Week => 52.0,
            TimeResolution::Month => 12.0,
        }
    }
}

/// Query parameters for loading a panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuery {
    /// Symbols to keep, in this order (empty = all, file order).
    pub symbols: Vec<String>,
    /// Inclusive lower bound on timestamps.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound on timestamps.
    pub end_time: Option<DateTime<Utc>>,
    pub resolution: TimeResolution,
}

impl DataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query for a specific time range.
    pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
            ..Self::default()
        }
    }

    /// Filter by specific symbols.
    pub fn symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    /// Set time resolution.
    pub fn resolution(mut self, resolution: TimeResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Apply symbol selection and time bounds to a loaded panel.
    pub fn apply(&self, panel: &PricePanel) -> Result<PricePanel> {
        let timeline = panel.timeline();
        let start = match self.start_time {
            Some(t) => timeline.partition_point(|ts| *ts < t),
            None => 0,
        };
        let end = match self.end_time {
            Some(t) => timeline.partition_point(|ts| *ts <= t),
            None => timeline.len(),
        };
        let trimmed = panel.slice(start..end.max(start))?;

        if self.symbols.is_empty() {
            Ok(trimmed)
        } else {
            trimmed.select(&self.symbols)
        }
    }
}

/// Source of aligned price panels.
#[cfg_attr(test, mockall::automock)]
pub trait PriceSource {
    fn load(&self, query: &DataQuery) -> Result<PricePanel>;
}

/// Wide CSV: a timestamp column followed by one price column per symbol.
///
/// Timestamps may be RFC 3339 or `YYYY-MM-DD` (midnight UTC).
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a full panel from any reader.
    pub fn read_panel<R: Read>(reader: R) -> Result<PricePanel> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = csv.headers().map_err(csv_error)?.clone();
        if headers.len() < 2 {
            return Err(Error::data_quality(
                Stage::Load,
                "expected a timestamp column and at least one symbol column",
            ));
        }
        let symbols: Vec<String> = headers.iter().skip(1).map(String::from).collect();

        let mut timestamps = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); symbols.len()];

        for (row, record) in csv.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let line = row + 2;
            if record.len() != headers.len() {
                return Err(Error::data_quality(
                    Stage::Load,
                    format!("line {line}: expected {} fields, got {}", headers.len(), record.len()),
                ));
            }

            timestamps.push(parse_timestamp(&record[0]).ok_or_else(|| {
                Error::data_quality(
                    Stage::Load,
                    format!("line {line}: unparseable timestamp {:?}", &record[0]),
                )
            })?);

            for (col, cell) in record.iter().skip(1).enumerate() {
                columns[col].push(parse_price(cell, &symbols[col], line)?);
            }
        }

        let series = symbols
            .into_iter()
            .zip(columns)
            .map(|(symbol, prices)| PriceSeries::new(symbol, timestamps.clone(), prices))
            .collect::<Result<Vec<_>>>()?;

        let panel = PricePanel::new(series)?;
        debug!(
            instruments = panel.len(),
            observations = panel.observations(),
            "Parsed price table"
        );
        Ok(panel)
    }
}

impl PriceSource for CsvPriceSource {
    fn load(&self, query: &DataQuery) -> Result<PricePanel> {
        let file = File::open(&self.path)?;
        let panel = query.apply(&Self::read_panel(file)?)?;
        info!(
            path = %self.path.display(),
            instruments = panel.len(),
            observations = panel.observations(),
            "Loaded price panel"
        );
        Ok(panel)
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::data_quality(Stage::Load, e.to_string())
}

fn parse_price(cell: &str, symbol: &str, line: usize) -> Result<f64> {
    if cell.is_empty() {
        return Err(Error::data_quality(
            Stage::Load,
            format!("line {line}: missing price for {symbol}"),
        ));
    }
    match cell.parse::<f64>() {
        Ok(price) if price.is_finite() => Ok(price),
        _ => Err(Error::data_quality(
            Stage::Load,
            format!("line {line}: invalid price {cell:?} for {symbol}"),
        )),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "date,CADJPY,NZDJPY\n\
        2024-01-01,105.10,88.20\n\
        2024-01-02,105.40,88.35\n\
        2024-01-03,104.90,88.01\n\
        2024-01-04,105.70,88.60\n";

    #[test]
    fn test_read_wide_csv() {
        let panel = CsvPriceSource::read_panel(TABLE.as_bytes()).unwrap();
        assert_eq!(panel.symbols(), vec!["CADJPY", "NZDJPY"]);
        assert_eq!(panel.observations(), 4);
        assert_eq!(panel.get("NZDJPY").unwrap().prices()[2], 88.01);
    }

    #[test]
    fn test_rfc3339_timestamps() {
        let table = "ts,A\n2024-01-01T00:00:00Z,1.0\n2024-01-01T01:00:00+00:00,2.0\n";
        let panel = CsvPriceSource::read_panel(table.as_bytes()).unwrap();
        assert_eq!(panel.observations(), 2);
    }

    #[test]
    fn test_missing_cell_is_data_quality_error() {
        let table = "date,A,B\n2024-01-01,1.0,\n";
        let err = CsvPriceSource::read_panel(table.as_bytes()).unwrap_err();
        assert!(err.is_data_quality());
        assert!(err.to_string().contains("missing price for B"));
    }

    #[test]
    fn test_non_numeric_and_non_finite_rejected() {
        for bad in ["abc", "NaN", "inf"] {
            let table = format!("date,A\n2024-01-01,{bad}\n");
            assert!(CsvPriceSource::read_panel(table.as_bytes()).is_err());
        }
    }

    #[test]
    fn test_unordered_timestamps_rejected() {
        let table = "date,A\n2024-01-02,1.0\n2024-01-01,2.0\n";
        let err = CsvPriceSource::read_panel(table.as_bytes()).unwrap_err();
        assert!(err.is_data_quality());
    }

    #[test]
    fn test_query_trims_and_selects() {
        let panel = CsvPriceSource::read_panel(TABLE.as_bytes()).unwrap();
        let start = parse_timestamp("2024-01-02").unwrap();
        let end = parse_timestamp("2024-01-03").unwrap();
        let query = DataQuery::range(start, end).symbols(vec!["NZDJPY".to_string()]);

        let trimmed = query.apply(&panel).unwrap();
        assert_eq!(trimmed.symbols(), vec!["NZDJPY"]);
        assert_eq!(trimmed.get("NZDJPY").unwrap().prices(), &[88.35, 88.01]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = CsvPriceSource::new("/nonexistent/prices.csv");
        let err = source.load(&DataQuery::new()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_periods_per_year() {
        assert_eq!(TimeResolution::Day.periods_per_year(), 252.0);
        assert_eq!(TimeResolution::Week.periods_per_year(), 52.0);
        assert_eq!(TimeResolution::Month.periods_per_year(), 12.0);
    }

    #[test]
    fn test_mock_source() {
        let mut source = MockPriceSource::new();
        source.expect_load().times(1).returning(|_| {
            PricePanel::new(vec![PriceSeries::from_values("A", vec![1.0, 2.0]).unwrap()])
        });
        let panel = source.load(&DataQuery::new()).unwrap();
        assert_eq!(panel.len(), 1);
    }
}
