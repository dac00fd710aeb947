//! Pair Scanner
//!
//! Command-line front end for pair discovery, spread backtests and
//! single-pair monitoring snapshots. Results are written to stdout as JSON;
//! logs go to stderr.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use backtester::{CsvPriceSource, DataQuery, PriceSource};
use clap::{Args, Parser, Subcommand};
use pair_scanner::Pipeline;
use serde::Serialize;
use statarb_core::config::{HoldPolicy, ZScoreWindow};
use statarb_core::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "pair_scanner=info,pair_discovery=info,backtester=info,statarb_core=warn";

#[derive(Parser)]
#[command(
    name = "pair-scanner",
    version,
    about = "Find cointegrated pairs and backtest mean-reversion on their spreads"
)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults plus STATARB_* variables otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank cointegrated pairs in a price table
    Discover(DiscoverArgs),
    /// Backtest one pair, or every discovered pair
    Backtest(BacktestArgs),
    /// Show the current signal state of one pair
    Snapshot(SnapshotArgs),
}

#[derive(Args)]
struct DiscoverArgs {
    /// Wide CSV: timestamp column then one price column per symbol
    #[arg(long)]
    prices: PathBuf,

    /// Cointegration significance level
    #[arg(long)]
    significance: Option<f64>,

    /// Test pairs on the current thread only
    #[arg(long, default_value_t = false)]
    serial: bool,

    /// Only print the N strongest pairs
    #[arg(long)]
    top: Option<usize>,
}

#[derive(Args)]
struct BacktestArgs {
    #[arg(long)]
    prices: PathBuf,

    /// Dependent symbol; requires --independent
    #[arg(long, requires = "independent")]
    dependent: Option<String>,

    /// Independent (hedge) symbol; requires --dependent
    #[arg(long, requires = "dependent")]
    independent: Option<String>,

    /// Rolling z-score window; full-series statistics when omitted
    #[arg(long)]
    window: Option<usize>,

    #[arg(long)]
    entry: Option<f64>,

    #[arg(long)]
    exit: Option<f64>,

    /// Repeat the open signal while holding instead of emitting FLAT
    #[arg(long, default_value_t = false)]
    hold: bool,

    /// Fit the hedge ratio on this leading share of the data and trade the rest
    #[arg(long)]
    train_fraction: Option<f64>,

    /// Include the trade log in the output
    #[arg(long, default_value_t = false)]
    trades: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    #[arg(long)]
    prices: PathBuf,

    #[arg(long)]
    dependent: String,

    #[arg(long)]
    independent: String,

    #[arg(long)]
    window: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::from_env()?,
    };

    match cli.command {
        Commands::Discover(args) => discover(config, args),
        Commands::Backtest(args) => {
            apply_signal_overrides(&mut config, args.window, args.entry, args.exit, args.hold);
            backtest(config, args)
        }
        Commands::Snapshot(args) => {
            apply_signal_overrides(&mut config, args.window, None, None, false);
            snapshot(config, args)
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn apply_signal_overrides(
    config: &mut Config,
    window: Option<usize>,
    entry: Option<f64>,
    exit: Option<f64>,
    hold: bool,
) {
    if window.is_some() {
        config.signals.window = ZScoreWindow::from_size(window);
    }
    if let Some(entry) = entry {
        config.signals.entry_threshold = entry;
    }
    if let Some(exit) = exit {
        config.signals.exit_threshold = exit;
    }
    if hold {
        config.signals.hold_policy = HoldPolicy::Repeat;
    }
}

fn load(path: &Path) -> Result<statarb_core::PricePanel> {
    CsvPriceSource::new(path)
        .load(&DataQuery::new())
        .with_context(|| format!("loading prices from {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn discover(mut config: Config, args: DiscoverArgs) -> Result<()> {
    if let Some(significance) = args.significance {
        config.discovery.significance = significance;
    }
    if args.serial {
        config.discovery.parallel = false;
    }

    let panel = load(&args.prices)?;
    let pipeline = Pipeline::new(config)?;
    let mut result = pipeline.discover(&panel)?;

    if let Some(top) = args.top {
        result.pairs.truncate(top);
    }
    info!(pairs = result.pairs.len(), "Discovery finished");
    print_json(&result)
}

#[derive(Serialize)]
struct BacktestOutput {
    pair: pair_scanner::PairSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    trades: Option<Vec<backtester::TradeRecord>>,
}

fn backtest(config: Config, args: BacktestArgs) -> Result<()> {
    let panel = load(&args.prices)?;
    let pipeline = Pipeline::new(config)?;

    let evaluations = match (&args.dependent, &args.independent) {
        (Some(dependent), Some(independent)) => {
            vec![pipeline.evaluate_pair(&panel, dependent, independent, args.train_fraction)?]
        }
        _ => {
            let report = pipeline.run(&panel, args.train_fraction)?;
            info!(
                evaluated = report.evaluations.len(),
                skipped = report.skipped.len(),
                "Scan finished"
            );
            report.evaluations
        }
    };

    let output: Vec<BacktestOutput> = evaluations
        .iter()
        .map(|e| BacktestOutput {
            pair: e.summary(),
            trades: args.trades.then(|| e.backtest.trades.clone()),
        })
        .collect();
    print_json(&output)
}

fn snapshot(config: Config, args: SnapshotArgs) -> Result<()> {
    let panel = load(&args.prices)?;
    let pipeline = Pipeline::new(config)?;
    let snapshot = pipeline.snapshot(&panel, &args.dependent, &args.independent)?;

    if let Some(point) = &snapshot.latest {
        info!(
            pair = %snapshot.pair,
            zscore = ?point.zscore,
            strength = ?point.strength,
            "Latest signal"
        );
    }

    #[derive(Serialize)]
    struct SnapshotOutput<'a> {
        pair: &'a statarb_core::PairKey,
        cointegration: &'a pair_discovery::CointegrationResult,
        hedge_ratio: f64,
        intercept: f64,
        r_squared: f64,
        half_life: Option<f64>,
        latest: &'a Option<backtester::SignalPoint>,
        sizing: &'a Option<backtester::SizingAdvice>,
    }

    print_json(&SnapshotOutput {
        pair: &snapshot.pair,
        cointegration: &snapshot.cointegration,
        hedge_ratio: snapshot.model.hedge_ratio,
        intercept: snapshot.model.intercept,
        r_squared: snapshot.model.r_squared,
        half_life: snapshot.model.half_life,
        latest: &snapshot.latest,
        sizing: &snapshot.sizing,
    })
}
