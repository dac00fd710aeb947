//! Integration tests for component interactions.
//!
//! These tests drive discovery, spread modelling, signal generation and the
//! simulator together through their public APIs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use statarb::backtest::{
    backtest_strategy, calculate_zscore, generate_signals, CsvPriceSource, DataQuery, ExitReason,
    PriceSource, SignalEngine,
};
use statarb::core::config::{HoldPolicy, SignalConfig, ZScoreWindow};
use statarb::core::{Config, PricePanel, PriceSeries, Signal, Thresholds};
use statarb::discovery::{calculate_spread, find_cointegrated_pairs, PairDiscovery};
use statarb::scanner::Pipeline;

const ROUND_TRIP: [f64; 9] = [0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0, 0.0];

/// A and B cointegrated (B tracks A), C an unrelated random walk.
fn synthetic_panel(len: usize, seed: u64) -> PricePanel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut a_level = 100.0;
    let mut c_level = 50.0;
    let mut a = Vec::with_capacity(len);
    let mut b = Vec::with_capacity(len);
    let mut c = Vec::with_capacity(len);

    for _ in 0..len {
        a_level += rng.gen_range(-1.0..1.0);
        c_level += rng.gen_range(-1.0..1.0);
        a.push(a_level);
        b.push(1.5 * a_level + 10.0 + rng.gen_range(-1.0..1.0));
        c.push(c_level);
    }

    PricePanel::new(vec![
        PriceSeries::from_values("A", a).unwrap(),
        PriceSeries::from_values("B", b).unwrap(),
        PriceSeries::from_values("C", c).unwrap(),
    ])
    .unwrap()
}

fn panel_to_csv(panel: &PricePanel) -> String {
    let mut out = String::from("date");
    for symbol in panel.symbols() {
        out.push(',');
        out.push_str(symbol);
    }
    out.push('\n');

    for (row, ts) in panel.timeline().iter().enumerate() {
        out.push_str(&ts.format("%Y-%m-%d").to_string());
        for series in panel.series() {
            out.push_str(&format!(",{}", series.prices()[row]));
        }
        out.push('\n');
    }
    out
}

/// The four-step round trip through the free-function API.
#[test]
fn test_round_trip_scenario_end_to_end() {
    let zscore = calculate_zscore(&ROUND_TRIP, ZScoreWindow::Static).unwrap();
    let signals = generate_signals(&zscore, 1.0, 0.0).unwrap();

    assert_eq!(signals.signals()[2], Signal::ShortSpread);
    assert_eq!(signals.signals()[4], Signal::Exit);
    assert_eq!(signals.signals()[6], Signal::LongSpread);
    assert_eq!(signals.signals()[8], Signal::Exit);

    let result = backtest_strategy(&signals, &ROUND_TRIP, 1.0).unwrap();

    assert_eq!(result.report.total_trades, 2);
    assert_eq!(result.report.win_rate, 1.0);
    assert!(result
        .trades
        .iter()
        .all(|t| t.exit_reason == ExitReason::Signal && t.pnl > 0.0));
    assert_eq!(result.equity_curve.last().copied(), Some(4.0));
}

/// Discovery finds the constructed pair with the right direction and hedge ratio.
#[test]
fn test_discovery_finds_constructed_pair() {
    let panel = synthetic_panel(500, 42);
    let result = find_cointegrated_pairs(&panel, 0.05).unwrap();

    assert_eq!(result.symbols, vec!["A", "B", "C"]);
    assert_eq!(result.tested(), 3);

    let best = result.best().expect("A/B should be cointegrated");
    assert_eq!((best.symbol_a.as_str(), best.symbol_b.as_str()), ("A", "B"));
    assert!(best.p_value < 0.01);

    // Regressing A on B recovers the inverse slope
    assert!((best.hedge_ratio - 1.0 / 1.5).abs() < 0.05);

    // Matrices are symmetric lookups
    assert_eq!(result.pvalues.get("A", "B"), result.pvalues.get("B", "A"));
    assert!(result.scores.get("A", "B").unwrap() < -4.0);
}

/// Serial and parallel scans produce identical results.
#[test]
fn test_discovery_parallel_matches_serial() {
    let panel = synthetic_panel(300, 3);
    let run = |parallel| {
        let mut config = Config::default().discovery;
        config.parallel = parallel;
        PairDiscovery::new(config)
            .unwrap()
            .find_cointegrated_pairs(&panel)
            .unwrap()
    };

    assert_eq!(run(true), run(false));
}

/// Spread model and signal engine agree with the discovery hedge ratio.
#[test]
fn test_spread_model_feeds_signal_engine() {
    let panel = synthetic_panel(400, 5);
    let b = panel.get("B").unwrap();
    let a = panel.get("A").unwrap();

    let model = calculate_spread(b, a).unwrap();
    assert!((model.hedge_ratio - 1.5).abs() < 0.05);
    assert!(model.r_squared > 0.95);
    assert_eq!(model.spread.len(), 400);
    assert!(model.spread_mean.abs() < 1e-8);

    let engine = SignalEngine::new(SignalConfig::default()).unwrap();
    let signals = engine.generate(&model.spread).unwrap();
    assert_eq!(signals.len(), 400);
    assert!(signals.signals().iter().any(|s| s.is_open()));
}

/// Full pipeline evaluates the cointegrated pair and backtests it.
#[test]
fn test_pipeline_run() {
    let panel = synthetic_panel(500, 42);
    let pipeline = Pipeline::new(Config::default()).unwrap();

    let report = pipeline.run(&panel, None).unwrap();
    let ab = report
        .evaluations
        .iter()
        .find(|e| e.pair.first == "A" && e.pair.second == "B")
        .expect("A/B evaluated");

    assert_eq!(ab.trading_spread.len(), 500);
    assert_eq!(ab.backtest.equity_curve.len(), 500);
    assert!(ab.backtest.report.total_trades > 0);
    assert!((0.0..=1.0).contains(&ab.backtest.report.win_rate));
    assert!(ab.backtest.report.max_drawdown >= 0.0);

    let ranked = report.ranked_by_sharpe();
    assert_eq!(ranked.len(), report.evaluations.len());
}

/// Out-of-sample evaluation trades only the held-out tail.
#[test]
fn test_pipeline_train_split() {
    let panel = synthetic_panel(500, 42);
    let pipeline = Pipeline::new(Config::default()).unwrap();

    let evaluation = pipeline.evaluate_pair(&panel, "B", "A", Some(0.8)).unwrap();
    assert_eq!(evaluation.model.spread.len(), 400);
    assert_eq!(evaluation.trading_spread.len(), 100);
    assert_eq!(evaluation.backtest.equity_curve.len(), 100);

    let err = pipeline.evaluate_pair(&panel, "B", "A", Some(1.0)).unwrap_err();
    assert!(err.is_configuration());
}

/// One instrument means nothing to pair, not an error.
#[test]
fn test_single_instrument_panel() {
    let panel = PricePanel::new(vec![
        PriceSeries::from_values("ONLY", vec![1.0, 2.0, 3.0, 2.5]).unwrap(),
    ])
    .unwrap();

    let result = find_cointegrated_pairs(&panel, 0.05).unwrap();
    assert!(result.pairs.is_empty());
    assert_eq!(result.tested(), 0);

    let report = Pipeline::new(Config::default()).unwrap().run(&panel, None).unwrap();
    assert!(report.evaluations.is_empty());
    assert!(report.skipped.is_empty());
}

/// A flat instrument is rejected before any pair is tested.
#[test]
fn test_constant_series_rejected() {
    let mut rng = StdRng::seed_from_u64(9);
    let walk: Vec<f64> = (0..100).map(|i| i as f64 + rng.gen_range(-0.5..0.5)).collect();
    let panel = PricePanel::new(vec![
        PriceSeries::from_values("WALK", walk).unwrap(),
        PriceSeries::from_values("FLAT", vec![10.0; 100]).unwrap(),
    ])
    .unwrap();

    let err = find_cointegrated_pairs(&panel, 0.05).unwrap_err();
    assert!(err.is_data_quality());
}

/// Threshold ordering is enforced everywhere thresholds enter.
#[test]
fn test_threshold_validation() {
    assert!(Thresholds::new(0.5, 1.0).unwrap_err().is_configuration());
    assert!(Thresholds::new(1.0, 1.0).unwrap_err().is_configuration());
    assert!(Thresholds::new(1.0, -0.1).unwrap_err().is_configuration());
    assert!(Thresholds::new(2.0, 0.5).is_ok());

    let zscore = calculate_zscore(&ROUND_TRIP, ZScoreWindow::Static).unwrap();
    assert!(generate_signals(&zscore, 0.0, 0.5).is_err());

    let mut config = Config::default();
    config.signals.entry_threshold = 0.2;
    config.signals.exit_threshold = 0.4;
    assert!(Pipeline::new(config).unwrap_err().is_configuration());
}

/// Repeat hold policy keeps emitting the open side while held.
#[test]
fn test_hold_policy_repeat_backtests_identically() {
    let flat = SignalEngine::new(SignalConfig::default()).unwrap();
    let repeat = SignalEngine::new(SignalConfig {
        hold_policy: HoldPolicy::Repeat,
        ..SignalConfig::default()
    })
    .unwrap();

    let flat_signals = flat.generate(&ROUND_TRIP).unwrap();
    let repeat_signals = repeat.generate(&ROUND_TRIP).unwrap();
    assert_eq!(repeat_signals.signals()[3], Signal::ShortSpread);
    assert_eq!(flat_signals.signals()[3], Signal::Flat);

    let a = backtest_strategy(&flat_signals, &ROUND_TRIP, 1.0).unwrap();
    let b = backtest_strategy(&repeat_signals, &ROUND_TRIP, 1.0).unwrap();
    assert_eq!(a.equity_curve, b.equity_curve);
    assert_eq!(a.report.total_trades, b.report.total_trades);
}

/// CSV text goes through the loader and into the pipeline.
#[test]
fn test_csv_to_pipeline() {
    let panel = synthetic_panel(250, 42);
    let csv = panel_to_csv(&panel);

    let loaded = CsvPriceSource::read_panel(csv.as_bytes()).unwrap();
    assert_eq!(loaded.symbols(), vec!["A", "B", "C"]);
    assert_eq!(loaded.observations(), 250);

    let report = Pipeline::new(Config::default())
        .unwrap()
        .run(&loaded, None)
        .unwrap();
    assert!(report
        .discovery
        .pairs
        .iter()
        .any(|p| p.symbol_a == "A" && p.symbol_b == "B"));
}

/// File-backed source honours the query's symbol selection.
#[test]
fn test_csv_file_source_with_query() {
    let panel = synthetic_panel(120, 17);
    let path = std::env::temp_dir().join(format!("statarb-it-{}.csv", std::process::id()));
    std::fs::write(&path, panel_to_csv(&panel)).unwrap();

    let source = CsvPriceSource::new(&path);
    let query = DataQuery::new().symbols(vec!["C".to_string(), "A".to_string()]);
    let loaded = source.load(&query);
    std::fs::remove_file(&path).ok();

    let loaded = loaded.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.get("B").is_none());
    assert_eq!(loaded.get("A").unwrap().prices(), panel.get("A").unwrap().prices());
}

/// Reports serialize to JSON for downstream tooling.
#[test]
fn test_report_serialization() {
    let panel = synthetic_panel(300, 42);
    let report = Pipeline::new(Config::default())
        .unwrap()
        .run(&panel, None)
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["discovery"]["pairs"].is_array());
    assert_eq!(
        json["evaluations"].as_array().map(|e| e.len()),
        Some(report.evaluations.len())
    );

    let summaries: Vec<_> = report.evaluations.iter().map(|e| e.summary()).collect();
    let text = serde_json::to_string(&summaries).unwrap();
    assert!(text.contains("\"hedge_ratio\""));
}

/// Config round-trips through JSON with tagged enums.
#[test]
fn test_config_json_round_trip() {
    let mut config = Config::default();
    config.signals.window = ZScoreWindow::Rolling { size: 20 };
    config.signals.hold_policy = HoldPolicy::Repeat;

    let json = serde_json::to_string(&config).unwrap();
    let parsed: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
    assert!(parsed.validate().is_ok());
}
