//! Historical replay: determinism, CSV sourcing and ordering rules.

mod common;

use approx::assert_relative_eq;
use common::*;
use confluence::adapters::csv_adapter::CsvCandleSource;
use confluence::domain::backtest::{BacktestConfig, BacktestResult, BacktestRunner, PositionSide};
use confluence::domain::error::ConfluenceError;
use confluence::domain::pipeline::PipelineConfig;
use confluence::domain::scorer::ScorerConfig;
use confluence::ports::candle_source::CandleSource;
use tempfile::TempDir;

fn runner() -> BacktestRunner {
    BacktestRunner::new(test_pipeline(), BacktestConfig::default())
}

/// The replay acted on confirmed signals instead of holding throughout.
fn assert_traded(result: &BacktestResult) {
    assert!(result.signals > 0, "no BUY/SELL signal in {} candles", result.candles);
    assert!(!result.trades.is_empty());
}

fn assert_same_outcome(a: &BacktestResult, b: &BacktestResult) {
    assert_traded(a);
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.signals, b.signals);
    assert_eq!(a.equity_curve, b.equity_curve);
    assert_eq!(a.metrics.win_rate.to_bits(), b.metrics.win_rate.to_bits());
    assert_eq!(a.metrics.max_drawdown.to_bits(), b.metrics.max_drawdown.to_bits());
    assert_eq!(a.metrics.total_return.to_bits(), b.metrics.total_return.to_bits());
}

mod determinism {
    use super::*;

    #[test]
    fn replaying_fixture_twice_is_identical() {
        let candles = fixture_candles(1000);
        let first = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        let second = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        assert_same_outcome(&first, &second);
    }

    #[test]
    fn determinism_holds_without_confirmation() {
        let pipeline = PipelineConfig {
            scorer: ScorerConfig {
                use_price_action: false,
                ..ScorerConfig::default()
            },
            ..test_pipeline()
        };
        let runner = BacktestRunner::new(pipeline, BacktestConfig::default());
        let candles = fixture_candles(1000);
        let first = runner.run("ETH_USDT", "Min15", &candles).unwrap();
        let second = runner.run("ETH_USDT", "Min15", &candles).unwrap();
        assert_same_outcome(&first, &second);
    }
}

mod accounting {
    use super::*;

    #[test]
    fn metrics_are_consistent_with_trades() {
        let candles = fixture_candles(1000);
        let result = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        assert_traded(&result);
        let m = &result.metrics;

        assert_eq!(result.candles, 1000);
        assert_eq!(result.equity_curve.len(), 1000);
        assert_eq!(m.total_trades, result.trades.len());
        assert!(m.trades_won + m.trades_lost <= m.total_trades);
        assert!(m.trades_won > 0 && m.trades_lost > 0);
        assert!((0.0..=1.0).contains(&m.win_rate));
        assert!((0.0..=1.0).contains(&m.max_drawdown));

        let pnl: f64 = result.trades.iter().map(|t| t.pnl).sum();
        assert_relative_eq!(m.final_balance, 10_000.0 + pnl, epsilon = 1e-6);
        assert_relative_eq!(m.total_return, pnl / 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn trades_are_chronological_and_alternate_sides() {
        let candles = fixture_candles(1000);
        let result = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        assert_traded(&result);
        assert!(result.trades.len() >= 2);
        for t in &result.trades {
            assert!(t.entry_time <= t.exit_time);
        }
        for pair in result.trades.windows(2) {
            assert!(pair[0].exit_time <= pair[1].entry_time);
            assert_ne!(pair[0].direction, pair[1].direction);
        }
    }

    #[test]
    fn entry_price_includes_fee() {
        let candles = fixture_candles(1000);
        let result = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        assert_traded(&result);
        assert!(result.trades.iter().any(|t| t.direction == PositionSide::Long));
        assert!(result.trades.iter().any(|t| t.direction == PositionSide::Short));
        for t in &result.trades {
            let close = candles
                .iter()
                .find(|c| c.timestamp == t.entry_time)
                .unwrap()
                .close;
            let expected = match t.direction {
                PositionSide::Long => close * 1.001,
                PositionSide::Short => close * 0.999,
            };
            assert_relative_eq!(t.entry_price, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn flat_history_never_trades() {
        let result = runner().run("BTC_USDT", "Min15", &flat_candles(300, 50.0)).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.signals, 0);
        assert_relative_eq!(result.metrics.final_balance, 10_000.0);
        assert_relative_eq!(result.metrics.max_drawdown, 0.0);
    }
}

mod ordering {
    use super::*;

    #[test]
    fn gaps_are_not_errors() {
        let candles: Vec<_> = fixture_candles(400)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| i % 10 != 3)
            .map(|(_, c)| c)
            .collect();
        let result = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        assert_eq!(result.candles, candles.len());
        assert_traded(&result);
    }

    #[test]
    fn out_of_order_candle_aborts_replay() {
        let mut candles = fixture_candles(200);
        candles.swap(120, 121);
        let err = runner().run("BTC_USDT", "Min15", &candles).unwrap_err();
        match err {
            ConfluenceError::DuplicateOrOutOfOrderCandle { timestamp, latest } => {
                assert_eq!(timestamp, candles[121].timestamp);
                assert_eq!(latest, candles[120].timestamp);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_candle_aborts_replay() {
        let mut candles = fixture_candles(100);
        candles.insert(60, candles[59]);
        assert!(matches!(
            runner().run("BTC_USDT", "Min15", &candles),
            Err(ConfluenceError::DuplicateOrOutOfOrderCandle { .. })
        ));
    }
}

mod csv_source {
    use super::*;

    #[test]
    fn csv_replay_matches_in_memory_replay() {
        let dir = TempDir::new().unwrap();
        let candles = fixture_candles(600);
        write_csv(dir.path(), "BTC_USDT", "Min15", &candles);

        let source = CsvCandleSource::new(dir.path().to_path_buf());
        let loaded = source.fetch_candles("BTC_USDT", "Min15", None, None).unwrap();
        assert_eq!(loaded, candles);

        let from_csv = runner().run("BTC_USDT", "Min15", &loaded).unwrap();
        let in_memory = runner().run("BTC_USDT", "Min15", &candles).unwrap();
        assert_same_outcome(&from_csv, &in_memory);
    }

    #[test]
    fn range_filter_limits_replay() {
        let dir = TempDir::new().unwrap();
        let candles = fixture_candles(300);
        write_csv(dir.path(), "ETH_USDT", "Min15", &candles);

        let source = CsvCandleSource::new(dir.path().to_path_buf());
        let loaded = source
            .fetch_candles(
                "ETH_USDT",
                "Min15",
                Some(candles[100].timestamp),
                Some(candles[199].timestamp),
            )
            .unwrap();
        assert_eq!(loaded.len(), 100);
        assert_eq!(loaded[0], candles[100]);
        assert_eq!(loaded[99], candles[199]);
    }

    #[test]
    fn malformed_row_fails_load_instead_of_replaying() {
        let dir = TempDir::new().unwrap();
        let mut candles = fixture_candles(120);
        candles[70].high = candles[70].low - 1.0;
        write_csv(dir.path(), "BTC_USDT", "Min15", &candles);

        let source = CsvCandleSource::new(dir.path().to_path_buf());
        match source.fetch_candles("BTC_USDT", "Min15", None, None) {
            Err(ConfluenceError::DataSource { reason }) => assert!(reason.contains("line 72")),
            other => panic!("expected data source error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_data_source_error() {
        let dir = TempDir::new().unwrap();
        let source = CsvCandleSource::new(dir.path().to_path_buf());
        assert!(matches!(
            source.fetch_candles("NOPE_USDT", "Min15", None, None),
            Err(ConfluenceError::DataSource { .. })
        ));
    }
}
