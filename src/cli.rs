//! CLI definition and dispatch.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvCandleSource;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::mexc_ws::MexcFeedConnector;
use crate::adapters::orchestrator::{CallbackScope, SignalCallback, StreamOrchestrator};
use crate::domain::backtest::{BacktestResult, BacktestRunner};
use crate::domain::config::{
    DEFAULT_INTERVAL, load_backtest_config, load_pipeline_config, load_stream_config,
};
use crate::domain::config_validation::{
    validate_backtest_config, validate_scorer_config, validate_stream_config,
};
use crate::domain::error::ConfluenceError;
use crate::domain::signal::Direction;
use crate::ports::candle_source::CandleSource;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "confluence", about = "Indicator confluence signals for crypto futures")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical candles through the signal pipeline
    Backtest {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory holding `{symbol}_{interval}.csv` files
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(short, long)]
        symbol: String,
        #[arg(short, long)]
        interval: Option<String>,
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Print the full result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Stream live signals until interrupted
    Stream {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Symbols to stream; overrides [stream] symbols
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with historical data
    ListSymbols {
        #[arg(short, long)]
        data_dir: PathBuf,
        #[arg(short, long)]
        interval: Option<String>,
    },
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbol,
            interval,
            start,
            end,
            json,
        } => run_backtest(
            config.as_deref(),
            &data_dir,
            &symbol,
            interval.as_deref(),
            start.as_deref(),
            end.as_deref(),
            json,
        ),
        Command::Stream { config, symbols } => run_stream(config.as_deref(), symbols),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir, interval } => {
            run_list_symbols(&data_dir, interval.as_deref())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load an INI file, or an empty configuration (all defaults) when no path
/// is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, ConfluenceError> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            FileConfigAdapter::from_file(p)
        }
        None => FileConfigAdapter::from_string(""),
    }
}

/// Parse a YYYY-MM-DD day bound. `end_of_day` selects the last second of the
/// day instead of midnight.
pub fn parse_day(raw: &str, key: &str, end_of_day: bool) -> Result<DateTime<Utc>, ConfluenceError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ConfluenceError::invalid("cli", key, "invalid date format (expected YYYY-MM-DD)")
    })?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| ConfluenceError::invalid("cli", key, "date out of range"))
}

fn run_backtest(
    config_path: Option<&Path>,
    data_dir: &Path,
    symbol: &str,
    interval: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    json: bool,
) -> Result<(), ConfluenceError> {
    let config = load_config(config_path)?;
    let pipeline = load_pipeline_config(&config)?;
    let backtest = load_backtest_config(&config)?;
    let interval = interval
        .map(str::to_string)
        .or_else(|| config.get_string("stream", "interval"))
        .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());

    let start = start.map(|s| parse_day(s, "start", false)).transpose()?;
    let end = end.map(|s| parse_day(s, "end", true)).transpose()?;

    let source = CsvCandleSource::new(data_dir.to_path_buf());
    let candles = source.fetch_candles(symbol, &interval, start, end)?;
    if candles.len() < pipeline.min_ready {
        return Err(ConfluenceError::InsufficientHistory {
            have: candles.len(),
            need: pipeline.min_ready,
        });
    }

    eprintln!(
        "Running backtest: {} {} over {} candles",
        symbol,
        interval,
        candles.len()
    );
    let result = BacktestRunner::new(pipeline, backtest).run(symbol, &interval, &candles)?;

    if json {
        let body = serde_json::to_string_pretty(&result).map_err(|e| ConfluenceError::DataSource {
            reason: format!("failed to encode result: {e}"),
        })?;
        println!("{body}");
    } else {
        print_summary(&result, backtest.initial_balance);
    }
    Ok(())
}

fn print_summary(result: &BacktestResult, initial_balance: f64) {
    let m = &result.metrics;
    eprintln!("\n=== Backtest Results: {} {} ===", result.symbol, result.interval);
    eprintln!("Candles:          {}", result.candles);
    eprintln!("Signals:          {}", result.signals);
    eprintln!("Initial Balance:  {:.2}", initial_balance);
    eprintln!("Final Balance:    {:.2}", m.final_balance);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);

    if !result.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &result.trades {
            let pnl_sign = if t.pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {:?} {} @ {:.4} -> {} @ {:.4}  {}{:.2}",
                t.direction,
                t.entry_time.format("%Y-%m-%d %H:%M"),
                t.entry_price,
                t.exit_time.format("%Y-%m-%d %H:%M"),
                t.exit_price,
                pnl_sign,
                t.pnl,
            );
        }
    }
}

fn run_stream(config_path: Option<&Path>, symbols: Vec<String>) -> Result<(), ConfluenceError> {
    let config = load_config(config_path)?;
    let mut stream_config = load_stream_config(&config)?;
    if !symbols.is_empty() {
        stream_config.symbols = symbols;
    }
    if stream_config.symbols.is_empty() {
        return Err(ConfluenceError::ConfigMissing {
            section: "stream".into(),
            key: "symbols".into(),
        });
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let connector = Arc::new(MexcFeedConnector::new(stream_config.url.clone()));
        let orchestrator = StreamOrchestrator::new(connector, stream_config);

        orchestrator.register(
            CallbackScope::Global,
            SignalCallback::blocking(|event| {
                let line = event.to_json().map_err(|e| e.to_string())?;
                println!("{line}");
                Ok(())
            }),
        );
        orchestrator.register(
            CallbackScope::Global,
            SignalCallback::blocking(|event| {
                if event.direction != Direction::Hold {
                    eprintln!(
                        "{} {} {} @ {:.4} ({})",
                        event.timestamp.format("%Y-%m-%d %H:%M"),
                        event.symbol,
                        event.direction,
                        event.price,
                        event.reason,
                    );
                }
                Ok(())
            }),
        );

        orchestrator.start_configured();
        eprintln!(
            "Streaming {} (Ctrl-C to stop)",
            orchestrator.symbols().join(", ")
        );

        tokio::signal::ctrl_c().await?;
        eprintln!("\nStopping streams...");
        orchestrator.shutdown().await;
        Ok(())
    })
}

fn run_validate(config_path: &Path) -> Result<(), ConfluenceError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;

    validate_stream_config(&config)?;
    validate_scorer_config(&config)?;
    validate_backtest_config(&config)?;

    let stream = load_stream_config(&config)?;
    let backtest = load_backtest_config(&config)?;

    eprintln!("\n[stream]");
    eprintln!("  url:       {}", stream.url);
    eprintln!("  interval:  {}", stream.interval);
    eprintln!("  symbols:   {}", stream.symbols.join(", "));
    eprintln!(
        "  buffer:    {} candles, ready at {}",
        stream.pipeline.capacity, stream.pipeline.min_ready
    );
    eprintln!(
        "  reconnect: {:?} .. {:?}, {} attempts",
        stream.reconnect.base, stream.reconnect.max, stream.reconnect.max_attempts
    );
    let scorer = &stream.pipeline.scorer;
    eprintln!("\n[scorer]");
    eprintln!(
        "  thresholds: buy > {}, sell < {}",
        scorer.buy_threshold, scorer.sell_threshold
    );
    eprintln!("  price action confirmation: {}", scorer.use_price_action);
    eprintln!("\n[backtest]");
    eprintln!("  initial balance: {}", backtest.initial_balance);
    eprintln!("  fee:             {}", backtest.transaction_fee);

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(data_dir: &Path, interval: Option<&str>) -> Result<(), ConfluenceError> {
    let interval = interval.unwrap_or(DEFAULT_INTERVAL);
    let source = CsvCandleSource::new(data_dir.to_path_buf());
    let symbols = source.list_symbols(interval)?;
    if symbols.is_empty() {
        eprintln!("No symbols found for interval {}", interval);
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_day_bounds() {
        let start = parse_day("2024-03-01", "start", false).unwrap();
        let end = parse_day("2024-03-01", "end", true).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-01T23:59:59+00:00");
    }

    #[test]
    fn parse_day_rejects_garbage() {
        let err = parse_day("03/01/2024", "start", false).unwrap_err();
        assert!(matches!(err, ConfluenceError::ConfigInvalid { ref key, .. } if key == "start"));
    }

    #[test]
    fn cli_parses_backtest_args() {
        let cli = Cli::try_parse_from([
            "confluence",
            "backtest",
            "--data-dir",
            "data",
            "--symbol",
            "BTC_USDT",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                symbol,
                json,
                interval,
                ..
            } => {
                assert_eq!(symbol, "BTC_USDT");
                assert!(json);
                assert!(interval.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_splits_stream_symbols() {
        let cli =
            Cli::try_parse_from(["confluence", "stream", "--symbols", "BTC_USDT,ETH_USDT"]).unwrap();
        match cli.command {
            Command::Stream { symbols, .. } => assert_eq!(symbols, vec!["BTC_USDT", "ETH_USDT"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn missing_config_file_maps_to_io_exit() {
        let err = load_config(Some(Path::new("/nonexistent/confluence.ini"))).unwrap_err();
        assert!(matches!(err, ConfluenceError::Io(_)));
    }
}
