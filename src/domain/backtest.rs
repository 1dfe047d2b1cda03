//! Deterministic historical replay.
//!
//! Candles are fed one at a time through the same buffer, engine and scorer
//! used for live streams. Every non-HOLD signal that disagrees with the held
//! position closes it and opens the opposite side at the candle close. A
//! single notional balance is simulated:
//!
//! - long entry fills at close * (1 + fee), short entry at close * (1 - fee)
//! - long value = balance * price / entry
//! - short value = balance * (2 - price / entry)
//!
//! Equity is marked to market on every candle before signals are acted on.
//! Any open position is closed at the final close.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::candle::Candle;
use crate::domain::error::ConfluenceError;
use crate::domain::metrics::{EquityPoint, Metrics};
use crate::domain::pipeline::{PipelineConfig, StreamState};
use crate::domain::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    pub transaction_fee: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_balance: 10_000.0,
            transaction_fee: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestTrade {
    pub entry_time: DateTime<Utc>,
    /// Fill price including the transaction fee.
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub direction: PositionSide,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub interval: String,
    pub candles: usize,
    /// Non-HOLD signals produced during replay.
    pub signals: usize,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    side: PositionSide,
    entry_time: DateTime<Utc>,
    entry_price: f64,
}

impl OpenPosition {
    fn value(&self, balance: f64, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => balance * (price / self.entry_price),
            PositionSide::Short => balance * (2.0 - price / self.entry_price),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BacktestRunner {
    pipeline: PipelineConfig,
    config: BacktestConfig,
}

impl BacktestRunner {
    pub fn new(pipeline: PipelineConfig, config: BacktestConfig) -> Self {
        BacktestRunner { pipeline, config }
    }

    pub fn run(
        &self,
        symbol: &str,
        interval: &str,
        candles: &[Candle],
    ) -> Result<BacktestResult, ConfluenceError> {
        let mut state = StreamState::new(symbol, interval, &self.pipeline);
        let mut balance = self.config.initial_balance;
        let mut position: Option<OpenPosition> = None;
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len());
        let mut signals = 0usize;

        for candle in candles {
            if !state.append(*candle).is_accepted() {
                let latest = state
                    .buffer()
                    .latest_timestamp()
                    .unwrap_or(candle.timestamp);
                return Err(ConfluenceError::DuplicateOrOutOfOrderCandle {
                    timestamp: candle.timestamp,
                    latest,
                });
            }

            let equity = position.map_or(balance, |p| p.value(balance, candle.close));
            equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                equity,
            });

            let Some(event) = state.evaluate() else {
                continue;
            };
            let side = match event.direction {
                Direction::Buy => PositionSide::Long,
                Direction::Sell => PositionSide::Short,
                Direction::Hold => continue,
            };
            signals += 1;

            if position.is_some_and(|p| p.side == side) {
                continue;
            }
            if let Some(open) = position.take() {
                let trade = close_position(open, balance, candle);
                balance += trade.pnl;
                trades.push(trade);
            }
            let entry_price = match side {
                PositionSide::Long => candle.close * (1.0 + self.config.transaction_fee),
                PositionSide::Short => candle.close * (1.0 - self.config.transaction_fee),
            };
            debug!(%symbol, timestamp = %candle.timestamp, ?side, entry_price, "position opened");
            position = Some(OpenPosition {
                side,
                entry_time: candle.timestamp,
                entry_price,
            });
        }

        if let (Some(open), Some(last)) = (position.take(), candles.last()) {
            let trade = close_position(open, balance, last);
            balance += trade.pnl;
            trades.push(trade);
        }

        let metrics = Metrics::compute(
            &trades,
            &equity_curve,
            self.config.initial_balance,
            balance,
        );
        info!(
            %symbol,
            candles = candles.len(),
            signals,
            trades = trades.len(),
            total_return = metrics.total_return,
            "backtest complete"
        );

        Ok(BacktestResult {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            candles: candles.len(),
            signals,
            trades,
            equity_curve,
            metrics,
        })
    }
}

fn close_position(open: OpenPosition, balance: f64, candle: &Candle) -> BacktestTrade {
    BacktestTrade {
        entry_time: open.entry_time,
        entry_price: open.entry_price,
        exit_time: candle.timestamp,
        exit_price: candle.close,
        direction: open.side,
        pnl: open.value(balance, candle.close) - balance,
    }
}
