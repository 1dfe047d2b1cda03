//! Backtest performance metrics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::backtest::BacktestTrade;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    /// Fractional return on the initial balance.
    pub total_return: f64,
    pub final_balance: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    /// Largest peak-to-trough decline of the equity curve, as a fraction.
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[BacktestTrade],
        equity_curve: &[EquityPoint],
        initial_balance: f64,
        final_balance: f64,
    ) -> Self {
        let total_return = if initial_balance > 0.0 {
            (final_balance - initial_balance) / initial_balance
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            final_balance,
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            max_drawdown: compute_drawdown(equity_curve),
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
        }
    }
}

pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::PositionSide;
    use approx::assert_relative_eq;

    fn ts(i: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(i * 900, 0).unwrap()
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: ts(i as i64),
                equity,
            })
            .collect()
    }

    fn trade(pnl: f64) -> BacktestTrade {
        BacktestTrade {
            entry_time: ts(0),
            entry_price: 100.0,
            exit_time: ts(1),
            exit_price: 100.0,
            direction: PositionSide::Long,
            pnl,
        }
    }

    #[test]
    fn drawdown_empty_curve() {
        assert_eq!(compute_drawdown(&[]), 0.0);
    }

    #[test]
    fn drawdown_monotonic_curve() {
        assert_eq!(compute_drawdown(&curve(&[100.0, 110.0, 120.0])), 0.0);
    }

    #[test]
    fn drawdown_largest_decline() {
        let dd = compute_drawdown(&curve(&[100.0, 120.0, 90.0, 130.0, 117.0]));
        assert_relative_eq!(dd, 0.25);
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![trade(200.0), trade(-100.0), trade(50.0), trade(0.0)];
        let m = Metrics::compute(&trades, &curve(&[10_000.0, 10_150.0]), 10_000.0, 10_150.0);
        assert_eq!(m.total_trades, 4);
        assert_eq!(m.trades_won, 2);
        assert_eq!(m.trades_lost, 1);
        assert_relative_eq!(m.win_rate, 0.5);
        assert_relative_eq!(m.total_return, 0.015);
        assert_relative_eq!(m.profit_factor, 2.5);
        assert_relative_eq!(m.avg_win, 125.0);
        assert_relative_eq!(m.avg_loss, 100.0);
        assert_relative_eq!(m.largest_win, 200.0);
        assert_relative_eq!(m.largest_loss, 100.0);
    }

    #[test]
    fn no_trades() {
        let m = Metrics::compute(&[], &curve(&[10_000.0]), 10_000.0, 10_000.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.total_return, 0.0);
    }

    #[test]
    fn only_winners_have_infinite_profit_factor() {
        let m = Metrics::compute(&[trade(10.0)], &[], 100.0, 110.0);
        assert!(m.profit_factor.is_infinite());
    }
}
