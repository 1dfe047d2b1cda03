//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded with the SMA of the first
//! `signal` MACD values
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: slow - 1 + signal - 1 candles.

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if candles.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_fast = smoothing::ema(&closes, fast);
    let ema_slow = smoothing::ema(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = smoothing::smooth_defined(&macd_line, signal_period, smoothing::ema);

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match (macd_line[i], signal_line[i]) {
            (Some(line), Some(signal)) => IndicatorPoint::valid(
                candle.timestamp,
                IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            ),
            _ => IndicatorPoint::invalid(
                candle.timestamp,
                IndicatorValue::Macd {
                    line: macd_line[i].unwrap_or(0.0),
                    signal: 0.0,
                    histogram: 0.0,
                },
            ),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
