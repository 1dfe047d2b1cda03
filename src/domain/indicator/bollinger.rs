//! Bollinger Bands indicator.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100,
    };
    if period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let warmup = period - 1;
    let mult = stddev_mult_x100 as f64 / 100.0;
    let mut values = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        if i < warmup {
            values.push(IndicatorPoint::invalid(
                candle.timestamp,
                IndicatorValue::Band {
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            ));
            continue;
        }

        let window = &candles[i + 1 - period..=i];
        let middle: f64 = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
        let variance: f64 = window
            .iter()
            .map(|c| {
                let diff = c.close - middle;
                diff * diff
            })
            .sum::<f64>()
            / period as f64;
        let stddev = variance.sqrt();

        values.push(IndicatorPoint::valid(
            candle.timestamp,
            IndicatorValue::Band {
                upper: middle + mult * stddev,
                middle,
                lower: middle - mult * stddev,
            },
        ));
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
