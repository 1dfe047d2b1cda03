//! Ichimoku cloud.
//!
//! conversion = midpoint of the `conversion`-period high/low range,
//! base = midpoint of the `base`-period range, span A = (conversion + base) / 2,
//! span B = midpoint of the `span_b`-period range. Spans are displaced forward
//! by `base` candles, so the cloud reported at candle i was computed at i - base.

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing::{highest, lowest};
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_CONVERSION: usize = 9;
pub const DEFAULT_BASE: usize = 26;
pub const DEFAULT_SPAN_B: usize = 52;

fn midpoints(highs: &[f64], lows: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..highs.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                Some((highest(highs, i, period) + lowest(lows, i, period)) / 2.0)
            }
        })
        .collect()
}

pub fn calculate_ichimoku(
    candles: &[Candle],
    conversion: usize,
    base: usize,
    span_b: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ichimoku {
        conversion,
        base,
        span_b,
    };
    if conversion == 0 || base == 0 || span_b == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let conv = midpoints(&highs, &lows, conversion);
    let base_line = midpoints(&highs, &lows, base);
    let span_b_raw = midpoints(&highs, &lows, span_b);

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let displaced = i.checked_sub(base);
            let computed = (|| {
                let d = displaced?;
                let span_a = (conv[d]? + base_line[d]?) / 2.0;
                Some(IndicatorValue::Ichimoku {
                    conversion: conv[i]?,
                    base: base_line[i]?,
                    span_a,
                    span_b: span_b_raw[d]?,
                })
            })();
            match computed {
                Some(value) => IndicatorPoint::valid(candle.timestamp, value),
                None => IndicatorPoint::invalid(
                    candle.timestamp,
                    IndicatorValue::Ichimoku {
                        conversion: conv[i].unwrap_or(0.0),
                        base: base_line[i].unwrap_or(0.0),
                        span_a: 0.0,
                        span_b: 0.0,
                    },
                ),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
