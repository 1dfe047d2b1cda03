//! Williams %R.
//!
//! %R = (highest high - close) / (highest high - lowest low) * -100 over n
//! candles, ranging from -100 (at the low) to 0 (at the high). Undefined when
//! the window has no range.

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing::{highest, lowest};
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_williams_r(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::WilliamsR(period));
    }

    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i + 1 < period {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0));
            }
            let hh = highest(&highs, i, period);
            let ll = lowest(&lows, i, period);
            if hh == ll {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0));
            }
            let r = (hh - candle.close) / (hh - ll) * -100.0;
            IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(r))
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::WilliamsR(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::hlc_candles;

    #[test]
    fn williams_r_at_high_is_zero() {
        let candles = hlc_candles(&[(10.0, 5.0, 6.0, 1.0), (12.0, 8.0, 12.0, 1.0)]);
        let series = calculate_williams_r(&candles, 2);
        assert!(series.simple_at(1).unwrap().abs() < 1e-12);
    }

    #[test]
    fn williams_r_at_low_is_minus_hundred() {
        let candles = hlc_candles(&[(10.0, 5.0, 6.0, 1.0), (9.0, 4.0, 4.0, 1.0)]);
        let series = calculate_williams_r(&candles, 2);
        assert!((series.simple_at(1).unwrap() + 100.0).abs() < 1e-12);
    }

    #[test]
    fn williams_r_flat_window_undefined() {
        let candles = hlc_candles(&[(5.0, 5.0, 5.0, 1.0); 3]);
        let series = calculate_williams_r(&candles, 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn williams_r_warmup() {
        let candles = hlc_candles(&[(10.0, 5.0, 6.0, 1.0); 3]);
        let series = calculate_williams_r(&candles, 3);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }
}
