//! ATR (Average True Range) with Wilder smoothing.
//!
//! TR[0] = high - low; TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Seed = mean of the first n TR values, then ATR = (prev * (n-1) + TR) / n.
//! Warmup: first (n-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

/// True range per candle; the first candle has no previous close.
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i == 0 {
                candle.range()
            } else {
                candle.true_range(candles[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let smoothed = smoothing::wilder(&true_ranges(candles), period);
    let values = candles
        .iter()
        .zip(smoothed)
        .map(|(candle, atr)| match atr {
            Some(v) => IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(v)),
            None => IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::hlc_candles;

    #[test]
    fn atr_warmup() {
        let candles = hlc_candles(&[(110.0, 90.0, 100.0, 1.0); 5]);
        let series = calculate_atr(&candles, 3);
        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn atr_seed_is_average() {
        let candles = hlc_candles(&[
            (110.0, 100.0, 105.0, 1.0),
            (115.0, 105.0, 110.0, 1.0),
            (120.0, 110.0, 115.0, 1.0),
        ]);
        let series = calculate_atr(&candles, 3);
        assert!((series.simple_at(2).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let candles = hlc_candles(&[
            (110.0, 100.0, 105.0, 1.0),
            (115.0, 105.0, 110.0, 1.0),
            (120.0, 110.0, 115.0, 1.0),
            (135.0, 115.0, 120.0, 1.0),
        ]);
        let series = calculate_atr(&candles, 3);
        let expected = (10.0 * 2.0 + 20.0) / 3.0;
        assert!((series.simple_at(3).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_handles_gaps() {
        let candles = hlc_candles(&[
            (110.0, 100.0, 105.0, 1.0),
            (130.0, 120.0, 125.0, 1.0),
        ]);
        let tr = true_ranges(&candles);
        // gap up: |130 - 105| = 25 beats the 10-point range
        assert!((tr[1] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_candles() {
        let candles = hlc_candles(&[(110.0, 90.0, 100.0, 1.0); 2]);
        let series = calculate_atr(&candles, 5);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
