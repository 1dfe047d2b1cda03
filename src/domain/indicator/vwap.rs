//! VWAP, cumulative over the available window.
//!
//! VWAP[i] = sum(TP * volume) / sum(volume) from the first candle of the
//! window through i. Undefined while cumulative volume is zero.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_vwap(candles: &[Candle]) -> IndicatorSeries {
    let mut pv = 0.0;
    let mut vol = 0.0;

    let values = candles
        .iter()
        .map(|candle| {
            pv += candle.typical_price() * candle.volume;
            vol += candle.volume;
            if vol > 0.0 {
                IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(pv / vol))
            } else {
                IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0))
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Vwap,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::hlc_candles;

    #[test]
    fn vwap_weights_by_volume() {
        let candles = hlc_candles(&[(10.0, 10.0, 10.0, 100.0), (20.0, 20.0, 20.0, 300.0)]);
        let series = calculate_vwap(&candles);
        assert!((series.simple_at(0).unwrap() - 10.0).abs() < 1e-12);
        assert!((series.simple_at(1).unwrap() - 17.5).abs() < 1e-12);
    }

    #[test]
    fn vwap_zero_volume_undefined() {
        let candles = hlc_candles(&[(10.0, 10.0, 10.0, 0.0), (20.0, 20.0, 20.0, 100.0)]);
        let series = calculate_vwap(&candles);
        assert!(!series.values[0].valid);
        assert!((series.simple_at(1).unwrap() - 20.0).abs() < 1e-12);
    }
}
