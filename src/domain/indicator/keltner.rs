//! Keltner Channels.
//!
//! Middle = EMA(n) of close; band = EMA(n) of true range (an EMA-smoothed ATR);
//! upper/lower = middle ± mult * band.

use crate::domain::candle::Candle;
use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::smoothing;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_keltner(candles: &[Candle], period: usize, mult_x100: u32) -> IndicatorSeries {
    let indicator_type = IndicatorType::Keltner { period, mult_x100 };
    if period == 0 || candles.is_empty() {
        return IndicatorSeries::empty(indicator_type);
    }

    let mult = mult_x100 as f64 / 100.0;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let middle = smoothing::ema(&closes, period);
    let band = smoothing::ema(&true_ranges(candles), period);

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match (middle[i], band[i]) {
            (Some(middle), Some(band)) => IndicatorPoint::valid(
                candle.timestamp,
                IndicatorValue::Band {
                    upper: middle + mult * band,
                    middle,
                    lower: middle - mult * band,
                },
            ),
            _ => IndicatorPoint::invalid(
                candle.timestamp,
                IndicatorValue::Band {
                    upper: 0.0,
                    middle: 0.0,
                    lower: 0.0,
                },
            ),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::hlc_candles;

    #[test]
    fn keltner_constant_range() {
        let candles = hlc_candles(&[(101.0, 99.0, 100.0, 1.0); 25]);
        let series = calculate_keltner(&candles, 20, 200);
        assert!(!series.values[18].valid);
        match series.valid_at(24) {
            Some(IndicatorValue::Band {
                upper,
                middle,
                lower,
            }) => {
                assert!((middle - 100.0).abs() < 1e-9);
                assert!((upper - 104.0).abs() < 1e-9);
                assert!((lower - 96.0).abs() < 1e-9);
            }
            other => panic!("expected band, got {other:?}"),
        }
    }
}
