//! Stochastic oscillator (slow form).
//!
//! raw %K = 100 * (C - LL) / (HH - LL) over `k_period` (50 on a flat window),
//! %K = SMA(raw, k_smooth), %D = SMA(%K, d_period).

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing::{self, highest, lowest};
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_K: usize = 14;
pub const DEFAULT_K_SMOOTH: usize = 3;
pub const DEFAULT_D: usize = 3;

pub fn calculate_stochastic(
    candles: &[Candle],
    k_period: usize,
    k_smooth: usize,
    d_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic {
        k_period,
        k_smooth,
        d_period,
    };
    if k_period == 0 || k_smooth == 0 || d_period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let raw: Vec<Option<f64>> = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i + 1 < k_period {
                return None;
            }
            let hh = highest(&highs, i, k_period);
            let ll = lowest(&lows, i, k_period);
            Some(if hh == ll {
                50.0
            } else {
                100.0 * (candle.close - ll) / (hh - ll)
            })
        })
        .collect();
    let k = smoothing::smooth_defined(&raw, k_smooth, smoothing::sma);
    let d = smoothing::smooth_defined(&k, d_period, smoothing::sma);

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match (k[i], d[i]) {
            (Some(k), Some(d)) => {
                IndicatorPoint::valid(candle.timestamp, IndicatorValue::Stochastic { k, d })
            }
            _ => IndicatorPoint::invalid(
                candle.timestamp,
                IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
            ),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
