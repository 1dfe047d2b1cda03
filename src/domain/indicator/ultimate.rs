//! Ultimate Oscillator.
//!
//! BP = close - min(low, prev close); TR = max(high, prev close) - min(low, prev close).
//! avg_k = sum(BP) / sum(TR) over k candles for the three periods;
//! UO = 100 * (4 * avg_short + 2 * avg_medium + avg_long) / 7.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_SHORT: usize = 7;
pub const DEFAULT_MEDIUM: usize = 14;
pub const DEFAULT_LONG: usize = 28;

const SHORT_WEIGHT: f64 = 4.0;
const MEDIUM_WEIGHT: f64 = 2.0;
const LONG_WEIGHT: f64 = 1.0;

pub fn calculate_ultimate_oscillator(
    candles: &[Candle],
    short: usize,
    medium: usize,
    long: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::UltimateOscillator {
        short,
        medium,
        long,
    };
    if short == 0 || medium == 0 || long == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    // index j describes candle j + 1
    let (bp, tr): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let prev_close = w[0].close;
            let true_low = w[1].low.min(prev_close);
            let true_high = w[1].high.max(prev_close);
            (w[1].close - true_low, true_high - true_low)
        })
        .unzip();

    let average = |end: usize, period: usize| -> Option<f64> {
        if end + 1 < period {
            return None;
        }
        let bp_sum: f64 = bp[end + 1 - period..=end].iter().sum();
        let tr_sum: f64 = tr[end + 1 - period..=end].iter().sum();
        (tr_sum != 0.0).then(|| bp_sum / tr_sum)
    };

    let longest = short.max(medium).max(long);
    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let uo = (i >= longest)
                .then(|| {
                    let j = i - 1;
                    let a = average(j, short)?;
                    let b = average(j, medium)?;
                    let c = average(j, long)?;
                    Some(
                        100.0 * (SHORT_WEIGHT * a + MEDIUM_WEIGHT * b + LONG_WEIGHT * c)
                            / (SHORT_WEIGHT + MEDIUM_WEIGHT + LONG_WEIGHT),
                    )
                })
                .flatten();
            match uo {
                Some(v) => IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(v)),
                None => IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
