//! MFI (Money Flow Index).
//!
//! Raw money flow = TP * volume, classed positive when TP rose from the prior
//! candle and negative when it fell. Over the last n changes:
//! MFI = 100 - 100 / (1 + positive / negative); negative flow of zero gives 100.
//!
//! Warmup: first n candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_mfi(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Mfi(period));
    }

    let typical: Vec<f64> = candles.iter().map(|c| c.typical_price()).collect();
    let flows: Vec<(f64, f64)> = (1..candles.len())
        .map(|i| {
            let flow = typical[i] * candles[i].volume;
            if typical[i] > typical[i - 1] {
                (flow, 0.0)
            } else if typical[i] < typical[i - 1] {
                (0.0, flow)
            } else {
                (0.0, 0.0)
            }
        })
        .collect();

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i < period {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0));
            }
            let (positive, negative) = flows[i - period..i]
                .iter()
                .fold((0.0, 0.0), |(p, n), &(fp, fn_)| (p + fp, n + fn_));
            let mfi = if negative == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + positive / negative)
            };
            IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(mfi))
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Mfi(period),
        values,
    }
}
