//! Parabolic SAR (stop and reverse).
//!
//! Initial trend comes from the directional movement of the first two candles:
//! falling when the low dropped more than the high rose. The acceleration
//! factor starts at `step`, grows by `step` on each new extreme point and is
//! capped at `max`. The SAR may not move inside the prior two candles' range.
//!
//! Warmup: the first candle is invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_STEP_X1000: u32 = 20;
pub const DEFAULT_MAX_X1000: u32 = 200;

pub fn calculate_psar(candles: &[Candle], step_x1000: u32, max_x1000: u32) -> IndicatorSeries {
    let indicator_type = IndicatorType::Psar {
        step_x1000,
        max_x1000,
    };
    if candles.is_empty() || step_x1000 == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let step = step_x1000 as f64 / 1000.0;
    let max_af = max_x1000 as f64 / 1000.0;
    let mut values = Vec::with_capacity(candles.len());
    values.push(IndicatorPoint::invalid(
        candles[0].timestamp,
        IndicatorValue::Psar {
            sar: 0.0,
            long: true,
        },
    ));
    if candles.len() < 2 {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let up_move = candles[1].high - candles[0].high;
    let down_move = candles[0].low - candles[1].low;
    let falling = down_move > up_move && down_move > 0.0;

    let mut long = !falling;
    let mut sar = if long { candles[0].low } else { candles[0].high };
    let mut ep = if long { candles[0].high } else { candles[0].low };
    let mut af = step;

    for i in 1..candles.len() {
        let candle = &candles[i];
        let prior_low = if i >= 2 {
            candles[i - 1].low.min(candles[i - 2].low)
        } else {
            candles[i - 1].low
        };
        let prior_high = if i >= 2 {
            candles[i - 1].high.max(candles[i - 2].high)
        } else {
            candles[i - 1].high
        };

        sar += af * (ep - sar);

        if long {
            sar = sar.min(prior_low);
            if candle.low < sar {
                long = false;
                sar = ep;
                ep = candle.low;
                af = step;
            } else if candle.high > ep {
                ep = candle.high;
                af = (af + step).min(max_af);
            }
        } else {
            sar = sar.max(prior_high);
            if candle.high > sar {
                long = true;
                sar = ep;
                ep = candle.high;
                af = step;
            } else if candle.low < ep {
                ep = candle.low;
                af = (af + step).min(max_af);
            }
        }

        values.push(IndicatorPoint::valid(
            candle.timestamp,
            IndicatorValue::Psar { sar, long },
        ));
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
