//! ADX (Average Directional Index) with +DI/-DI.
//!
//! +DM = up move if it exceeds the down move and is positive, else 0 (mirror
//! for -DM). TR, +DM and -DM are Wilder-smoothed over n; DI = 100 * DM / TR;
//! DX = 100 * |+DI - -DI| / (+DI + -DI); ADX = Wilder average of DX.
//!
//! Warmup: DX first exists at candle n, ADX at candle 2n - 1.

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_adx(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Adx(period));
    }

    let mut tr = Vec::with_capacity(candles.len());
    let mut plus_dm = Vec::with_capacity(candles.len());
    let mut minus_dm = Vec::with_capacity(candles.len());
    for w in candles.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        let up = curr.high - prev.high;
        let down = prev.low - curr.low;
        tr.push(curr.true_range(prev.close));
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
    }

    let s_tr = smoothing::wilder(&tr, period);
    let s_plus = smoothing::wilder(&plus_dm, period);
    let s_minus = smoothing::wilder(&minus_dm, period);

    let di: Vec<Option<(f64, f64)>> = (0..tr.len())
        .map(|j| {
            let (t, p, m) = (s_tr[j]?, s_plus[j]?, s_minus[j]?);
            if t == 0.0 {
                Some((0.0, 0.0))
            } else {
                Some((100.0 * p / t, 100.0 * m / t))
            }
        })
        .collect();
    let dx: Vec<Option<f64>> = di
        .iter()
        .map(|d| {
            d.map(|(p, m)| {
                if p + m == 0.0 {
                    0.0
                } else {
                    100.0 * (p - m).abs() / (p + m)
                }
            })
        })
        .collect();
    let adx = smoothing::smooth_defined(&dx, period, smoothing::wilder);

    let mut values = Vec::with_capacity(candles.len());
    values.push(IndicatorPoint::invalid(
        candles[0].timestamp,
        IndicatorValue::Adx {
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
        },
    ));
    for (j, candle) in candles.iter().enumerate().skip(1) {
        let point = match (adx[j - 1], di[j - 1]) {
            (Some(adx), Some((plus_di, minus_di))) => IndicatorPoint::valid(
                candle.timestamp,
                IndicatorValue::Adx {
                    adx,
                    plus_di,
                    minus_di,
                },
            ),
            (_, di) => {
                let (plus_di, minus_di) = di.unwrap_or((0.0, 0.0));
                IndicatorPoint::invalid(
                    candle.timestamp,
                    IndicatorValue::Adx {
                        adx: 0.0,
                        plus_di,
                        minus_di,
                    },
                )
            }
        };
        values.push(point);
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
