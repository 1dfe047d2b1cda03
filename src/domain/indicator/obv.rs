//! OBV (On-Balance Volume) indicator implementation.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_MOMENTUM_LOOKBACK: usize = 5;

/// Calculate OBV (On-Balance Volume) indicator.
///
/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period; all candles are valid. The value is relative to the
/// start of the window, so only differences are meaningful.
pub fn calculate_obv(candles: &[Candle]) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());
    let mut obv = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i == 0 {
            obv = candle.volume;
        } else if candle.close > candles[i - 1].close {
            obv += candle.volume;
        } else if candle.close < candles[i - 1].close {
            obv -= candle.volume;
        }
        values.push(IndicatorPoint::valid(
            candle.timestamp,
            IndicatorValue::simple(obv),
        ));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Obv,
        values,
    }
}

/// OBV[i] - OBV[i - lookback]. Positive when volume flows in.
pub fn calculate_obv_momentum(candles: &[Candle], lookback: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::ObvMomentum(lookback);
    if lookback == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let obv = calculate_obv(candles);
    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match (obv.simple_at(i), i.checked_sub(lookback)) {
            (Some(current), Some(j)) => {
                let prior = obv.simple_at(j).unwrap_or(current);
                IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(current - prior))
            }
            _ => IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0)),
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

    fn candles(rows: &[(f64, f64)]) -> Vec<Candle> {
        let rows: Vec<_> = rows.iter().map(|&(c, v)| (c, c, c, v)).collect();
        hlc_candles(&rows)
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let series = calculate_obv(&candles(&[
            (10.0, 100.0),
            (11.0, 200.0),
            (10.5, 50.0),
            (10.5, 75.0),
        ]));
        let obv: Vec<f64> = (0..4).map(|i| series.simple_at(i).unwrap()).collect();
        assert_eq!(obv, vec![100.0, 300.0, 250.0, 250.0]);
    }

    #[test]
    fn obv_all_valid() {
        let series = calculate_obv(&candles(&[(1.0, 1.0), (2.0, 1.0)]));
        assert!(series.values.iter().all(|p| p.valid));
    }

    #[test]
    fn obv_empty() {
        assert!(calculate_obv(&[]).values.is_empty());
    }

    #[test]
    fn obv_momentum_compares_lookback() {
        let rows: Vec<(f64, f64)> = (0..8).map(|i| (10.0 + i as f64, 10.0)).collect();
        let series = calculate_obv_momentum(&candles(&rows), 5);
        assert!(!series.values[4].valid);
        // five rising candles of volume 10 since index 0
        assert!((series.simple_at(5).unwrap() - 50.0).abs() < 1e-12);
    }
}
