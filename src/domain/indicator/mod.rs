//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as map key)
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every `calculate_*` function is a pure function of the candle slice and
//! returns one point per candle, flagged invalid until its lookback is met.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod ichimoku;
pub mod keltner;
pub mod macd;
pub mod mfi;
pub mod obv;
pub mod psar;
pub mod roc;
pub mod rsi;
pub mod smoothing;
pub mod stochastic;
pub mod ultimate;
pub mod vwap;
pub mod williams_r;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use bollinger::calculate_bollinger;
pub use cci::calculate_cci;
pub use ema::calculate_ema;
pub use ichimoku::calculate_ichimoku;
pub use keltner::calculate_keltner;
pub use macd::calculate_macd;
pub use mfi::calculate_mfi;
pub use obv::{calculate_obv, calculate_obv_momentum};
pub use psar::calculate_psar;
pub use roc::{calculate_roc, calculate_volume_roc};
pub use rsi::calculate_rsi;
pub use stochastic::calculate_stochastic;
pub use ultimate::calculate_ultimate_oscillator;
pub use vwap::calculate_vwap;
pub use williams_r::calculate_williams_r;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::domain::candle::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn valid(timestamp: DateTime<Utc>, value: IndicatorValue) -> Self {
        IndicatorPoint {
            timestamp,
            valid: true,
            value,
        }
    }

    pub fn invalid(timestamp: DateTime<Utc>, value: IndicatorValue) -> Self {
        IndicatorPoint {
            timestamp,
            valid: false,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorValue {
    Simple {
        value: f64,
    },
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Band {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Psar {
        sar: f64,
        long: bool,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
    Ichimoku {
        conversion: f64,
        base: f64,
        span_a: f64,
        span_b: f64,
    },
}

impl IndicatorValue {
    pub fn simple(value: f64) -> Self {
        IndicatorValue::Simple { value }
    }

    /// The scalar reading of single-valued indicators.
    pub fn as_simple(&self) -> Option<f64> {
        match self {
            IndicatorValue::Simple { value } => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IndicatorType {
    Ema(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Psar {
        step_x1000: u32,
        max_x1000: u32,
    },
    Adx(usize),
    Ichimoku {
        conversion: usize,
        base: usize,
        span_b: usize,
    },
    Rsi(usize),
    WilliamsR(usize),
    Cci(usize),
    Roc(usize),
    Stochastic {
        k_period: usize,
        k_smooth: usize,
        d_period: usize,
    },
    Vwap,
    Obv,
    ObvMomentum(usize),
    VolumeRoc(usize),
    Mfi(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Atr(usize),
    Keltner {
        period: usize,
        mult_x100: u32,
    },
    UltimateOscillator {
        short: usize,
        medium: usize,
        long: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at `index` if that point is valid.
    pub fn valid_at(&self, index: usize) -> Option<IndicatorValue> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    pub fn simple_at(&self, index: usize) -> Option<f64> {
        self.valid_at(index).and_then(|v| v.as_simple())
    }

    pub fn last_valid(&self) -> Option<IndicatorValue> {
        self.values.len().checked_sub(1).and_then(|i| self.valid_at(i))
    }
}

/// Compute the series for `indicator_type` over `candles`.
pub fn calculate(indicator_type: IndicatorType, candles: &[Candle]) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Ema(period) => calculate_ema(candles, period),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(candles, fast, slow, signal),
        IndicatorType::Psar {
            step_x1000,
            max_x1000,
        } => calculate_psar(candles, step_x1000, max_x1000),
        IndicatorType::Adx(period) => calculate_adx(candles, period),
        IndicatorType::Ichimoku {
            conversion,
            base,
            span_b,
        } => calculate_ichimoku(candles, conversion, base, span_b),
        IndicatorType::Rsi(period) => calculate_rsi(candles, period),
        IndicatorType::WilliamsR(period) => calculate_williams_r(candles, period),
        IndicatorType::Cci(period) => calculate_cci(candles, period),
        IndicatorType::Roc(period) => calculate_roc(candles, period),
        IndicatorType::Stochastic {
            k_period,
            k_smooth,
            d_period,
        } => calculate_stochastic(candles, k_period, k_smooth, d_period),
        IndicatorType::Vwap => calculate_vwap(candles),
        IndicatorType::Obv => calculate_obv(candles),
        IndicatorType::ObvMomentum(lookback) => calculate_obv_momentum(candles, lookback),
        IndicatorType::VolumeRoc(period) => calculate_volume_roc(candles, period),
        IndicatorType::Mfi(period) => calculate_mfi(candles, period),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(candles, period, stddev_mult_x100),
        IndicatorType::Atr(period) => calculate_atr(candles, period),
        IndicatorType::Keltner { period, mult_x100 } => {
            calculate_keltner(candles, period, mult_x100)
        }
        IndicatorType::UltimateOscillator {
            short,
            medium,
            long,
        } => calculate_ultimate_oscillator(candles, short, medium, long),
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Psar {
                step_x1000,
                max_x1000,
            } => write!(
                f,
                "PSAR({},{})",
                *step_x1000 as f64 / 1000.0,
                *max_x1000 as f64 / 1000.0
            ),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Ichimoku {
                conversion,
                base,
                span_b,
            } => write!(f, "ICHIMOKU({},{},{})", conversion, base, span_b),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::WilliamsR(period) => write!(f, "WILLR({})", period),
            IndicatorType::Cci(period) => write!(f, "CCI({})", period),
            IndicatorType::Roc(period) => write!(f, "ROC({})", period),
            IndicatorType::Stochastic {
                k_period,
                k_smooth,
                d_period,
            } => write!(f, "STOCH({},{},{})", k_period, k_smooth, d_period),
            IndicatorType::Vwap => write!(f, "VWAP"),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::ObvMomentum(lookback) => write!(f, "OBV_MOM({})", lookback),
            IndicatorType::VolumeRoc(period) => write!(f, "VOL_ROC({})", period),
            IndicatorType::Mfi(period) => write!(f, "MFI({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Keltner { period, mult_x100 } => {
                write!(f, "KELTNER({},{})", period, *mult_x100 as f64 / 100.0)
            }
            IndicatorType::UltimateOscillator {
                short,
                medium,
                long,
            } => write!(f, "UO({},{},{})", short, medium, long),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_ema() {
        assert_eq!(IndicatorType::Ema(20).to_string(), "EMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn indicator_type_display_psar() {
        let psar = IndicatorType::Psar {
            step_x1000: 20,
            max_x1000: 200,
        };
        assert_eq!(psar.to_string(), "PSAR(0.02,0.2)");
    }

    #[test]
    fn indicator_type_ordering_is_stable() {
        use std::collections::BTreeMap;

        let mut map = BTreeMap::new();
        map.insert(IndicatorType::Rsi(14), "rsi");
        map.insert(IndicatorType::Ema(50), "ema50");
        map.insert(IndicatorType::Ema(20), "ema20");

        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                IndicatorType::Ema(20),
                IndicatorType::Ema(50),
                IndicatorType::Rsi(14)
            ]
        );
    }

    #[test]
    fn series_valid_at_skips_warmup() {
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Rsi(14),
            values: vec![
                IndicatorPoint::invalid(ts, IndicatorValue::simple(0.0)),
                IndicatorPoint::valid(ts, IndicatorValue::simple(55.0)),
            ],
        };
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(55.0));
        assert_eq!(series.simple_at(2), None);
        assert_eq!(series.last_valid(), Some(IndicatorValue::simple(55.0)));
    }
}
