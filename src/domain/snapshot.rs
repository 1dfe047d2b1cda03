//! Indicator snapshots: every indicator's latest defined value for a window.
//!
//! The engine is a pure function of the window. Series are recomputed from
//! scratch on every call, so identical windows always produce identical
//! snapshots regardless of what was computed before.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::indicator::{
    self, IndicatorSeries, IndicatorType, IndicatorValue, adx, atr, bollinger, cci, ichimoku,
    keltner, macd, mfi, obv, psar, roc, rsi, stochastic, ultimate, williams_r,
};
use crate::domain::price_action::{self, PriceAction};

pub const EMA_SHORT: usize = 20;
pub const EMA_MEDIUM: usize = 50;
pub const EMA_LONG: usize = 200;

/// The parameterised indicators the engine computes, one key per role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSet {
    pub ema_short: IndicatorType,
    pub ema_medium: IndicatorType,
    pub ema_long: IndicatorType,
    pub macd: IndicatorType,
    pub psar: IndicatorType,
    pub adx: IndicatorType,
    pub ichimoku: IndicatorType,
    pub rsi: IndicatorType,
    pub williams_r: IndicatorType,
    pub cci: IndicatorType,
    pub roc: IndicatorType,
    pub stochastic: IndicatorType,
    pub vwap: IndicatorType,
    pub obv: IndicatorType,
    pub obv_momentum: IndicatorType,
    pub volume_roc: IndicatorType,
    pub mfi: IndicatorType,
    pub bollinger: IndicatorType,
    pub atr: IndicatorType,
    pub keltner: IndicatorType,
    pub ultimate: IndicatorType,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        IndicatorSet {
            ema_short: IndicatorType::Ema(EMA_SHORT),
            ema_medium: IndicatorType::Ema(EMA_MEDIUM),
            ema_long: IndicatorType::Ema(EMA_LONG),
            macd: IndicatorType::Macd {
                fast: macd::DEFAULT_FAST,
                slow: macd::DEFAULT_SLOW,
                signal: macd::DEFAULT_SIGNAL,
            },
            psar: IndicatorType::Psar {
                step_x1000: psar::DEFAULT_STEP_X1000,
                max_x1000: psar::DEFAULT_MAX_X1000,
            },
            adx: IndicatorType::Adx(adx::DEFAULT_PERIOD),
            ichimoku: IndicatorType::Ichimoku {
                conversion: ichimoku::DEFAULT_CONVERSION,
                base: ichimoku::DEFAULT_BASE,
                span_b: ichimoku::DEFAULT_SPAN_B,
            },
            rsi: IndicatorType::Rsi(rsi::DEFAULT_PERIOD),
            williams_r: IndicatorType::WilliamsR(williams_r::DEFAULT_PERIOD),
            cci: IndicatorType::Cci(cci::DEFAULT_PERIOD),
            roc: IndicatorType::Roc(roc::DEFAULT_PERIOD),
            stochastic: IndicatorType::Stochastic {
                k_period: stochastic::DEFAULT_K,
                k_smooth: stochastic::DEFAULT_K_SMOOTH,
                d_period: stochastic::DEFAULT_D,
            },
            vwap: IndicatorType::Vwap,
            obv: IndicatorType::Obv,
            obv_momentum: IndicatorType::ObvMomentum(obv::DEFAULT_MOMENTUM_LOOKBACK),
            volume_roc: IndicatorType::VolumeRoc(roc::DEFAULT_PERIOD),
            mfi: IndicatorType::Mfi(mfi::DEFAULT_PERIOD),
            bollinger: IndicatorType::Bollinger {
                period: bollinger::DEFAULT_PERIOD,
                stddev_mult_x100: bollinger::DEFAULT_MULT_X100,
            },
            atr: IndicatorType::Atr(atr::DEFAULT_PERIOD),
            keltner: IndicatorType::Keltner {
                period: keltner::DEFAULT_PERIOD,
                mult_x100: keltner::DEFAULT_MULT_X100,
            },
            ultimate: IndicatorType::UltimateOscillator {
                short: ultimate::DEFAULT_SHORT,
                medium: ultimate::DEFAULT_MEDIUM,
                long: ultimate::DEFAULT_LONG,
            },
        }
    }
}

impl IndicatorSet {
    pub fn with_obv_lookback(mut self, lookback: usize) -> Self {
        self.obv_momentum = IndicatorType::ObvMomentum(lookback);
        self
    }

    pub fn all(&self) -> [IndicatorType; 21] {
        [
            self.ema_short,
            self.ema_medium,
            self.ema_long,
            self.macd,
            self.psar,
            self.adx,
            self.ichimoku,
            self.rsi,
            self.williams_r,
            self.cci,
            self.roc,
            self.stochastic,
            self.vwap,
            self.obv,
            self.obv_momentum,
            self.volume_roc,
            self.mfi,
            self.bollinger,
            self.atr,
            self.keltner,
            self.ultimate,
        ]
    }
}

/// Indicator readings for the most recent candle of a window. Indicators
/// without enough history are absent from `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub values: BTreeMap<IndicatorType, IndicatorValue>,
    pub price_action: PriceAction,
}

impl IndicatorSnapshot {
    pub fn get(&self, indicator_type: IndicatorType) -> Option<IndicatorValue> {
        self.values.get(&indicator_type).copied()
    }

    pub fn simple(&self, indicator_type: IndicatorType) -> Option<f64> {
        self.get(indicator_type).and_then(|v| v.as_simple())
    }

    pub fn is_defined(&self, indicator_type: IndicatorType) -> bool {
        self.values.contains_key(&indicator_type)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorEngine {
    set: IndicatorSet,
}

impl IndicatorEngine {
    pub fn new(set: IndicatorSet) -> Self {
        IndicatorEngine { set }
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.set
    }

    pub fn compute_series(&self, window: &[Candle]) -> Vec<IndicatorSeries> {
        self.set
            .all()
            .iter()
            .map(|&t| indicator::calculate(t, window))
            .collect()
    }

    /// Snapshot of the latest candle, or `None` for an empty window.
    pub fn compute(&self, window: &[Candle]) -> Option<IndicatorSnapshot> {
        let series = self.compute_series(window);
        snapshot_at(window, &series, window.len().checked_sub(1)?)
    }

    /// Snapshots of the previous and latest candles from one pass over the
    /// window. The previous snapshot is `None` when the window has a single
    /// candle.
    pub fn compute_pair(
        &self,
        window: &[Candle],
    ) -> Option<(Option<IndicatorSnapshot>, IndicatorSnapshot)> {
        let series = self.compute_series(window);
        let last = window.len().checked_sub(1)?;
        let latest = snapshot_at(window, &series, last)?;
        let previous = last
            .checked_sub(1)
            .and_then(|i| snapshot_at(&window[..=i], &series, i));
        Some((previous, latest))
    }
}

fn snapshot_at(
    window: &[Candle],
    series: &[IndicatorSeries],
    index: usize,
) -> Option<IndicatorSnapshot> {
    let candle = window.get(index)?;
    let values = series
        .iter()
        .filter_map(|s| s.valid_at(index).map(|v| (s.indicator_type, v)))
        .collect();
    Some(IndicatorSnapshot {
        timestamp: candle.timestamp,
        close: candle.close,
        values,
        price_action: price_action::analyze(&window[..=index]),
    })
}
