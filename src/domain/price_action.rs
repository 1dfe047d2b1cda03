//! Price action analysis over a candle window.
//!
//! Three independent reads of the window:
//!
//! - **Candlestick patterns** of the latest candle (doji, hammer, shooting
//!   star) and of the latest pair (bullish/bearish engulfing).
//! - **Support/resistance** from centred pivot highs and lows. A candle is a
//!   pivot high when its high equals the maximum of the `PIVOT_WINDOW` candles
//!   centred on it (pivot lows mirror this). Resistance is the lowest pivot
//!   high above the latest close; support is the highest pivot low below it.
//! - **Trend structure** over the last `TREND_LOOKBACK` candles from swing
//!   points that exceed the `SWING_SPAN` candles on either side.

use serde::Serialize;

use crate::domain::candle::Candle;

pub const PIVOT_WINDOW: usize = 20;
pub const TREND_LOOKBACK: usize = 50;
pub const SWING_SPAN: usize = 5;

const DOJI_BODY_RATIO: f64 = 0.1;
const SMALL_BODY_RATIO: f64 = 0.3;
const SHADOW_TO_BODY: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CandlePatterns {
    pub doji: bool,
    pub hammer: bool,
    pub shooting_star: bool,
    pub bullish_engulfing: bool,
    pub bearish_engulfing: bool,
}

impl CandlePatterns {
    /// Vote cast in the price-action category, clamped to [-2, 2].
    pub fn vote(&self) -> i32 {
        let mut vote = 0;
        if self.bullish_engulfing {
            vote += 2;
        }
        if self.bearish_engulfing {
            vote -= 2;
        }
        if self.hammer {
            vote += 1;
        }
        if self.shooting_star {
            vote -= 1;
        }
        vote.clamp(-2, 2)
    }

    pub fn supports_buy(&self) -> bool {
        self.bullish_engulfing || self.hammer
    }

    pub fn supports_sell(&self) -> bool {
        self.bearish_engulfing || self.shooting_star
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStructure {
    Uptrend,
    Downtrend,
    Sideways,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceAction {
    pub patterns: CandlePatterns,
    /// False when the window is too short for pivot detection.
    pub levels_available: bool,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub trend: TrendStructure,
}

impl PriceAction {
    /// Latest close sits above every pivot high in the window.
    pub fn above_resistance_band(&self) -> bool {
        self.levels_available && self.resistance.is_none()
    }

    /// Latest close sits below every pivot low in the window.
    pub fn below_support_band(&self) -> bool {
        self.levels_available && self.support.is_none()
    }
}

pub fn analyze(window: &[Candle]) -> PriceAction {
    let (support, resistance, levels_available) = match support_resistance(window) {
        Some((support, resistance)) => (support, resistance, true),
        None => (None, None, false),
    };
    PriceAction {
        patterns: detect_patterns(window),
        levels_available,
        support,
        resistance,
        trend: trend_structure(window),
    }
}

pub fn detect_patterns(window: &[Candle]) -> CandlePatterns {
    let Some(current) = window.last() else {
        return CandlePatterns::default();
    };

    let body = current.body_size();
    let range = current.range();
    let upper = current.upper_shadow();
    let lower = current.lower_shadow();
    let has_range = range > 0.0;

    let mut patterns = CandlePatterns {
        doji: has_range && body / range < DOJI_BODY_RATIO,
        hammer: has_range
            && body / range < SMALL_BODY_RATIO
            && lower > SHADOW_TO_BODY * body
            && upper < body,
        shooting_star: has_range
            && body / range < SMALL_BODY_RATIO
            && upper > SHADOW_TO_BODY * body
            && lower < body,
        ..CandlePatterns::default()
    };

    if let [.., prev, current] = window {
        patterns.bullish_engulfing = current.is_bullish()
            && prev.is_bearish()
            && current.open < prev.close
            && current.close > prev.open;
        patterns.bearish_engulfing = current.is_bearish()
            && prev.is_bullish()
            && current.open > prev.close
            && current.close < prev.open;
    }

    patterns
}

/// Returns `None` when the window is shorter than two pivot windows,
/// otherwise the (support, resistance) pair relative to the latest close.
pub fn support_resistance(window: &[Candle]) -> Option<(Option<f64>, Option<f64>)> {
    if window.len() < PIVOT_WINDOW * 2 {
        return None;
    }
    let close = window.last()?.close;

    let before = PIVOT_WINDOW / 2;
    let after = PIVOT_WINDOW - before - 1;

    let mut support: Option<f64> = None;
    let mut resistance: Option<f64> = None;
    for i in before..window.len() - after {
        let span = &window[i - before..=i + after];
        let candle = &window[i];

        let max_high = span.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        if candle.high == max_high && candle.high > close {
            resistance = Some(resistance.map_or(candle.high, |r| r.min(candle.high)));
        }

        let min_low = span.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        if candle.low == min_low && candle.low < close {
            support = Some(support.map_or(candle.low, |s| s.max(candle.low)));
        }
    }
    Some((support, resistance))
}

pub fn trend_structure(window: &[Candle]) -> TrendStructure {
    if window.len() < TREND_LOOKBACK {
        return TrendStructure::InsufficientData;
    }
    let recent = &window[window.len() - TREND_LOOKBACK..];

    let mut swing_highs = Vec::new();
    let mut swing_lows = Vec::new();
    for i in SWING_SPAN..recent.len() - SWING_SPAN {
        let left = &recent[i - SWING_SPAN..i];
        let right = &recent[i + 1..=i + SWING_SPAN];
        let candle = &recent[i];

        if left.iter().chain(right).all(|c| candle.high > c.high) {
            swing_highs.push(candle.high);
        }
        if left.iter().chain(right).all(|c| candle.low < c.low) {
            swing_lows.push(candle.low);
        }
    }

    match (swing_highs.as_slice(), swing_lows.as_slice()) {
        ([.., h1, h2], [.., l1, l2]) if h2 > h1 && l2 > l1 => TrendStructure::Uptrend,
        ([.., h1, h2], [.., l1, l2]) if h2 < h1 && l2 < l1 => TrendStructure::Downtrend,
        _ => TrendStructure::Sideways,
    }
}
