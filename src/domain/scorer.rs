//! Confluence scoring: indicator votes to a BUY/SELL/HOLD decision.
//!
//! Each voting indicator casts an integer vote in [-2, 2] from a fixed rule.
//! Votes are summed per category, the category sums are weighted, and the
//! weighted total is compared against the buy/sell thresholds. With price
//! action enabled, a BUY or SELL must additionally be confirmed by a
//! supporting candlestick pattern or a close outside the pivot band, else it
//! is downgraded to HOLD.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::indicator::IndicatorValue;
use crate::domain::signal::Direction;
use crate::domain::snapshot::{IndicatorSet, IndicatorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Trend,
    Momentum,
    Volume,
    Volatility,
    PriceAction,
}

/// The indicator rule that cast a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum VoteSource {
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "EMA")]
    Ema,
    #[serde(rename = "PSAR")]
    Psar,
    #[serde(rename = "ADX")]
    Adx,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "WILLR")]
    WilliamsR,
    #[serde(rename = "CCI")]
    Cci,
    #[serde(rename = "OBV")]
    Obv,
    #[serde(rename = "MFI")]
    Mfi,
    #[serde(rename = "BB")]
    Bollinger,
    #[serde(rename = "KC")]
    Keltner,
    #[serde(rename = "PRICE_ACTION")]
    PriceAction,
}

impl VoteSource {
    pub fn category(self) -> Category {
        match self {
            VoteSource::Macd | VoteSource::Ema | VoteSource::Psar | VoteSource::Adx => {
                Category::Trend
            }
            VoteSource::Rsi | VoteSource::WilliamsR | VoteSource::Cci => Category::Momentum,
            VoteSource::Obv | VoteSource::Mfi => Category::Volume,
            VoteSource::Bollinger | VoteSource::Keltner => Category::Volatility,
            VoteSource::PriceAction => Category::PriceAction,
        }
    }
}

impl fmt::Display for VoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoteSource::Macd => "MACD",
            VoteSource::Ema => "EMA",
            VoteSource::Psar => "PSAR",
            VoteSource::Adx => "ADX",
            VoteSource::Rsi => "RSI",
            VoteSource::WilliamsR => "WILLR",
            VoteSource::Cci => "CCI",
            VoteSource::Obv => "OBV",
            VoteSource::Mfi => "MFI",
            VoteSource::Bollinger => "BB",
            VoteSource::Keltner => "KC",
            VoteSource::PriceAction => "PRICE_ACTION",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryWeights {
    pub trend: f64,
    pub momentum: f64,
    pub volume: f64,
    pub volatility: f64,
    pub price_action: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        CategoryWeights {
            trend: 0.30,
            momentum: 0.25,
            volume: 0.20,
            volatility: 0.15,
            price_action: 0.10,
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Trend => self.trend,
            Category::Momentum => self.momentum,
            Category::Volume => self.volume,
            Category::Volatility => self.volatility,
            Category::PriceAction => self.price_action,
        }
    }

    pub fn sum(&self) -> f64 {
        self.trend + self.momentum + self.volume + self.volatility + self.price_action
    }
}

/// Empirical vote thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoteThresholds {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_midline: f64,
    pub adx_strong: f64,
    pub willr_overbought: f64,
    pub willr_oversold: f64,
    pub cci_overbought: f64,
    pub cci_oversold: f64,
    pub mfi_overbought: f64,
    pub mfi_oversold: f64,
}

impl Default for VoteThresholds {
    fn default() -> Self {
        VoteThresholds {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_midline: 50.0,
            adx_strong: 25.0,
            willr_overbought: -20.0,
            willr_oversold: -80.0,
            cci_overbought: 100.0,
            cci_oversold: -100.0,
            mfi_overbought: 80.0,
            mfi_oversold: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorerConfig {
    pub use_price_action: bool,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub max_possible_score: f64,
    pub obv_lookback: usize,
    pub weights: CategoryWeights,
    pub thresholds: VoteThresholds,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            use_price_action: true,
            buy_threshold: 1.5,
            sell_threshold: -1.5,
            max_possible_score: 10.0,
            obv_lookback: crate::domain::indicator::obv::DEFAULT_MOMENTUM_LOOKBACK,
            weights: CategoryWeights::default(),
            thresholds: VoteThresholds::default(),
        }
    }
}

/// Scored outcome for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub direction: Direction,
    /// Direction before price-action confirmation.
    pub candidate: Direction,
    pub score: f64,
    pub strength: f64,
    pub reason: String,
    pub components: BTreeMap<VoteSource, i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfluenceScorer {
    config: ScorerConfig,
    set: IndicatorSet,
}

impl ConfluenceScorer {
    pub fn new(config: ScorerConfig, set: IndicatorSet) -> Self {
        ConfluenceScorer { config, set }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Votes cast by `latest`. Undefined indicators cast no vote; the RSI
    /// midline cross also needs `previous`.
    pub fn votes(
        &self,
        latest: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> BTreeMap<VoteSource, i32> {
        let t = &self.config.thresholds;
        let set = &self.set;
        let close = latest.close;
        let mut votes = BTreeMap::new();

        if let Some(IndicatorValue::Macd { line, signal, .. }) = latest.get(set.macd) {
            votes.insert(VoteSource::Macd, sign_vote(line, signal, 2));
        }

        let ema_short = latest.simple(set.ema_short);
        let ema_medium = latest.simple(set.ema_medium);
        let ema_long = latest.simple(set.ema_long);
        if let (Some(short), Some(medium)) = (ema_short, ema_medium) {
            let vote = match ema_long {
                Some(long) if close > short && short > medium && medium > long => 2,
                Some(long) if close < short && short < medium && medium < long => -2,
                _ => sign_vote(short, medium, 1),
            };
            votes.insert(VoteSource::Ema, vote);
        }

        if let Some(IndicatorValue::Psar { long, .. }) = latest.get(set.psar) {
            votes.insert(VoteSource::Psar, if long { 1 } else { -1 });
        }

        if let Some(IndicatorValue::Adx { adx, .. }) = latest.get(set.adx) {
            let prevailing: i32 = votes.values().sum();
            let vote = if adx > t.adx_strong {
                prevailing.signum()
            } else {
                0
            };
            votes.insert(VoteSource::Adx, vote);
        }

        if let Some(rsi) = latest.simple(set.rsi) {
            let previous_rsi = previous.and_then(|p| p.simple(set.rsi));
            let vote = if rsi < t.rsi_oversold {
                2
            } else if rsi > t.rsi_overbought {
                -2
            } else {
                match previous_rsi {
                    Some(prev) if rsi > t.rsi_midline && prev <= t.rsi_midline => 1,
                    Some(prev) if rsi < t.rsi_midline && prev >= t.rsi_midline => -1,
                    _ => 0,
                }
            };
            votes.insert(VoteSource::Rsi, vote);
        }

        if let Some(r) = latest.simple(set.williams_r) {
            votes.insert(
                VoteSource::WilliamsR,
                band_vote(r, t.willr_oversold, t.willr_overbought),
            );
        }

        if let Some(cci) = latest.simple(set.cci) {
            votes.insert(
                VoteSource::Cci,
                band_vote(cci, t.cci_oversold, t.cci_overbought),
            );
        }

        if let Some(momentum) = latest.simple(set.obv_momentum) {
            votes.insert(VoteSource::Obv, sign_vote(momentum, 0.0, 1));
        }

        if let Some(mfi) = latest.simple(set.mfi) {
            votes.insert(
                VoteSource::Mfi,
                band_vote(mfi, t.mfi_oversold, t.mfi_overbought),
            );
        }

        if let Some(IndicatorValue::Band { upper, lower, .. }) = latest.get(set.bollinger) {
            votes.insert(VoteSource::Bollinger, band_vote(close, lower, upper));
        }

        if let Some(IndicatorValue::Band { upper, lower, .. }) = latest.get(set.keltner) {
            votes.insert(VoteSource::Keltner, band_vote(close, lower, upper));
        }

        if self.config.use_price_action {
            votes.insert(VoteSource::PriceAction, latest.price_action.patterns.vote());
        }

        votes
    }

    pub fn score(
        &self,
        latest: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> ScoreCard {
        let components = self.votes(latest, previous);
        let score = score_votes(&components, &self.config.weights);
        let candidate = self.decide(score);

        let direction = if self.config.use_price_action && !self.confirmed(candidate, latest) {
            Direction::Hold
        } else {
            candidate
        };

        ScoreCard {
            direction,
            candidate,
            score,
            strength: self.strength(score),
            reason: reason(direction, candidate, score, &components),
            components,
        }
    }

    pub fn decide(&self, score: f64) -> Direction {
        if score > self.config.buy_threshold {
            Direction::Buy
        } else if score < self.config.sell_threshold {
            Direction::Sell
        } else {
            Direction::Hold
        }
    }

    /// |score| / max_possible_score clamped to [0, 1]. A non-finite score
    /// has no strength.
    pub fn strength(&self, score: f64) -> f64 {
        if !score.is_finite() {
            return 0.0;
        }
        (score.abs() / self.config.max_possible_score).min(1.0)
    }

    fn confirmed(&self, candidate: Direction, latest: &IndicatorSnapshot) -> bool {
        let action = &latest.price_action;
        match candidate {
            Direction::Buy => action.patterns.supports_buy() || action.above_resistance_band(),
            Direction::Sell => action.patterns.supports_sell() || action.below_support_band(),
            Direction::Hold => true,
        }
    }
}

/// Weighted sum of per-category vote totals.
pub fn score_votes(votes: &BTreeMap<VoteSource, i32>, weights: &CategoryWeights) -> f64 {
    let mut sums: BTreeMap<Category, i32> = BTreeMap::new();
    for (source, vote) in votes {
        *sums.entry(source.category()).or_insert(0) += vote;
    }
    sums.iter()
        .map(|(category, sum)| *sum as f64 * weights.weight(*category))
        .sum()
}

fn sign_vote(value: f64, reference: f64, magnitude: i32) -> i32 {
    if value > reference {
        magnitude
    } else if value < reference {
        -magnitude
    } else {
        0
    }
}

/// +1 below `low`, -1 above `high`.
fn band_vote(value: f64, low: f64, high: f64) -> i32 {
    if value < low {
        1
    } else if value > high {
        -1
    } else {
        0
    }
}

fn reason(
    direction: Direction,
    candidate: Direction,
    score: f64,
    components: &BTreeMap<VoteSource, i32>,
) -> String {
    let mut text = match direction {
        Direction::Buy => format!("Bullish confluence (Score: {:.2})", score),
        Direction::Sell => format!("Bearish confluence (Score: {:.2})", score),
        Direction::Hold => format!("Neutral (Score: {:.2})", score),
    };
    if direction != candidate {
        text.push_str(&format!(
            ", {} not confirmed by price action",
            candidate
        ));
    }

    let active: Vec<String> = components
        .iter()
        .filter(|(_, vote)| **vote != 0)
        .map(|(source, vote)| format!("{} {:+}", source, vote))
        .collect();
    if !active.is_empty() {
        text.push_str(": ");
        text.push_str(&active.join(", "));
    }
    text
}
