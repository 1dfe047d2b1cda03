//! Signal events emitted once per completed candle.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::indicator::IndicatorValue;
use crate::domain::price_action::TrendStructure;
use crate::domain::scorer::{ScoreCard, VoteSource};
use crate::domain::snapshot::{IndicatorSet, IndicatorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalEvent {
    pub symbol: String,
    pub interval: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "signal")]
    pub direction: Direction,
    #[serde(rename = "signal_strength")]
    pub strength: f64,
    pub score: f64,
    #[serde(rename = "signal_reason")]
    pub reason: String,
    pub price: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub adx: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resistance_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_structure: Option<TrendStructure>,
    pub components: BTreeMap<VoteSource, i32>,
    /// Every defined indicator keyed by its display name.
    pub indicators: BTreeMap<String, IndicatorValue>,
}

impl SignalEvent {
    pub fn from_score(
        symbol: &str,
        interval: &str,
        snapshot: &IndicatorSnapshot,
        set: &IndicatorSet,
        card: ScoreCard,
    ) -> Self {
        let macd = match snapshot.get(set.macd) {
            Some(IndicatorValue::Macd { line, .. }) => Some(line),
            _ => None,
        };
        let adx = match snapshot.get(set.adx) {
            Some(IndicatorValue::Adx { adx, .. }) => Some(adx),
            _ => None,
        };
        let action = &snapshot.price_action;

        SignalEvent {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            timestamp: snapshot.timestamp,
            direction: card.direction,
            strength: card.strength,
            score: card.score,
            reason: card.reason,
            price: snapshot.close,
            rsi: snapshot.simple(set.rsi),
            macd,
            adx,
            support_level: action.support,
            resistance_level: action.resistance,
            trend_structure: Some(action.trend),
            components: card.components,
            indicators: snapshot
                .values
                .iter()
                .map(|(t, v)| (t.to_string(), *v))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_action::{CandlePatterns, PriceAction};

    fn sample_event() -> SignalEvent {
        let set = IndicatorSet::default();
        let snapshot = IndicatorSnapshot {
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            close: 42_000.5,
            values: [
                (set.rsi, IndicatorValue::simple(55.0)),
                (
                    set.macd,
                    IndicatorValue::Macd {
                        line: 12.0,
                        signal: 10.0,
                        histogram: 2.0,
                    },
                ),
            ]
            .into_iter()
            .collect(),
            price_action: PriceAction {
                patterns: CandlePatterns::default(),
                levels_available: true,
                support: Some(41_500.0),
                resistance: None,
                trend: TrendStructure::Uptrend,
            },
        };
        let card = ScoreCard {
            direction: Direction::Buy,
            candidate: Direction::Buy,
            score: 2.1,
            strength: 0.21,
            reason: "Bullish confluence (Score: 2.10)".to_string(),
            components: [(VoteSource::Macd, 2)].into_iter().collect(),
        };
        SignalEvent::from_score("BTC_USDT", "Min15", &snapshot, &set, card)
    }

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::Sell.to_string(), "SELL");
        assert_eq!(Direction::Hold.to_string(), "HOLD");
    }

    #[test]
    fn event_carries_key_indicators() {
        let event = sample_event();
        assert_eq!(event.rsi, Some(55.0));
        assert_eq!(event.macd, Some(12.0));
        assert_eq!(event.adx, None);
        assert_eq!(event.price, 42_000.5);
        assert!(event.indicators.contains_key("RSI(14)"));
    }

    #[test]
    fn event_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&sample_event().to_json().unwrap()).unwrap();
        assert_eq!(json["symbol"], "BTC_USDT");
        assert_eq!(json["interval"], "Min15");
        assert_eq!(json["signal"], "BUY");
        assert_eq!(json["signal_strength"], 0.21);
        assert_eq!(json["signal_reason"], "Bullish confluence (Score: 2.10)");
        assert_eq!(json["support_level"], 41_500.0);
        assert!(json.get("resistance_level").is_none());
        assert_eq!(json["trend_structure"], "uptrend");
        assert_eq!(json["components"]["MACD"], 2);
        assert_eq!(json["indicators"]["MACD(12,26,9)"]["kind"], "macd");
        assert!(json["adx"].is_null());
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20Z");
    }
}
