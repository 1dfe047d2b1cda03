//! Historical candle source port.

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::ConfluenceError;

pub trait CandleSource {
    /// Candles for `symbol`/`interval` in source order, optionally limited to
    /// `[start, end]`. Gaps are returned as-is; ordering is not repaired.
    fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, ConfluenceError>;

    fn list_symbols(&self, interval: &str) -> Result<Vec<String>, ConfluenceError>;
}
