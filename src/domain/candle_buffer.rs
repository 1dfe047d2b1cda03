//! Bounded, timestamp-ordered candle history for one symbol/interval.
//!
//! The buffer is a fixed-capacity FIFO: once `capacity` candles are held, each
//! accepted append evicts the oldest in constant time. The backing ring holds
//! two windows' worth of slots and is re-linearised after each append, so the
//! window stays a plain slice and the rotation runs at most once per
//! `capacity` appends. Timestamps are strictly increasing; a
//! candle at or before the latest buffered timestamp is rejected and leaves the
//! buffer untouched.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::candle::Candle;

/// Default capacity, large enough for EMA(200) and Ichimoku(52/26).
pub const DEFAULT_CAPACITY: usize = 500;

/// Minimum number of candles before the buffer counts as ready.
pub const DEFAULT_MIN_READY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted,
    RejectedDuplicate,
    RejectedOutOfOrder,
}

impl AppendOutcome {
    pub fn is_accepted(self) -> bool {
        self == AppendOutcome::Accepted
    }
}

#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: VecDeque<Candle>,
    capacity: usize,
    min_ready: usize,
}

impl CandleBuffer {
    /// A zero capacity is bumped to one so the buffer can always hold the
    /// latest candle.
    pub fn new(capacity: usize, min_ready: usize) -> Self {
        let capacity = capacity.max(1);
        CandleBuffer {
            candles: VecDeque::with_capacity(capacity * 2),
            capacity,
            min_ready,
        }
    }

    pub fn append(&mut self, candle: Candle) -> AppendOutcome {
        if let Some(latest) = self.latest_timestamp() {
            if candle.timestamp == latest {
                return AppendOutcome::RejectedDuplicate;
            }
            if candle.timestamp < latest {
                return AppendOutcome::RejectedOutOfOrder;
            }
        }

        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        self.candles.make_contiguous();
        AppendOutcome::Accepted
    }

    /// Read-only view, oldest first.
    pub fn window(&self) -> &[Candle] {
        // `append` keeps the ring linear, so the front slice is everything
        self.candles.as_slices().0
    }

    pub fn is_ready(&self) -> bool {
        self.candles.len() >= self.min_ready
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.back().map(|c| c.timestamp)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_ready(&self) -> usize {
        self.min_ready
    }
}

impl Default for CandleBuffer {
    fn default() -> Self {
        CandleBuffer::new(DEFAULT_CAPACITY, DEFAULT_MIN_READY)
    }
}
