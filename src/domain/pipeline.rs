//! Per-symbol ingestion state: buffer, engine, scorer and emission dedup.
//!
//! A `StreamState` processes candles strictly in order. Each accepted candle
//! triggers a full recompute over the buffered window; the resulting event
//! is emitted only when it differs materially from the last emitted one.

use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::candle_buffer::{AppendOutcome, CandleBuffer, DEFAULT_CAPACITY, DEFAULT_MIN_READY};
use crate::domain::scorer::{ConfluenceScorer, ScorerConfig};
use crate::domain::signal::SignalEvent;
use crate::domain::snapshot::{IndicatorEngine, IndicatorSet};

pub const DEFAULT_STRENGTH_EPSILON: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub capacity: usize,
    pub min_ready: usize,
    /// Strength change that counts as material when direction is unchanged.
    pub strength_epsilon: f64,
    pub scorer: ScorerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            capacity: DEFAULT_CAPACITY,
            min_ready: DEFAULT_MIN_READY,
            strength_epsilon: DEFAULT_STRENGTH_EPSILON,
            scorer: ScorerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Stopped,
    Failed,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Stopped | ConnectionStatus::Failed)
    }
}

/// Window to snapshot to score, with no state of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalPipeline {
    engine: IndicatorEngine,
    scorer: ConfluenceScorer,
}

impl SignalPipeline {
    pub fn new(config: ScorerConfig) -> Self {
        let set = IndicatorSet::default().with_obv_lookback(config.obv_lookback);
        SignalPipeline {
            engine: IndicatorEngine::new(set),
            scorer: ConfluenceScorer::new(config, set),
        }
    }

    pub fn evaluate(&self, symbol: &str, interval: &str, window: &[Candle]) -> Option<SignalEvent> {
        let (previous, latest) = self.engine.compute_pair(window)?;
        let card = self.scorer.score(&latest, previous.as_ref());
        Some(SignalEvent::from_score(
            symbol,
            interval,
            &latest,
            self.engine.indicators(),
            card,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct StreamState {
    symbol: String,
    interval: String,
    buffer: CandleBuffer,
    pipeline: SignalPipeline,
    strength_epsilon: f64,
    last_emitted: Option<SignalEvent>,
    status: ConnectionStatus,
    reconnect_attempts: u32,
}

impl StreamState {
    pub fn new(symbol: &str, interval: &str, config: &PipelineConfig) -> Self {
        StreamState {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            buffer: CandleBuffer::new(config.capacity, config.min_ready),
            pipeline: SignalPipeline::new(config.scorer),
            strength_epsilon: config.strength_epsilon,
            last_emitted: None,
            status: ConnectionStatus::Connecting,
            reconnect_attempts: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn buffer(&self) -> &CandleBuffer {
        &self.buffer
    }

    pub fn last_emitted(&self) -> Option<&SignalEvent> {
        self.last_emitted.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Count a failed connection attempt and return the running total.
    pub fn record_failed_attempt(&mut self) -> u32 {
        self.reconnect_attempts += 1;
        self.reconnect_attempts
    }

    pub fn reset_attempts(&mut self) {
        self.reconnect_attempts = 0;
    }

    pub fn append(&mut self, candle: Candle) -> AppendOutcome {
        let outcome = self.buffer.append(candle);
        if !outcome.is_accepted() {
            debug!(
                symbol = %self.symbol,
                timestamp = %candle.timestamp,
                ?outcome,
                "candle rejected"
            );
        }
        outcome
    }

    /// Signal for the current window, ignoring dedup. `None` until the
    /// buffer is ready.
    pub fn evaluate(&self) -> Option<SignalEvent> {
        if !self.buffer.is_ready() {
            return None;
        }
        self.pipeline
            .evaluate(&self.symbol, &self.interval, self.buffer.window())
    }

    /// Append, evaluate and dedup. Returns the event to dispatch, if any.
    pub fn on_candle(&mut self, candle: Candle) -> Option<SignalEvent> {
        if !self.append(candle).is_accepted() {
            return None;
        }
        let event = self.evaluate()?;
        if !self.is_material(&event) {
            debug!(symbol = %self.symbol, direction = %event.direction, "signal unchanged, suppressed");
            return None;
        }
        self.last_emitted = Some(event.clone());
        Some(event)
    }

    fn is_material(&self, event: &SignalEvent) -> bool {
        match &self.last_emitted {
            None => true,
            Some(last) => {
                last.direction != event.direction
                    || (last.strength - event.strength).abs() > self.strength_epsilon
            }
        }
    }
}
