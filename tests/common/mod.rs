#![allow(dead_code)]

use async_trait::async_trait;
use chrono::DateTime;
use confluence::adapters::orchestrator::StreamOrchestrator;
use confluence::domain::candle::Candle;
use confluence::domain::config::{ReconnectPolicy, StreamConfig};
use confluence::domain::error::ConfluenceError;
use confluence::domain::pipeline::{ConnectionStatus, PipelineConfig, StreamState};
use confluence::domain::signal::SignalEvent;
use confluence::ports::feed_port::{FeedConnection, FeedConnector};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const BASE_EPOCH: i64 = 1_700_000_100;
pub const FIFTEEN_MINUTES: i64 = 900;
pub const WAIT: Duration = Duration::from_secs(10);

pub fn candle_at(index: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        timestamp: DateTime::from_timestamp(BASE_EPOCH + index as i64 * FIFTEEN_MINUTES, 0).unwrap(),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Deterministic, well-formed candles that trend slowly upward with two
/// overlapping cycles, so the series crosses every indicator threshold.
///
/// Each open gaps back against the move and the long wick sits on the side
/// the move came from: rising candles are hammers and falling candles are
/// shooting stars. Under the default scorer this replays into confirmed BUY
/// and SELL signals (the first BUY lands on candle 57, the first SELL on 86).
pub fn fixture_candles(n: usize) -> Vec<Candle> {
    let price = |x: f64| 100.0 + 0.02 * x + 8.0 * (x / 37.0).sin() + 3.0 * (x / 11.0).sin();
    (0..n)
        .map(|i| {
            let x = i as f64;
            let prev_close = price(x - 1.0);
            let close = price(x);
            let open = prev_close - 0.3 * (close - prev_close);
            let body = (close - open).abs();
            let (high, low) = if close >= open {
                (close + 0.2 * body, open - 3.0 * body - 0.3)
            } else {
                (open + 3.0 * body + 0.3, close - 0.2 * body)
            };
            let volume = 1000.0 + 300.0 * (x / 13.0).sin() + 50.0 * (i % 7) as f64;
            candle_at(i, open, high, low, close, volume)
        })
        .collect()
}

/// Strictly rising closes, one point per candle.
pub fn rising_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            candle_at(i, close - 0.5, close + 0.25, close - 0.75, close, 1000.0)
        })
        .collect()
}

pub fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| candle_at(i, price, price, price, price, 1000.0))
        .collect()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_csv(dir: &Path, symbol: &str, interval: &str, candles: &[Candle]) {
    let mut body = String::from("timestamp,open,high,low,close,volume\n");
    for c in candles {
        body.push_str(&format!(
            "{},{},{},{},{},{}\n",
            c.timestamp.timestamp(),
            c.open,
            c.high,
            c.low,
            c.close,
            c.volume
        ));
    }
    std::fs::write(dir.join(format!("{}_{}.csv", symbol, interval)), body).unwrap();
}

pub fn test_pipeline() -> PipelineConfig {
    PipelineConfig {
        capacity: 500,
        min_ready: 50,
        ..PipelineConfig::default()
    }
}

/// Stream config with millisecond backoff so reconnect tests run fast.
pub fn test_stream_config() -> StreamConfig {
    StreamConfig {
        reconnect: ReconnectPolicy {
            base: Duration::from_millis(1),
            max: Duration::from_millis(4),
            max_attempts: 3,
        },
        pipeline: test_pipeline(),
        ..StreamConfig::default()
    }
}

/// Events a single uninterrupted pass over `candles` would emit.
pub fn expected_events(symbol: &str, config: &PipelineConfig, candles: &[Candle]) -> Vec<SignalEvent> {
    let mut state = StreamState::new(symbol, "Min15", config);
    candles.iter().filter_map(|c| state.on_candle(*c)).collect()
}

pub async fn wait_for_status(
    orchestrator: &StreamOrchestrator,
    symbol: &str,
    want: impl Fn(ConnectionStatus) -> bool,
) -> ConnectionStatus {
    let mut rx = orchestrator.watch_status(symbol).expect("stream not started");
    let status = tokio::time::timeout(WAIT, rx.wait_for(|s| want(*s)))
        .await
        .expect("timed out waiting for status")
        .expect("status channel closed");
    *status
}

pub async fn recv_events(rx: &mut UnboundedReceiver<SignalEvent>, n: usize) -> Vec<SignalEvent> {
    let mut events = Vec::with_capacity(n);
    while events.len() < n {
        match tokio::time::timeout(WAIT, rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            _ => break,
        }
    }
    events
}

// ---------------------------------------------------------------------------
// Scripted feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Step {
    Candle(Candle),
    Malformed,
    Lose,
    Close,
}

#[derive(Debug, Clone)]
pub enum Session {
    Refuse,
    Open(Vec<Step>),
}

pub fn deliver(candles: &[Candle]) -> Vec<Step> {
    candles.iter().copied().map(Step::Candle).collect()
}

/// In-memory connector that plays back one scripted session per connect.
/// Once a session's steps run out the connection stays open and idle; once
/// the sessions run out every connect is refused.
#[derive(Default)]
pub struct ScriptedConnector {
    sessions: Mutex<HashMap<String, VecDeque<Session>>>,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(self, symbol: &str, sessions: Vec<Session>) -> Self {
        self.sessions
            .lock()
            .unwrap()
            .insert(symbol.to_string(), sessions.into());
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedConnector for ScriptedConnector {
    async fn connect(
        &self,
        symbol: &str,
        _interval: &str,
    ) -> Result<Box<dyn FeedConnection>, ConfluenceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(|s| s.pop_front());
        match session {
            Some(Session::Open(steps)) => Ok(Box::new(ScriptedConnection {
                symbol: symbol.to_string(),
                steps: steps.into(),
                closes: Arc::clone(&self.closes),
                closed: false,
            })),
            Some(Session::Refuse) | None => Err(ConfluenceError::ConnectionLost {
                symbol: symbol.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

pub struct ScriptedConnection {
    symbol: String,
    steps: VecDeque<Step>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl FeedConnection for ScriptedConnection {
    async fn next_candle(&mut self) -> Result<Option<Candle>, ConfluenceError> {
        // a socket read suspends; let callback workers run between messages
        tokio::task::yield_now().await;
        match self.steps.pop_front() {
            Some(Step::Candle(candle)) => Ok(Some(candle)),
            Some(Step::Malformed) => Err(ConfluenceError::MalformedMessage {
                reason: "unexpected token".to_string(),
            }),
            Some(Step::Lose) => Err(ConfluenceError::ConnectionLost {
                symbol: self.symbol.clone(),
                reason: "reset by peer".to_string(),
            }),
            Some(Step::Close) => Ok(None),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
