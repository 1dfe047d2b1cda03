//! MEXC futures kline feed over WebSocket.
//!
//! After connecting, one `sub.kline` request is sent for the symbol. The
//! exchange pushes the in-progress candle repeatedly; a candle counts as
//! completed once a push for a later interval arrives. The connector keeps
//! the in-progress candle per symbol across connections, so a candle whose
//! interval ends during an outage is emitted by the next session.
//! Application-level pings keep the subscription alive and protocol pings
//! are answered.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::domain::candle::Candle;
use crate::domain::error::ConfluenceError;
use crate::ports::feed_port::{FeedConnection, FeedConnector};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const KLINE_CHANNEL: &str = "push.kline";
const SUBSCRIBE_ACK_CHANNEL: &str = "rs.sub.kline";
const ERROR_CHANNEL: &str = "rs.error";
const PONG_CHANNEL: &str = "pong";
const PING_REQUEST: &str = r#"{"method":"ping"}"#;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEPALIVE_PERIOD: Duration = Duration::from_secs(15);

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MexcMessage {
    Kline {
        symbol: Option<String>,
        candle: Candle,
    },
    SubscriptionAck {
        accepted: bool,
        detail: String,
    },
    Pong,
    ServerError(String),
    Other,
}

#[derive(Deserialize)]
struct Envelope {
    channel: Option<String>,
    symbol: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct KlineData {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    q: f64,
}

pub fn subscription_request(symbol: &str, interval: &str) -> String {
    serde_json::json!({
        "method": "sub.kline",
        "param": { "symbol": symbol, "interval": interval },
    })
    .to_string()
}

fn malformed(reason: impl fmt::Display) -> ConfluenceError {
    ConfluenceError::MalformedMessage {
        reason: reason.to_string(),
    }
}

fn connection_lost(symbol: &str, reason: impl fmt::Display) -> ConfluenceError {
    ConfluenceError::ConnectionLost {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    }
}

pub fn parse_message(text: &str) -> Result<MexcMessage, ConfluenceError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(malformed)?;
    let Some(channel) = envelope.channel else {
        return Ok(MexcMessage::Other);
    };

    match channel.as_str() {
        KLINE_CHANNEL => {
            let data = envelope
                .data
                .ok_or_else(|| malformed("kline push without data"))?;
            let k: KlineData = serde_json::from_value(data).map_err(malformed)?;
            let candle = Candle::from_epoch_seconds(k.t, k.o, k.h, k.l, k.c, k.q)
                .ok_or_else(|| malformed(format!("kline timestamp {} out of range", k.t)))?;
            if !candle.is_well_formed() {
                return Err(malformed(format!("inconsistent kline at {}", k.t)));
            }
            Ok(MexcMessage::Kline {
                symbol: envelope.symbol,
                candle,
            })
        }
        SUBSCRIBE_ACK_CHANNEL => {
            let detail = match envelope.data {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            Ok(MexcMessage::SubscriptionAck {
                accepted: detail == "success",
                detail,
            })
        }
        ERROR_CHANNEL => Ok(MexcMessage::ServerError(
            envelope.data.map(|d| d.to_string()).unwrap_or_default(),
        )),
        PONG_CHANNEL => Ok(MexcMessage::Pong),
        _ => Ok(MexcMessage::Other),
    }
}

/// Turns repeated in-progress pushes into completed candles.
#[derive(Debug, Default)]
pub struct KlineAssembler {
    pending: Option<Candle>,
}

impl KlineAssembler {
    /// Record a push. Returns the previous candle once a push for a later
    /// interval arrives; stale pushes are ignored.
    pub fn push(&mut self, candle: Candle) -> Option<Candle> {
        match self.pending {
            Some(pending) if candle.timestamp < pending.timestamp => None,
            Some(pending) if candle.timestamp > pending.timestamp => {
                self.pending = Some(candle);
                Some(pending)
            }
            _ => {
                self.pending = Some(candle);
                None
            }
        }
    }

    pub fn pending(&self) -> Option<&Candle> {
        self.pending.as_ref()
    }
}

type SharedAssembler = Arc<Mutex<KlineAssembler>>;

pub struct MexcFeedConnector {
    url: String,
    assemblers: Mutex<HashMap<String, SharedAssembler>>,
}

impl MexcFeedConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            assemblers: Mutex::new(HashMap::new()),
        }
    }

    /// The candle still in progress for `symbol`, if any push was seen.
    pub fn pending(&self, symbol: &str) -> Option<Candle> {
        let assembler = self
            .assemblers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()?;
        let assembler = assembler.lock().unwrap_or_else(PoisonError::into_inner);
        assembler.pending().copied()
    }

    fn assembler(&self, symbol: &str) -> SharedAssembler {
        let mut assemblers = self.assemblers.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(assemblers.entry(symbol.to_string()).or_default())
    }
}

#[async_trait]
impl FeedConnector for MexcFeedConnector {
    async fn connect(
        &self,
        symbol: &str,
        interval: &str,
    ) -> Result<Box<dyn FeedConnection>, ConfluenceError> {
        let (mut stream, response) = timeout(CONNECT_TIMEOUT, connect_async(self.url.as_str()))
            .await
            .map_err(|_| connection_lost(symbol, "connect timed out"))?
            .map_err(|e| connection_lost(symbol, e))?;
        debug!(%symbol, status = %response.status(), "websocket handshake complete");

        stream
            .send(Message::Text(subscription_request(symbol, interval)))
            .await
            .map_err(|e| connection_lost(symbol, e))?;
        info!(%symbol, %interval, url = %self.url, "subscribed to kline feed");

        Ok(Box::new(MexcConnection::new(symbol, stream, self.assembler(symbol))))
    }
}

enum Wake {
    Keepalive,
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

pub struct MexcConnection {
    symbol: String,
    stream: Option<WsStream>,
    assembler: SharedAssembler,
    keepalive: tokio::time::Interval,
}

impl MexcConnection {
    fn new(symbol: &str, stream: WsStream, assembler: SharedAssembler) -> Self {
        let mut keepalive = interval_at(Instant::now() + KEEPALIVE_PERIOD, KEEPALIVE_PERIOD);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            symbol: symbol.to_string(),
            stream: Some(stream),
            assembler,
            keepalive,
        }
    }

    fn handle_text(&mut self, text: &str) -> Result<Option<Candle>, ConfluenceError> {
        match parse_message(text)? {
            MexcMessage::Kline { symbol, candle } => {
                if symbol.as_deref().is_some_and(|s| s != self.symbol) {
                    debug!(expected = %self.symbol, got = ?symbol, "kline for another symbol ignored");
                    return Ok(None);
                }
                let completed = self
                    .assembler
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(candle);
                Ok(completed)
            }
            MexcMessage::SubscriptionAck { accepted: true, .. } => {
                info!(symbol = %self.symbol, "subscription confirmed");
                Ok(None)
            }
            MexcMessage::SubscriptionAck { detail, .. } => {
                warn!(symbol = %self.symbol, %detail, "subscription rejected");
                Ok(None)
            }
            MexcMessage::ServerError(detail) => {
                warn!(symbol = %self.symbol, %detail, "server reported error");
                Ok(None)
            }
            MexcMessage::Pong | MexcMessage::Other => Ok(None),
        }
    }
}

#[async_trait]
impl FeedConnection for MexcConnection {
    async fn next_candle(&mut self) -> Result<Option<Candle>, ConfluenceError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };

            let wake = tokio::select! {
                _ = self.keepalive.tick() => Wake::Keepalive,
                frame = stream.next() => Wake::Frame(frame),
            };

            match wake {
                Wake::Keepalive => {
                    stream
                        .send(Message::Text(PING_REQUEST.to_string()))
                        .await
                        .map_err(|e| connection_lost(&self.symbol, e))?;
                }
                Wake::Frame(Some(Ok(Message::Text(text)))) => {
                    if let Some(candle) = self.handle_text(&text)? {
                        return Ok(Some(candle));
                    }
                }
                Wake::Frame(Some(Ok(Message::Ping(payload)))) => {
                    stream
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| connection_lost(&self.symbol, e))?;
                }
                Wake::Frame(Some(Ok(Message::Close(frame)))) => {
                    debug!(symbol = %self.symbol, ?frame, "server closed stream");
                    self.stream = None;
                    return Ok(None);
                }
                Wake::Frame(Some(Ok(_))) => {}
                Wake::Frame(Some(Err(e))) => {
                    self.stream = None;
                    return Err(connection_lost(&self.symbol, e));
                }
                Wake::Frame(None) => {
                    self.stream = None;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!(symbol = %self.symbol, error = %e, "close handshake failed");
            }
        }
    }
}
