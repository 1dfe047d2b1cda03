//! Multi-symbol stream orchestrator.
//!
//! Every symbol runs as its own task that owns a `StreamState`; tasks share
//! nothing but the callback registry. Emitted events are handed to one
//! worker per registered callback over a bounded queue, so ingestion never
//! waits on a callback. A callback that falls behind loses the events that
//! arrive while its queue is full; a failing callback only affects itself.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::config::{ReconnectPolicy, StreamConfig};
use crate::domain::error::ConfluenceError;
use crate::domain::pipeline::{ConnectionStatus, StreamState};
use crate::domain::signal::SignalEvent;
use crate::ports::feed_port::{FeedConnection, FeedConnector};

pub type CallbackResult = Result<(), String>;

type BlockingFn = dyn Fn(&SignalEvent) -> CallbackResult + Send + Sync;
type SuspendingFn = dyn Fn(SignalEvent) -> BoxFuture<'static, CallbackResult> + Send + Sync;

/// A consumer of emitted signals.
#[derive(Clone)]
pub enum SignalCallback {
    /// Runs on the blocking thread pool.
    Blocking(Arc<BlockingFn>),
    /// Runs as its own task.
    Suspending(Arc<SuspendingFn>),
}

impl SignalCallback {
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&SignalEvent) -> CallbackResult + Send + Sync + 'static,
    {
        SignalCallback::Blocking(Arc::new(f))
    }

    pub fn suspending<F, Fut>(f: F) -> Self
    where
        F: Fn(SignalEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        SignalCallback::Suspending(Arc::new(move |event| f(event).boxed()))
    }
}

impl fmt::Debug for SignalCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalCallback::Blocking(_) => f.write_str("SignalCallback::Blocking"),
            SignalCallback::Suspending(_) => f.write_str("SignalCallback::Suspending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackScope {
    Global,
    Symbol(String),
}

impl CallbackScope {
    pub fn matches(&self, symbol: &str) -> bool {
        match self {
            CallbackScope::Global => true,
            CallbackScope::Symbol(s) => s == symbol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb-{}", self.0)
    }
}

struct Registration {
    id: CallbackId,
    scope: CallbackScope,
    sink: mpsc::Sender<Arc<SignalEvent>>,
}

type Registry = Arc<RwLock<Vec<Registration>>>;

struct StreamHandle {
    stop: watch::Sender<bool>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<StreamState>,
}

/// Owns the per-symbol pipelines and the callback registry.
///
/// `start` and `register` spawn tasks and must be called from within a
/// Tokio runtime.
pub struct StreamOrchestrator {
    connector: Arc<dyn FeedConnector>,
    config: StreamConfig,
    callbacks: Registry,
    next_callback: AtomicU64,
    streams: Mutex<HashMap<String, StreamHandle>>,
}

impl StreamOrchestrator {
    pub fn new(connector: Arc<dyn FeedConnector>, config: StreamConfig) -> Self {
        StreamOrchestrator {
            connector,
            config,
            callbacks: Arc::new(RwLock::new(Vec::new())),
            next_callback: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn register(&self, scope: CallbackScope, callback: SignalCallback) -> CallbackId {
        let id = CallbackId(self.next_callback.fetch_add(1, Ordering::Relaxed));
        let sink = spawn_callback_worker(id, callback, self.config.callback_queue.max(1));
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, scope, sink });
        debug!(callback = %id, "callback registered");
        id
    }

    /// Remove a callback. Events already queued for it are still delivered.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|r| r.id != id);
        before != callbacks.len()
    }

    /// Start ingesting `symbol`. Returns false if it is already running.
    pub fn start(&self, symbol: &str, interval: &str) -> bool {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        if streams.get(symbol).is_some_and(|h| !h.task.is_finished()) {
            debug!(%symbol, "stream already running");
            return false;
        }

        let state = StreamState::new(symbol, interval, &self.config.pipeline);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let worker = StreamWorker {
            connector: Arc::clone(&self.connector),
            policy: self.config.reconnect,
            callbacks: Arc::clone(&self.callbacks),
            stop: stop_rx,
            status: status_tx,
        };
        let task = tokio::spawn(worker.run(state));
        info!(%symbol, %interval, "stream started");

        streams.insert(
            symbol.to_string(),
            StreamHandle {
                stop: stop_tx,
                status: status_rx,
                task,
            },
        );
        true
    }

    /// Start every symbol listed in the configuration.
    pub fn start_configured(&self) {
        for symbol in &self.config.symbols {
            self.start(symbol, &self.config.interval);
        }
    }

    /// Request termination of one stream and forget it. The task closes its
    /// connection at the next checkpoint and its state is dropped once it
    /// exits. Returns false for symbols that are not registered, including
    /// ones already stopped.
    pub fn stop(&self, symbol: &str) -> bool {
        let handle = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol);
        match handle {
            Some(handle) => {
                reap(symbol.to_string(), handle);
                true
            }
            None => false,
        }
    }

    /// Stop one stream and wait for its task, returning the final state.
    pub async fn stop_and_wait(&self, symbol: &str) -> Option<StreamState> {
        let handle = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol)?;
        handle.stop.send_replace(true);
        match handle.task.await {
            Ok(state) => Some(state),
            Err(e) => {
                error!(%symbol, error = %e, "stream task aborted");
                None
            }
        }
    }

    pub fn stop_all(&self) {
        let handles: Vec<(String, StreamHandle)> = self
            .streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (symbol, handle) in handles {
            reap(symbol, handle);
        }
    }

    pub fn status(&self, symbol: &str) -> Option<ConnectionStatus> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.get(symbol).map(|h| *h.status.borrow())
    }

    pub fn watch_status(&self, symbol: &str) -> Option<watch::Receiver<ConnectionStatus>> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.get(symbol).map(|h| h.status.clone())
    }

    pub fn symbols(&self) -> Vec<String> {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let mut symbols: Vec<String> = streams.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Stop every stream and wait for the tasks to finish. Returns the final
    /// state of each stream that exited cleanly.
    pub async fn shutdown(&self) -> BTreeMap<String, StreamState> {
        let handles: Vec<(String, StreamHandle)> = {
            let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
            streams.drain().collect()
        };
        for (_, handle) in &handles {
            handle.stop.send_replace(true);
        }

        let mut finished = BTreeMap::new();
        for (symbol, handle) in handles {
            match handle.task.await {
                Ok(state) => {
                    finished.insert(symbol, state);
                }
                Err(e) => error!(%symbol, error = %e, "stream task aborted"),
            }
        }
        info!(streams = finished.len(), "orchestrator shut down");
        finished
    }
}

impl Drop for StreamOrchestrator {
    fn drop(&mut self) {
        let streams = self.streams.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in streams.values() {
            handle.stop.send_replace(true);
        }
    }
}

/// Signal a removed stream to stop and drop its state once the task exits.
/// Outside a runtime the task is detached, which drops its output the same way.
fn reap(symbol: String, handle: StreamHandle) {
    handle.stop.send_replace(true);
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return;
    };
    runtime.spawn(async move {
        match handle.task.await {
            Ok(state) => debug!(%symbol, status = ?state.status(), "stream state released"),
            Err(e) => error!(%symbol, error = %e, "stream task aborted"),
        }
    });
}

enum SessionEnd {
    Stopped,
    Lost(String),
}

struct StreamWorker {
    connector: Arc<dyn FeedConnector>,
    policy: ReconnectPolicy,
    callbacks: Registry,
    stop: watch::Receiver<bool>,
    status: watch::Sender<ConnectionStatus>,
}

impl StreamWorker {
    fn publish(&self, state: &mut StreamState, status: ConnectionStatus) {
        state.set_status(status);
        self.status.send_replace(status);
    }

    async fn run(mut self, mut state: StreamState) -> StreamState {
        let symbol = state.symbol().to_string();
        let interval = state.interval().to_string();
        let mut first = true;

        loop {
            if *self.stop.borrow() {
                break;
            }

            if first {
                self.publish(&mut state, ConnectionStatus::Connecting);
                first = false;
            } else {
                let attempt = state.reconnect_attempts() + 1;
                let delay = self.policy.delay(attempt);
                self.publish(&mut state, ConnectionStatus::Reconnecting { attempt });
                info!(%symbol, attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
                tokio::select! {
                    biased;
                    _ = stop_requested(&mut self.stop) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let connected = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop) => break,
                result = self.connector.connect(&symbol, &interval) => result,
            };

            match connected {
                Ok(mut connection) => {
                    state.reset_attempts();
                    self.publish(&mut state, ConnectionStatus::Connected);
                    info!(%symbol, buffered = state.buffer().len(), "stream connected");

                    let end = self.ingest(connection.as_mut(), &mut state).await;
                    connection.close().await;
                    match end {
                        SessionEnd::Stopped => break,
                        SessionEnd::Lost(reason) => {
                            warn!(%symbol, %reason, "connection lost");
                        }
                    }
                }
                Err(e) => {
                    let attempts = state.record_failed_attempt();
                    warn!(%symbol, attempts, error = %e, "connect failed");
                    if attempts >= self.policy.max_attempts {
                        let err = ConfluenceError::ReconnectExhausted {
                            symbol: symbol.clone(),
                            attempts,
                        };
                        error!(%symbol, error = %err, "stream failed");
                        self.publish(&mut state, ConnectionStatus::Failed);
                        return state;
                    }
                }
            }
        }

        self.publish(&mut state, ConnectionStatus::Stopped);
        info!(%symbol, "stream stopped");
        state
    }

    async fn ingest(
        &mut self,
        connection: &mut dyn FeedConnection,
        state: &mut StreamState,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop) => return SessionEnd::Stopped,
                next = connection.next_candle() => next,
            };

            match next {
                Ok(Some(candle)) => {
                    if let Some(event) = state.on_candle(candle) {
                        dispatch(&self.callbacks, event);
                    }
                }
                Ok(None) => return SessionEnd::Lost("stream closed by server".to_string()),
                Err(ConfluenceError::MalformedMessage { reason }) => {
                    debug!(symbol = %state.symbol(), %reason, "malformed message dropped");
                }
                Err(e) => return SessionEnd::Lost(e.to_string()),
            }
        }
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    // A dropped sender means the orchestrator is gone; treat it as a stop.
    let _ = stop.wait_for(|&stop| stop).await;
}

fn dispatch(callbacks: &Registry, event: SignalEvent) {
    let sinks: Vec<(CallbackId, mpsc::Sender<Arc<SignalEvent>>)> = callbacks
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|r| r.scope.matches(&event.symbol))
        .map(|r| (r.id, r.sink.clone()))
        .collect();

    debug!(symbol = %event.symbol, direction = %event.direction, callbacks = sinks.len(), "dispatching signal");
    let event = Arc::new(event);
    for (id, sink) in sinks {
        match sink.try_send(Arc::clone(&event)) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    callback = %id,
                    symbol = %dropped.symbol,
                    timestamp = %dropped.timestamp,
                    "callback queue full, signal dropped"
                );
            }
            Err(TrySendError::Closed(_)) => debug!(callback = %id, "callback worker gone"),
        }
    }
}

fn spawn_callback_worker(
    id: CallbackId,
    callback: SignalCallback,
    queue: usize,
) -> mpsc::Sender<Arc<SignalEvent>> {
    let (tx, mut rx) = mpsc::channel::<Arc<SignalEvent>>(queue);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let symbol = event.symbol.clone();
            let outcome = match &callback {
                SignalCallback::Blocking(f) => {
                    let f = Arc::clone(f);
                    tokio::task::spawn_blocking(move || f(event.as_ref())).await
                }
                SignalCallback::Suspending(f) => tokio::spawn(f(SignalEvent::clone(&event))).await,
            };
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => {
                    let err = ConfluenceError::CallbackFailure { reason };
                    warn!(callback = %id, %symbol, error = %err, "callback returned an error");
                }
                Err(join) => {
                    warn!(callback = %id, %symbol, panicked = join.is_panic(), "callback aborted");
                }
            }
        }
        debug!(callback = %id, "callback worker finished");
    });
    tx
}
