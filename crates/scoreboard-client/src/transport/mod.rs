//! Reconnecting WebSocket transport
//!
//! A [`Transport`] owns one background task that holds at most one socket at
//! a time, reconnects with exponential backoff, queues outbound frames while
//! disconnected and routes inbound frames to registered handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Transport                              │
//! │                                                               │
//! │  ┌──────────────┐          ┌──────────────────────────────┐   │
//! │  │  Public API  │          │   Background Task             │   │
//! │  │              │          │                                │   │
//! │  │  emit()    ──┼──cmd────▶│  connect / io loop / backoff  │   │
//! │  │  close()     │  chan    │                                │   │
//! │  │              │          │  frame → route()               │   │
//! │  │  on()/...  ──┼─────────▶│  status → StatusHandlers       │   │
//! │  └──────────────┘ handlers │  state  → ConnectionCell       │   │
//! │                            └──────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every public method is synchronous and never fails. Outbound frames reach
//! the task in call order.

pub mod connector;
pub mod ws;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use scoreboard_core::prelude::*;
use scoreboard_core::ConnectionState;

use crate::backoff::{Backoff, BackoffConfig};
use crate::hub::{Callback, DeliveryGate, Subscribers, Subscription};
use crate::protocol::{Envelope, ProtocolVersion, ServerMessage};

pub use connector::{Connector, FrameSink, FrameStream, LocalConnector, Socket};
pub use ws::TungsteniteConnector;

/// Callback for a named inbound event; receives the envelope `data`
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback for decoded structured frames
pub type MessageHandler = Arc<dyn Fn(ServerMessage) + Send + Sync>;

/// Status callback; invoked with no arguments
pub type StatusHandler = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    /// Fully resolved socket URL
    pub url: String,
    pub backoff: BackoffConfig,
    /// Decides how inbound frames are decoded
    pub dialect: ProtocolVersion,
}

impl TransportOptions {
    pub fn new(url: impl Into<String>, dialect: ProtocolVersion) -> Self {
        Self {
            url: url.into(),
            backoff: BackoffConfig::default(),
            dialect,
        }
    }
}

/// Optional status callbacks. Registering merges: only the slots that are
/// `Some` replace what is already registered.
#[derive(Clone, Default)]
pub struct StatusHandlers {
    pub connect: Option<StatusHandler>,
    pub disconnect: Option<StatusHandler>,
    pub error: Option<StatusHandler>,
    pub reconnecting: Option<StatusHandler>,
}

impl StatusHandlers {
    fn merge(&mut self, other: StatusHandlers) {
        if other.connect.is_some() {
            self.connect = other.connect;
        }
        if other.disconnect.is_some() {
            self.disconnect = other.disconnect;
        }
        if other.error.is_some() {
            self.error = other.error;
        }
        if other.reconnecting.is_some() {
            self.reconnecting = other.reconnecting;
        }
    }
}

impl std::fmt::Debug for StatusHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusHandlers")
            .field("connect", &self.connect.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .field("error", &self.error.is_some())
            .field("reconnecting", &self.reconnecting.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Shared state between handle and task
// ---------------------------------------------------------------------------

/// Commands from the public API to the background task
#[derive(Debug)]
enum TransportCommand {
    /// Send now if open, otherwise queue until the next open
    Emit(String),
    /// Send now if open, otherwise drop
    SendIfOpen(String),
    Close,
}

/// Connection state plus its subscribers. Changes are deduplicated.
struct ConnectionCell {
    current: Mutex<ConnectionState>,
    subscribers: Subscribers<ConnectionState>,
}

impl ConnectionCell {
    fn new(gate: Arc<DeliveryGate>) -> Self {
        Self {
            current: Mutex::new(ConnectionState::Connecting),
            subscribers: Subscribers::new(gate),
        }
    }

    fn get(&self) -> ConnectionState {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set(&self, next: ConnectionState) {
        self.subscribers.publish_with(|| {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if *current == next {
                return None;
            }
            debug!("Connection state: {} -> {}", *current, next);
            *current = next;
            Some(next)
        });
    }

    fn subscribe(&self, callback: Callback<ConnectionState>) -> Subscription {
        self.subscribers.subscribe_with(callback, || Some(self.get()))
    }
}

/// Handler tables consulted by the task for every event
#[derive(Default)]
struct Handlers {
    events: RwLock<HashMap<String, EventHandler>>,
    message: RwLock<Option<MessageHandler>>,
    status: RwLock<StatusHandlers>,
}

/// Everything the task needs besides the command receiver
struct TaskContext {
    dialect: ProtocolVersion,
    handlers: Arc<Handlers>,
    state: Arc<ConnectionCell>,
    closed: Arc<AtomicBool>,
}

impl TaskContext {
    fn status(&self) -> StatusHandlers {
        self.status_lock().clone()
    }

    fn status_lock(&self) -> std::sync::RwLockReadGuard<'_, StatusHandlers> {
        self.handlers
            .status
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn fire_reconnecting(&self) {
        self.state.set(ConnectionState::Connecting);
        if let Some(cb) = self.status().reconnecting {
            cb();
        }
    }

    fn fire_connect(&self) {
        self.state.set(ConnectionState::Open);
        if let Some(cb) = self.status().connect {
            cb();
        }
    }

    fn fire_error(&self) {
        self.state.set(ConnectionState::Closed);
        if let Some(cb) = self.status().error {
            cb();
        }
    }

    fn fire_disconnect(&self) {
        self.state.set(ConnectionState::Closed);
        if let Some(cb) = self.status().disconnect {
            cb();
        }
    }

    /// Decode one inbound text frame and hand it to the matching handler
    fn route(&self, text: &str) {
        match self.dialect {
            ProtocolVersion::Legacy => match Envelope::decode(text) {
                Ok(envelope) => {
                    let handler = self
                        .handlers
                        .events
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .get(&envelope.event)
                        .cloned();
                    match handler {
                        Some(handler) => handler(envelope.data_or_null()),
                        None => debug!("No handler for event '{}'", envelope.event),
                    }
                }
                Err(err) => warn!("Dropping inbound frame: {}", err),
            },
            ProtocolVersion::V2 => match ServerMessage::decode(text) {
                Ok(message) => {
                    let handler = self
                        .handlers
                        .message
                        .read()
                        .unwrap_or_else(|e| e.into_inner())
                        .clone();
                    match handler {
                        Some(handler) => handler(message),
                        None => debug!("No message handler for {} frame", message.kind()),
                    }
                }
                Err(err) => warn!("Dropping inbound frame: {}", err),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Transport handle
// ---------------------------------------------------------------------------

/// Cheap-to-clone handle to a running transport task.
///
/// Dropping every handle shuts the task down as if [`Transport::close`] had
/// been called.
#[derive(Clone)]
pub struct Transport {
    url: Arc<str>,
    cmd_tx: mpsc::UnboundedSender<TransportCommand>,
    handlers: Arc<Handlers>,
    state: Arc<ConnectionCell>,
    closed: Arc<AtomicBool>,
    done_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.url)
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

impl Transport {
    /// Start building a transport. Handlers registered on the builder are in
    /// place before the first connection attempt.
    pub fn builder(options: TransportOptions) -> TransportBuilder {
        TransportBuilder {
            options,
            handlers: Handlers::default(),
            gate: None,
        }
    }

    /// Spawn a transport with no handlers registered yet.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<C>(options: TransportOptions, connector: C) -> Transport
    where
        C: Connector + Sync + 'static,
    {
        Self::builder(options).spawn(connector)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a generic `{event, data}` frame, queueing it while disconnected
    pub fn emit(&self, event: &str, data: Option<Value>) {
        match Envelope::new(event, data).encode() {
            Ok(frame) => self.send_frame(frame),
            Err(err) => warn!("Failed to encode '{}' event: {}", event, err),
        }
    }

    /// Send a pre-serialized frame, queueing it while disconnected
    pub fn send_frame(&self, frame: String) {
        let _ = self.dispatch(TransportCommand::Emit(frame));
    }

    /// Send a pre-serialized frame only if the socket is open; otherwise drop it.
    ///
    /// The decision is made against the state at call time, so a frame issued
    /// while connecting never goes out on the socket that opens next. Returns
    /// `false` when the frame was dropped.
    pub fn send_if_open(&self, frame: String) -> bool {
        if self.state.get() != ConnectionState::Open {
            warn!("Dropping frame: socket is not open");
            return false;
        }
        self.dispatch(TransportCommand::SendIfOpen(frame))
    }

    fn dispatch(&self, command: TransportCommand) -> bool {
        if self.cmd_tx.send(command).is_err() {
            debug!("Transport task has exited; dropping outbound frame");
            return false;
        }
        true
    }

    /// Register the handler for `event`, replacing any previous one
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.handlers
            .events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(event.into(), Arc::new(handler));
    }

    /// Register the structured-frame handler, replacing any previous one
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(ServerMessage) + Send + Sync + 'static,
    {
        *self
            .handlers
            .message
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(handler));
    }

    /// Merge status callbacks into the registered set
    pub fn on_status(&self, handlers: StatusHandlers) {
        self.handlers
            .status
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .merge(handlers);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Observe connection state; `callback` runs immediately with the current
    /// value and again on every change
    pub fn subscribe_connection<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.state.subscribe(Arc::new(callback))
    }

    /// Stop reconnecting and close the socket. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing transport for {}", self.url);
        let _ = self.dispatch(TransportCommand::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the background task has exited
    pub async fn wait_closed(&self) {
        let mut done_rx = self.done_rx.clone();
        // An error means the sender is gone, which only happens after exit
        let _ = done_rx.wait_for(|done| *done).await;
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Registers handlers before the task starts
pub struct TransportBuilder {
    options: TransportOptions,
    handlers: Handlers,
    gate: Option<Arc<DeliveryGate>>,
}

impl TransportBuilder {
    pub fn on<F>(self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.handlers
            .events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(event.into(), Arc::new(handler));
        self
    }

    pub fn on_message<F>(self, handler: F) -> Self
    where
        F: Fn(ServerMessage) + Send + Sync + 'static,
    {
        *self
            .handlers
            .message
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(handler));
        self
    }

    pub fn on_status(self, handlers: StatusHandlers) -> Self {
        self.handlers
            .status
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .merge(handlers);
        self
    }

    /// Serialize connection-state delivery with other subscriber lists
    pub fn gate(mut self, gate: Arc<DeliveryGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Spawn the background task and return its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<C>(self, connector: C) -> Transport
    where
        C: Connector + Sync + 'static,
    {
        let gate = self.gate.unwrap_or_else(DeliveryGate::new);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = watch::channel(false);

        let handlers = Arc::new(self.handlers);
        let state = Arc::new(ConnectionCell::new(gate));
        let closed = Arc::new(AtomicBool::new(false));
        let url: Arc<str> = Arc::from(self.options.url.as_str());

        let ctx = TaskContext {
            dialect: self.options.dialect,
            handlers: Arc::clone(&handlers),
            state: Arc::clone(&state),
            closed: Arc::clone(&closed),
        };

        info!(
            "Starting {} transport for {}",
            self.options.dialect, self.options.url
        );

        tokio::spawn(run_transport_task(
            self.options.url,
            connector,
            cmd_rx,
            ctx,
            Backoff::new(self.options.backoff),
            done_tx,
        ));

        Transport {
            url,
            cmd_tx,
            handlers,
            state,
            closed,
            done_rx,
        }
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// How one connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// Connection lost; reconnect unless closed
    Lost,
    /// Close requested or every handle dropped
    Shutdown,
}

async fn run_transport_task<C: Connector>(
    url: String,
    connector: C,
    mut cmd_rx: mpsc::UnboundedReceiver<TransportCommand>,
    ctx: TaskContext,
    mut backoff: Backoff,
    done_tx: watch::Sender<bool>,
) {
    let mut pending: VecDeque<String> = VecDeque::new();

    loop {
        if ctx.closed.load(Ordering::SeqCst) {
            break;
        }

        ctx.fire_reconnecting();
        debug!("Connecting to {}", url);

        let attempt = connector.connect(&url);
        tokio::pin!(attempt);

        // ── Wait for the socket, still accepting commands ────────────
        let outcome = loop {
            tokio::select! {
                biased;
                cmd = cmd_rx.recv() => match cmd {
                    Some(TransportCommand::Emit(frame)) => pending.push_back(frame),
                    Some(TransportCommand::SendIfOpen(_)) => {
                        warn!("Dropping frame: socket is not open");
                    }
                    Some(TransportCommand::Close) | None => break None,
                },
                result = &mut attempt => break Some(result),
            }
        };

        let exit = match outcome {
            Some(Ok(mut socket)) if ctx.closed.load(Ordering::SeqCst) => {
                debug!("Closed while connecting; discarding new socket");
                let _ = socket.sink.close().await;
                LoopExit::Shutdown
            }
            Some(Ok(socket)) => {
                info!("Connected to {}", url);
                backoff.reset();
                ctx.fire_connect();
                run_io_loop(socket, &mut cmd_rx, &mut pending, &ctx).await
            }
            Some(Err(err)) => {
                warn!("Connection attempt failed: {}", err);
                ctx.fire_error();
                LoopExit::Lost
            }
            None => {
                debug!("Abandoning connection attempt to {}", url);
                LoopExit::Shutdown
            }
        };

        ctx.fire_disconnect();

        if exit == LoopExit::Shutdown || ctx.closed.load(Ordering::SeqCst) {
            break;
        }

        // ── Backoff before the next attempt ──────────────────────────
        let delay = backoff.next_delay();
        info!("Reconnecting to {} in {:?}", url, delay);
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        let shutdown = loop {
            tokio::select! {
                biased;
                cmd = cmd_rx.recv() => match cmd {
                    Some(TransportCommand::Emit(frame)) => pending.push_back(frame),
                    Some(TransportCommand::SendIfOpen(_)) => {
                        warn!("Dropping frame: socket is not open");
                    }
                    Some(TransportCommand::Close) | None => break true,
                },
                _ = &mut sleep => break false,
            }
        };
        if shutdown {
            break;
        }
    }

    if !pending.is_empty() {
        debug!("Discarding {} queued frame(s) on shutdown", pending.len());
    }
    ctx.state.set(ConnectionState::Closed);
    debug!("Transport task for {} exiting", url);
    done_tx.send_replace(true);
}

/// Run one open connection until it is lost or shut down.
///
/// Flushes the pending queue first, in order. A failed flush drops the
/// connection and keeps the unsent frames for the next one.
async fn run_io_loop(
    socket: Socket,
    cmd_rx: &mut mpsc::UnboundedReceiver<TransportCommand>,
    pending: &mut VecDeque<String>,
    ctx: &TaskContext,
) -> LoopExit {
    let Socket {
        mut sink,
        mut stream,
    } = socket;

    if !pending.is_empty() {
        debug!("Flushing {} queued frame(s)", pending.len());
    }
    while let Some(frame) = pending.pop_front() {
        if let Err(err) = sink.send(frame.clone()).await {
            warn!(
                "Failed to flush queued frame, keeping {} for the next connection: {}",
                pending.len() + 1,
                err
            );
            pending.push_front(frame);
            ctx.fire_error();
            let _ = sink.close().await;
            return LoopExit::Lost;
        }
    }

    loop {
        tokio::select! {
            // ── Incoming frame ───────────────────────────────────────
            frame = stream.next() => match frame {
                Some(Ok(text)) => {
                    debug!("Received frame ({} bytes)", text.len());
                    ctx.route(&text);
                }
                Some(Err(err)) => {
                    warn!("Socket error: {}", err);
                    ctx.fire_error();
                    let _ = sink.close().await;
                    return LoopExit::Lost;
                }
                None => {
                    info!("Socket closed by peer");
                    return LoopExit::Lost;
                }
            },

            // ── Outgoing command from the public API ─────────────────
            cmd = cmd_rx.recv() => match cmd {
                Some(TransportCommand::Emit(frame)) | Some(TransportCommand::SendIfOpen(frame)) => {
                    if let Err(err) = sink.send(frame).await {
                        warn!("Failed to send frame: {}", err);
                    }
                }
                Some(TransportCommand::Close) | None => {
                    let _ = sink.close().await;
                    return LoopExit::Shutdown;
                }
            },
        }
    }
}
