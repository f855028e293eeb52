//! Scripted in-memory connector for transport and client tests
//!
//! Every call to [`MockConnector`]'s `connect` records a [`MockSocket`] and
//! waits until the test resolves it with [`MockSocket::open`] or
//! [`MockSocket::fail`]. Once open, the test can push inbound frames, inject
//! read errors or close the socket from the server side, and inspect every
//! frame the client sent.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::{stream, Sink};
use tokio::sync::{mpsc, oneshot};

use scoreboard_core::{Error, Result};

use crate::transport::{Connector, Socket};

type Inbound = Result<String>;

struct SocketShared {
    url: String,
    outcome: Mutex<Option<oneshot::Sender<Result<()>>>>,
    sent: Mutex<Vec<String>>,
    client_closed: AtomicBool,
    fail_sends: AtomicBool,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
}

/// Test-side handle to one recorded connection attempt
#[derive(Clone)]
pub struct MockSocket {
    shared: Arc<SocketShared>,
}

impl std::fmt::Debug for MockSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSocket")
            .field("url", &self.shared.url)
            .field("sent", &self.sent().len())
            .field("client_closed", &self.is_client_closed())
            .finish()
    }
}

impl MockSocket {
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Complete the connection attempt successfully
    pub fn open(&self) {
        self.resolve(Ok(()));
    }

    /// Fail the connection attempt
    pub fn fail(&self, reason: &str) {
        self.resolve(Err(Error::transport(reason.to_string())));
    }

    fn resolve(&self, outcome: Result<()>) {
        if let Some(tx) = self.shared.outcome.lock().unwrap().take() {
            let _ = tx.send(outcome);
        }
    }

    /// Deliver a text frame from the server
    pub fn message(&self, text: impl Into<String>) {
        self.push(Ok(text.into()));
    }

    /// Inject a read error on the open socket
    pub fn error(&self, reason: &str) {
        self.push(Err(Error::transport(reason.to_string())));
    }

    fn push(&self, item: Inbound) {
        if let Some(tx) = self.shared.inbound_tx.lock().unwrap().as_ref() {
            let _ = tx.send(item);
        }
    }

    /// Close the socket from the server side
    pub fn close(&self) {
        self.shared.inbound_tx.lock().unwrap().take();
    }

    /// Frames the client has written, in order
    pub fn sent(&self) -> Vec<String> {
        self.shared.sent.lock().unwrap().clone()
    }

    /// Frames the client has written, parsed as JSON
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    /// `true` once the client closed its side
    pub fn is_client_closed(&self) -> bool {
        self.shared.client_closed.load(Ordering::SeqCst)
    }

    /// Make subsequent client writes fail
    pub fn fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }
}

/// Sink half handed to the transport
struct RecordingSink {
    shared: Arc<SocketShared>,
}

impl Sink<String> for RecordingSink {
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<()> {
        if self.shared.client_closed.load(Ordering::SeqCst) {
            return Err(Error::transport("socket already closed"));
        }
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::transport("simulated send failure"));
        }
        self.shared.sent.lock().unwrap().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.shared.client_closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Connector that records every attempt as a [`MockSocket`]
#[derive(Clone, Default)]
pub struct MockConnector {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnector")
            .field("attempts", &self.attempts())
            .finish()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connection attempts so far
    pub fn attempts(&self) -> usize {
        self.sockets.lock().unwrap().len()
    }

    /// The `index`-th attempt. Panics when it has not happened yet.
    pub fn socket(&self, index: usize) -> MockSocket {
        self.sockets
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no connection attempt #{index}"))
    }

    /// The most recent attempt. Panics when there has been none.
    pub fn last(&self) -> MockSocket {
        self.sockets
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection attempts yet")
    }
}

impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Socket> {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SocketShared {
            url: url.to_string(),
            outcome: Mutex::new(Some(outcome_tx)),
            sent: Mutex::new(Vec::new()),
            client_closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(Some(inbound_rx)),
        });
        self.sockets.lock().unwrap().push(MockSocket {
            shared: Arc::clone(&shared),
        });

        outcome_rx
            .await
            .map_err(|_| Error::transport("connection attempt abandoned"))??;

        let inbound_rx = shared
            .inbound_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::transport("socket already consumed"))?;
        let inbound = stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(Socket::new(
            Box::pin(RecordingSink { shared }),
            Box::pin(inbound),
        ))
    }
}

/// Let spawned tasks run until they block
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
