//! Socket abstraction used by the transport task

use std::pin::Pin;

use futures_util::{Sink, Stream};

use scoreboard_core::Result;

/// Outbound half of an open socket; accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = scoreboard_core::Error> + Send>>;

/// Inbound half of an open socket; yields text frames until the peer closes.
/// An `Err` item means the connection failed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An open, text-framed socket
pub struct Socket {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Socket {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket").finish_non_exhaustive()
    }
}

/// Opens sockets on behalf of the transport.
///
/// Each call must produce a brand new socket; the transport never holds more
/// than one at a time.
#[trait_variant::make(Connector: Send)]
pub trait LocalConnector {
    /// Open a socket to `url`. Resolves once the connection is open.
    async fn connect(&self, url: &str) -> Result<Socket>;
}
