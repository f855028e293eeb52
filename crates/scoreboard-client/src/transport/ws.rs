//! WebSocket connector backed by tokio-tungstenite

use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::tungstenite::Error as WsError;

use scoreboard_core::prelude::*;

use super::connector::{Connector, Socket};

/// Production [`Connector`] that dials real WebSocket servers
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Socket> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|err| Error::transport(format!("Failed to connect to {url}: {err}")))?;
        debug!("WebSocket open: {}", url);

        let (sink, stream) = ws_stream.split();

        let sink = sink
            .sink_map_err(|err| Error::transport(format!("WebSocket send failed: {err}")))
            .with(|text: String| future::ready(Ok::<_, Error>(WsMessage::Text(text.into()))));

        let stream = stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Close(frame)) => {
                    debug!("WebSocket: received Close frame {:?}", frame);
                    None
                }
                // Ping/Pong/Binary: ignore
                Ok(_) => None,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => None,
                Err(err) => Some(Err(Error::transport(format!("WebSocket read error: {err}")))),
            })
        });

        Ok(Socket::new(Box::pin(sink), Box::pin(stream)))
    }
}
