//! Socket seam for the relay.
//!
//! The worker only needs "open", "send a text frame", "next text frame" and
//! "close". Production uses WebSockets; tests plug in an in-memory socket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::Error;

/// Opens relay sockets.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>, Error>;
}

/// One open duplex connection carrying text frames.
#[async_trait]
pub trait RelaySocket: Send {
    async fn send_text(&mut self, text: String) -> Result<(), Error>;

    /// Next text frame. `None` once the peer has closed the connection.
    async fn recv_text(&mut self) -> Option<Result<String, Error>>;

    async fn close(&mut self);
}

/// WebSocket connector (`ws://` and `wss://`).
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelaySocket>, Error> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| Error::Relay(format!("connect to {url} failed: {e}")))?;
        Ok(Box::new(WsSocket { stream }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RelaySocket for WsSocket {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Relay(e.to_string()))
    }

    async fn recv_text(&mut self) -> Option<Result<String, Error>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "Relay peer sent close");
                    return None;
                }
                // Pings are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(Error::Relay(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Closing sharing socket failed");
        }
    }
}
