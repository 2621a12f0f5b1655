//! WebSocket driver.
//!
//! `open` connects, then splits the stream into a reader task and a writer
//! task bridged to the runtime by channels. Dropping the connection aborts the
//! reader; the writer drains what was queued (including the close frame) and
//! exits when its channel closes.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::AbortHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::COOKIE},
    },
};

use super::cookie_header;
use crate::{Driver, TransportEvent};

/// Capacity of the per-connection frame channels.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Address or header could not be turned into a handshake request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Handshake failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No socket is open.
    #[error("socket closed")]
    Closed,
}

/// One open socket.
struct Connection {
    outgoing: mpsc::Sender<Message>,
    incoming: mpsc::Receiver<TransportEvent>,
    reader: AbortHandle,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// WebSocket implementation of [`Driver`].
#[derive(Default)]
pub struct WsDriver {
    token: Option<String>,
    connection: Option<Connection>,
}

impl WsDriver {
    /// Create a driver that presents `token` as the session cookie.
    pub fn new(token: Option<String>) -> Self {
        Self { token, connection: None }
    }

    /// True while a socket is open.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }
}

impl Driver for WsDriver {
    type Error = TransportError;

    async fn open(&mut self, url: &str) -> Result<(), Self::Error> {
        self.connection = None;

        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        if let Some(token) = &self.token {
            let cookie = HeaderValue::from_str(&cookie_header(token))
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(COOKIE, cookie);
        }

        let (stream, _response) =
            connect_async(request).await.map_err(|e| TransportError::Connection(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (outgoing, mut outgoing_rx) = mpsc::channel::<Message>(CHANNEL_CAPACITY);
        let (incoming_tx, incoming) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(err) = write.send(message).await {
                    tracing::debug!(%err, "websocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if incoming_tx.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                            return;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(
                            || "closed by server".to_string(),
                            |f| format!("closed by server: {} {}", f.code, f.reason),
                        );
                    },
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::debug!(len = bytes.len(), "ignoring binary frame");
                    },
                    Some(Ok(_)) => {},
                    Some(Err(err)) => break err.to_string(),
                    None => break "stream ended".to_string(),
                }
            };
            let _ = incoming_tx.send(TransportEvent::Closed { reason }).await;
        });

        self.connection = Some(Connection {
            outgoing,
            incoming,
            reader: reader.abort_handle(),
        });
        Ok(())
    }

    async fn send_frame(&mut self, text: String) -> Result<(), Self::Error> {
        let connection = self.connection.as_ref().ok_or(TransportError::Closed)?;
        connection.outgoing.send(Message::Text(text.into())).await.map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        match self.connection.as_mut() {
            Some(connection) => connection.incoming.recv().await,
            None => None,
        }
    }

    async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            // Best effort; the writer may already be gone.
            let _ = connection.outgoing.send(Message::Close(None)).await;
        }
    }
}
