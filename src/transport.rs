//! Stream transport.
//!
//! The client driver talks to [`Transport`] / [`Connection`] so the
//! reconnect logic can run against an in-memory transport in tests. The
//! production implementation is a plain WebSocket via tokio-tungstenite.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

/// Data frame delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Open a connection. An error is treated exactly like a close.
    async fn connect(&self, endpoint: &Url) -> Result<Self::Connection>;
}

#[async_trait]
pub trait Connection: Send + 'static {
    /// Next data frame. `None` or an error means the connection is gone.
    /// Must be cancel-safe; the driver polls it inside `select!`.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Best-effort close; errors are irrelevant to a connection being discarded.
    async fn close(&mut self);
}

// =============================================================================
// WEBSOCKET
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &Url) -> Result<WsConnection> {
        info!(endpoint = %endpoint, "🔌 Connecting to overlay stream");

        let ws_config = WebSocketConfig {
            max_message_size: Some(16 * 1024 * 1024),
            max_frame_size: Some(4 * 1024 * 1024),
            ..Default::default()
        };

        let (stream, response) = connect_async_with_config(endpoint.as_str(), Some(ws_config), false)
            .await
            .context("Failed to connect to overlay stream")?;

        info!("✅ Overlay stream connected (status: {})", response.status());

        Ok(WsConnection { stream })
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                Ok(Message::Binary(data)) => return Some(Ok(Frame::Binary(data))),
                Ok(Message::Ping(payload)) => {
                    debug!("Received ping, sending pong");
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        return Some(Err::<Frame, _>(e).context("Failed to send pong"));
                    }
                }
                Ok(Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    info!("Overlay stream closed by server: {:?}", frame);
                    return None;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    warn!(error = %e, "Overlay stream read error");
                    return Some(Err(e.into()));
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .context("Failed to send frame")
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing discarded connection");
        }
    }
}
