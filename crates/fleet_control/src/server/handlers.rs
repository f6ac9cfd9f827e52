//! Connection handling logic for control clients.
//!
//! Each connection is a WebSocket. Every text frame is one request and gets
//! exactly one text frame back on the same connection. Requests from one
//! connection are answered in order.

use super::connections::{ConnectionId, ConnectionRegistry};
use crate::error::{RequestError, ServerError};
use crate::messaging::RequestDispatcher;
use crate::response::ApiResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, trace, warn};

/// Handles a single control connection from handshake to close.
///
/// The connection must already be registered under `connection_id`; it is
/// removed from `registry` before this returns.
pub async fn handle_connection(
    stream: TcpStream,
    connection_id: ConnectionId,
    dispatcher: RequestDispatcher,
    registry: Arc<ConnectionRegistry>,
    idle_timeout: Option<Duration>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let result = serve_connection(stream, connection_id, &dispatcher, idle_timeout, &mut shutdown).await;
    registry.remove(connection_id).await;
    result
}

async fn serve_connection(
    stream: TcpStream,
    connection_id: ConnectionId,
    dispatcher: &RequestDispatcher,
    idle_timeout: Option<Duration>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        let next = async {
            match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, ws_receiver.next()).await.ok(),
                None => Some(ws_receiver.next().await),
            }
        };

        let frame = tokio::select! {
            frame = next => frame,
            _ = shutdown.recv() => {
                debug!("🛑 Closing control connection {} for shutdown", connection_id);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        };

        let reply = match frame {
            None => {
                debug!("⏱️ Control connection {} idle, closing", connection_id);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
            Some(None) => break,
            Some(Some(Ok(Message::Text(text)))) => {
                trace!("📨 Request from {}: {}", connection_id, text.as_str());
                dispatcher.handle_message(text.as_str()).await
            }
            Some(Some(Ok(Message::Binary(_)))) => ApiResponse::undecodable(&RequestError::MalformedRequest(
                "binary frames are not supported".to_string(),
            )),
            Some(Some(Ok(Message::Ping(data)))) => {
                let _ = ws_sender.send(Message::Pong(data)).await;
                continue;
            }
            Some(Some(Ok(Message::Close(_)))) => {
                debug!("🔌 Control client {} requested close", connection_id);
                break;
            }
            Some(Some(Ok(_))) => continue,
            Some(Some(Err(e))) => {
                error!("WebSocket error for connection {}: {}", connection_id, e);
                break;
            }
        };

        let text = match reply.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode reply for {}: {}", connection_id, e);
                continue;
            }
        };
        ws_sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ServerError::Network(format!("Failed to send reply: {e}")))?;
    }

    Ok(())
}
