use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async_with_config;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::WebSocketConfig;
use uuid::Uuid;

use crate::models::config_models::Config;
use crate::models::websocket_message_model::{ClientMessage, ServerMessage};
use crate::services::validation_services::request_validation_service::ValidationError;
use crate::services::websocket::websocket_router_service::{ConnectionRouter, WebSocketGateway};
use crate::utils::helper_utils::sanitize_code_content;

/// Accepts WebSocket connections until the token fires, one task per
/// socket. The caller owns the listener, so tests can bind port 0 and read
/// the address back.
pub async fn run_websocket_server(
    listener: TcpListener,
    gateway: WebSocketGateway,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    info!("WebSocket server listening on {}", addr);
    let open_connections = Arc::new(AtomicUsize::new(0));
    let max_connections = Config::global().websocket_pool_config.max_connections;

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.cancelled() => {
                info!("WebSocket server on {} shutting down", addr);
                return Ok(());
            }
        };

        if open_connections.load(Ordering::SeqCst) >= max_connections {
            warn!(
                "refusing connection from {}: {} connections already open",
                peer, max_connections
            );
            drop(stream);
            continue;
        }

        let gateway = gateway.clone();
        let counter = open_connections.clone();
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, gateway).await {
                debug!("connection from {} ended with error: {}", peer, e);
            }
            counter.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    gateway: WebSocketGateway,
) -> Result<(), tungstenite::Error> {
    let config = Config::global();
    let max_message_bytes = config.websocket_pool_config.max_message_bytes;
    // The protocol-level caps make an oversized frame fail at its header,
    // before the payload is buffered.
    let ws_config = WebSocketConfig {
        max_message_size: Some(max_message_bytes),
        max_frame_size: Some(max_message_bytes),
        ..WebSocketConfig::default()
    };
    let handshake = accept_async_with_config(stream, Some(ws_config));
    let websocket = match timeout(config.handshake_timeout(), handshake).await {
        Ok(accepted) => accepted?,
        Err(_) => {
            debug!("dropping socket: handshake incomplete after the deadline");
            return Ok(());
        }
    };
    let (mut sink, mut source) = websocket.split();
    let connection_id = Uuid::new_v4().to_string();
    info!("new WebSocket connection {}", connection_id);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // A single writer task owns the sink; everything else only enqueues.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("failed to encode server message: {}", e);
                    continue;
                }
            };
            if sink.send(tungstenite::Message::Text(payload)).await.is_err() {
                break;
            }
        }
        let _ = sink.send(tungstenite::Message::Close(None)).await;
    });

    let mut router = ConnectionRouter::new(gateway, connection_id.clone(), outbound_tx.clone());

    while let Some(message) = source.next().await {
        match message {
            Ok(tungstenite::Message::Text(input_text)) => {
                let text = sanitize_code_content(&input_text);
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(parsed) => router.route(parsed),
                    Err(e) => {
                        debug!(
                            "connection {} sent an unparseable frame: {}",
                            connection_id, e
                        );
                        router.reply_error(
                            ValidationError::MalformedMessage(e.to_string()).to_string(),
                        );
                    }
                }
            }
            Ok(tungstenite::Message::Close(_)) => {
                debug!("connection {} closed by client", connection_id);
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Capacity(_)) => {
                warn!(
                    "connection {} sent a frame over the {} byte limit",
                    connection_id, max_message_bytes
                );
                router.reply_error(format!(
                    "message exceeds the {} byte limit",
                    max_message_bytes
                ));
                break;
            }
            Err(e) => {
                debug!("connection {} transport error: {}", connection_id, e);
                break;
            }
        }
    }

    router.handle_disconnect();
    drop(router);
    drop(outbound_tx);
    let _ = writer.await;
    info!("connection {} closed", connection_id);
    Ok(())
}
