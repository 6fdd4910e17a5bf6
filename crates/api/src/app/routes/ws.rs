//! Realtime notification socket.
//!
//! ```text
//! upgrade ─▶ handshake (header / ?token= / first `auth` frame) ─▶ register with hub
//!    reader: text frames ─▶ hub.handle_text
//!    writer: ChannelConnection queue ─▶ socket
//! ```
//!
//! A failed handshake closes with the authenticator's close code and never
//! reaches the hub.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Extension, Query, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde::Deserialize;

use innkeep_notifications::{ChannelConnection, Connection, Outbound};

use crate::app::services::AppServices;
use crate::middleware::extract_bearer;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn connect(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let credential = extract_bearer(&headers).map(str::to_string).or(query.token);
    upgrade.on_upgrade(move |socket| session(services, socket, credential))
}

async fn session(services: Arc<AppServices>, socket: WebSocket, credential: Option<String>) {
    let (mut sink, mut stream) = socket.split();

    let identity = match services
        .authenticator
        .handshake(credential, first_text(&mut stream))
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(error = %e, code = e.close_code(), "connection refused");
            if let Err(send) = sink.send(close_frame(e.close_code(), &e.to_string())).await {
                tracing::debug!(error = %send, "close frame not delivered");
            }
            return;
        }
    };

    let (connection, mut outbound) = ChannelConnection::new();
    let connection_id = connection.id();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let (message, last) = match frame {
                Outbound::Text(text) => (Message::Text(text), false),
                Outbound::Close { code, reason } => (close_frame(code, &reason), true),
            };
            if let Err(e) = sink.send(message).await {
                tracing::debug!(connection_id = %connection_id, error = %e, "socket send failed");
                break;
            }
            if last {
                break;
            }
        }
        tracing::debug!(connection_id = %connection_id, "socket writer finished");
    });

    services.hub.register_connection(Arc::new(connection), identity);

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => services.hub.handle_text(connection_id, &text),
            Message::Close(_) => break,
            // Transport-level ping/pong is answered by the socket itself.
            _ => {}
        }
    }

    services.hub.remove_connection(connection_id);
    writer.abort();
    tracing::debug!(connection_id = %connection_id, "socket closed");
}

/// Next text frame, skipping transport frames; `None` once the peer goes away.
async fn first_text(stream: &mut SplitStream<WebSocket>) -> Option<String> {
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => return Some(text),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

fn close_frame(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Owned(reason.to_string()),
    }))
}
