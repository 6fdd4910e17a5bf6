use thiserror::Error;
use tokio::sync::mpsc;

use innkeep_core::ConnectionId;

use crate::protocol::ServerMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// A live session the hub can push to.
///
/// `send` must not block; a failure marks the connection dead.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn send(&self, message: &ServerMessage) -> Result<(), DeliveryError>;

    fn close(&self, code: u16, reason: &str);
}

/// Frame queued for a socket writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// Connection backed by an unbounded channel drained by the transport's writer.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelConnection {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: ConnectionId::new(),
                tx,
            },
            rx,
        )
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, message: &ServerMessage) -> Result<(), DeliveryError> {
        let text = serde_json::to_string(message).map_err(|e| DeliveryError::Encode(e.to_string()))?;
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| DeliveryError::Closed)
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_fails_once_the_reader_is_gone() {
        let (conn, rx) = ChannelConnection::new();
        let ping = ServerMessage::Pong {
            timestamp: chrono::Utc::now(),
        };
        assert!(conn.send(&ping).is_ok());
        drop(rx);
        assert_eq!(conn.send(&ping), Err(DeliveryError::Closed));
    }
}
