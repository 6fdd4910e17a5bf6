//! Wire messages exchanged with a connected session (JSON text frames).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{NotificationId, UserId};

use crate::event::{Channel, NotificationEvent};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth { token: String },
    Ping,
    Pong,
    Subscribe { channels: Vec<Channel> },
    MarkRead { ids: Vec<NotificationId> },
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        user_id: UserId,
        role: String,
    },
    Ping {
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Subscribed {
        channels: Vec<Channel>,
    },
    MarkRead {
        ids: Vec<NotificationId>,
    },
    Notification {
        notification: NotificationEvent,
    },
    AdminNotification {
        notification: NotificationEvent,
    },
    SystemNotification {
        notification: NotificationEvent,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::Ping { .. } => "ping",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Subscribed { .. } => "subscribed",
            ServerMessage::MarkRead { .. } => "mark_read",
            ServerMessage::Notification { .. } => "notification",
            ServerMessage::AdminNotification { .. } => "admin_notification",
            ServerMessage::SystemNotification { .. } => "system_notification",
            ServerMessage::Error { .. } => "error",
        }
    }
}
