use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{HotelId, NotificationId, UserId};

/// Subscription channel an operator session can narrow to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Inventory,
    Billing,
    Checkout,
    System,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Inventory => "inventory",
            Channel::Billing => "billing",
            Channel::Checkout => "checkout",
            Channel::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Target {
    User { user_id: UserId },
    HotelAdmins { hotel_id: HotelId },
    Broadcast,
}

/// Ephemeral notification; never persisted by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: NotificationId,
    /// e.g. `damage`, `replacement`, `checkout_charge`, `checkout.pending_charges`.
    pub kind: String,
    pub channel: Channel,
    pub payload: serde_json::Value,
    pub target: Target,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        kind: impl Into<String>,
        channel: Channel,
        target: Target,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            kind: kind.into(),
            channel,
            payload,
            target,
            created_at: now,
        }
    }
}
