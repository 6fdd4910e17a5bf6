use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{BookingId, HotelId, InvoiceId, Money, RoomId, TransactionId};
use innkeep_events::Event;

use crate::transaction::{TransactionStatus, TransactionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionPosted {
        hotel_id: HotelId,
        room_id: RoomId,
        booking_id: Option<BookingId>,
        transaction_id: TransactionId,
        #[serde(rename = "transaction_type")]
        kind: TransactionType,
        status: TransactionStatus,
        total_amount: Money,
        charged_to_guest: bool,
        occurred_at: DateTime<Utc>,
    },
    TransactionCompleted {
        hotel_id: HotelId,
        room_id: RoomId,
        booking_id: Option<BookingId>,
        transaction_id: TransactionId,
        #[serde(rename = "transaction_type")]
        kind: TransactionType,
        total_amount: Money,
        charged_to_guest: bool,
        occurred_at: DateTime<Utc>,
    },
    TransactionCancelled {
        hotel_id: HotelId,
        room_id: RoomId,
        booking_id: Option<BookingId>,
        transaction_id: TransactionId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    InvoiceReconciled {
        hotel_id: HotelId,
        booking_id: BookingId,
        invoice_id: InvoiceId,
        line_count: usize,
        total_amount: Money,
        occurred_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    pub fn booking_id(&self) -> Option<BookingId> {
        match self {
            LedgerEvent::TransactionPosted { booking_id, .. }
            | LedgerEvent::TransactionCompleted { booking_id, .. }
            | LedgerEvent::TransactionCancelled { booking_id, .. } => *booking_id,
            LedgerEvent::InvoiceReconciled { booking_id, .. } => Some(*booking_id),
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionPosted { .. } => "billing.transaction.posted",
            LedgerEvent::TransactionCompleted { .. } => "billing.transaction.completed",
            LedgerEvent::TransactionCancelled { .. } => "billing.transaction.cancelled",
            LedgerEvent::InvoiceReconciled { .. } => "billing.invoice.reconciled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::TransactionPosted { occurred_at, .. }
            | LedgerEvent::TransactionCompleted { occurred_at, .. }
            | LedgerEvent::TransactionCancelled { occurred_at, .. }
            | LedgerEvent::InvoiceReconciled { occurred_at, .. } => *occurred_at,
        }
    }
}
