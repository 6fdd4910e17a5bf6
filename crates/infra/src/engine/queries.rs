use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_billing::{InventoryTransaction, TransactionStatus, TransactionType};
use innkeep_core::{BookingId, ItemId, Money, RoomId, TransactionId, UserId};
use innkeep_events::EventBus;
use innkeep_inventory::{InspectionRecord, RoomInventorySnapshot};

use super::InventoryEngine;
use crate::error::EngineError;
use crate::event::DomainEnvelope;
use crate::store::{InventoryStore, LedgerKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestChargeItem {
    pub item_id: ItemId,
    pub name: String,
    pub units: u32,
    pub amount: Money,
}

/// Guest-facing view of one charged transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCharge {
    pub transaction_id: TransactionId,
    pub booking_id: BookingId,
    #[serde(rename = "transaction_type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub items: Vec<GuestChargeItem>,
    pub total_amount: Money,
    pub date: DateTime<Utc>,
}

impl<S, B> InventoryEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<DomainEnvelope>,
{
    /// Current snapshot of a room, with its status evaluated as of now.
    pub fn get_room_inventory(&self, room_id: RoomId) -> Result<RoomInventorySnapshot, EngineError> {
        let mut snapshot = self.require_snapshot(room_id)?;
        snapshot.refresh_status(Utc::now(), self.config.staleness, false);
        Ok(snapshot)
    }

    pub fn inspection_history(&self, room_id: RoomId) -> Result<Vec<InspectionRecord>, EngineError> {
        Ok(self.store.inspections(room_id)?)
    }

    pub fn get_transaction(&self, transaction_id: TransactionId) -> Result<InventoryTransaction, EngineError> {
        self.require_transaction(transaction_id)
    }

    /// Every transaction of a booking, in ledger order.
    pub fn booking_ledger(&self, booking_id: BookingId) -> Result<Vec<InventoryTransaction>, EngineError> {
        Ok(self.store.ledger(LedgerKey::Booking(booking_id))?.transactions)
    }

    /// Charges billed to a guest, optionally narrowed to one of their bookings.
    /// Cancelled transactions are left out.
    pub fn get_guest_charges(
        &self,
        guest_id: UserId,
        booking_id: Option<BookingId>,
    ) -> Result<Vec<GuestCharge>, EngineError> {
        let mut charges = Vec::new();
        for booking in self
            .store
            .guest_bookings(guest_id)?
            .into_iter()
            .filter(|b| booking_id.is_none_or(|id| id == b.booking_id))
        {
            let catalog = self.store.catalog(booking.hotel_id)?;
            let ledger = self.store.ledger(LedgerKey::Booking(booking.booking_id))?;
            for tx in ledger
                .transactions
                .iter()
                .filter(|t| t.charged_to_guest() && t.status() != TransactionStatus::Cancelled)
            {
                let items = tx
                    .entries()
                    .iter()
                    .filter(|e| e.chargeable)
                    .map(|e| GuestChargeItem {
                        item_id: e.item_id,
                        name: catalog
                            .get(e.item_id)
                            .map(|d| d.name.clone())
                            .unwrap_or_else(|| e.item_id.to_string()),
                        units: e.units,
                        amount: e.total_cost,
                    })
                    .collect();
                charges.push(GuestCharge {
                    transaction_id: tx.id_typed(),
                    booking_id: booking.booking_id,
                    kind: tx.kind(),
                    status: tx.status(),
                    items,
                    total_amount: tx.chargeable_amount(),
                    date: tx.created_at(),
                });
            }
        }
        charges.sort_by_key(|c| c.date);
        Ok(charges)
    }
}
