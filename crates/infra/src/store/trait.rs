use std::sync::Arc;

use serde::{Deserialize, Serialize};

use innkeep_billing::InventoryTransaction;
use innkeep_checkout::CheckoutInspection;
use innkeep_core::{BookingId, CheckoutId, HotelId, RoomId, TemplateId, TransactionId, UserId};
use innkeep_inventory::{InspectionRecord, ItemCatalog, RoomInventorySnapshot, RoomTemplate};

use crate::error::StoreError;
use crate::store::unit_of_work::{Committed, UnitOfWork};

/// Per-booking ledger, or per-room for vacant-room replacements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum LedgerKey {
    Booking(BookingId),
    Room(RoomId),
}

impl LedgerKey {
    pub fn for_transaction(room_id: RoomId, booking_id: Option<BookingId>) -> Self {
        match booking_id {
            Some(b) => LedgerKey::Booking(b),
            None => LedgerKey::Room(room_id),
        }
    }
}

/// A ledger read together with the sequence a writer must expect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerView {
    pub sequence: u64,
    pub transactions: Vec<InventoryTransaction>,
}

/// Booking → room/guest index, maintained from snapshot attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub hotel_id: HotelId,
    pub room_id: RoomId,
    pub guest_id: UserId,
}

pub trait InventoryStore: Send + Sync {
    /// The hotel's catalog; an empty version-0 catalog if none was stored yet.
    fn catalog(&self, hotel_id: HotelId) -> Result<ItemCatalog, StoreError>;

    /// A specific template version, or the latest when `version` is `None`.
    fn template(&self, template_id: TemplateId, version: Option<u32>) -> Result<RoomTemplate, StoreError>;

    /// Latest version of every template of the hotel.
    fn templates(&self, hotel_id: HotelId) -> Result<Vec<RoomTemplate>, StoreError>;

    fn snapshot(&self, room_id: RoomId) -> Result<Option<RoomInventorySnapshot>, StoreError>;

    /// Append-only inspection history of a room, oldest first.
    fn inspections(&self, room_id: RoomId) -> Result<Vec<InspectionRecord>, StoreError>;

    fn transaction(&self, id: TransactionId) -> Result<Option<InventoryTransaction>, StoreError>;

    fn ledger(&self, key: LedgerKey) -> Result<LedgerView, StoreError>;

    fn checkout(&self, id: CheckoutId) -> Result<Option<CheckoutInspection>, StoreError>;

    /// The checkout of this booking that is still open, if any.
    fn open_checkout(&self, booking_id: BookingId) -> Result<Option<CheckoutInspection>, StoreError>;

    fn booking(&self, booking_id: BookingId) -> Result<Option<BookingRecord>, StoreError>;

    fn guest_bookings(&self, guest_id: UserId) -> Result<Vec<BookingRecord>, StoreError>;

    /// Apply every write of `uow` or none of them.
    fn commit(&self, uow: UnitOfWork) -> Result<Committed, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn catalog(&self, hotel_id: HotelId) -> Result<ItemCatalog, StoreError> {
        (**self).catalog(hotel_id)
    }

    fn template(&self, template_id: TemplateId, version: Option<u32>) -> Result<RoomTemplate, StoreError> {
        (**self).template(template_id, version)
    }

    fn templates(&self, hotel_id: HotelId) -> Result<Vec<RoomTemplate>, StoreError> {
        (**self).templates(hotel_id)
    }

    fn snapshot(&self, room_id: RoomId) -> Result<Option<RoomInventorySnapshot>, StoreError> {
        (**self).snapshot(room_id)
    }

    fn inspections(&self, room_id: RoomId) -> Result<Vec<InspectionRecord>, StoreError> {
        (**self).inspections(room_id)
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<InventoryTransaction>, StoreError> {
        (**self).transaction(id)
    }

    fn ledger(&self, key: LedgerKey) -> Result<LedgerView, StoreError> {
        (**self).ledger(key)
    }

    fn checkout(&self, id: CheckoutId) -> Result<Option<CheckoutInspection>, StoreError> {
        (**self).checkout(id)
    }

    fn open_checkout(&self, booking_id: BookingId) -> Result<Option<CheckoutInspection>, StoreError> {
        (**self).open_checkout(booking_id)
    }

    fn booking(&self, booking_id: BookingId) -> Result<Option<BookingRecord>, StoreError> {
        (**self).booking(booking_id)
    }

    fn guest_bookings(&self, guest_id: UserId) -> Result<Vec<BookingRecord>, StoreError> {
        (**self).guest_bookings(guest_id)
    }

    fn commit(&self, uow: UnitOfWork) -> Result<Committed, StoreError> {
        (**self).commit(uow)
    }
}
