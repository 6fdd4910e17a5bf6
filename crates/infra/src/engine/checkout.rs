use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_billing::{
    EntryInput, InventoryTransaction, TransactionOrigin, TransactionRequest, TransactionStatus,
    TransactionType,
};
use innkeep_checkout::{ChecklistItem, CheckoutInspection, CheckoutStatus};
use innkeep_core::{BookingId, CheckoutId, DomainError, InspectionId, TransactionId, UserId};
use innkeep_events::EventBus;
use innkeep_inventory::{FindingInput, InspectionType, ItemCatalog, RoomInventorySnapshot};

use super::{
    InventoryEngine, checkout_envelope, not_returned, snapshot_envelope, transaction_envelope,
};
use crate::error::EngineError;
use crate::event::DomainEnvelope;
use crate::store::{InventoryStore, LedgerKey, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCheckoutInspection {
    pub checkout_id: CheckoutId,
    pub inspector_id: UserId,
    pub checklist: Vec<ChecklistItem>,
    pub findings: Vec<FindingInput>,
}

/// A checkout together with its gate decision against the current ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutView {
    pub checkout: CheckoutInspection,
    pub can_checkout: bool,
    pub outstanding: Vec<TransactionId>,
}

impl CheckoutView {
    fn new(checkout: CheckoutInspection, ledger: &[InventoryTransaction]) -> Self {
        Self {
            can_checkout: checkout.can_checkout(ledger),
            outstanding: checkout.outstanding(ledger),
            checkout,
        }
    }
}

impl<S, B> InventoryEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<DomainEnvelope>,
{
    pub fn request_checkout(&self, booking_id: BookingId) -> Result<CheckoutInspection, EngineError> {
        let checkout_id = CheckoutId::new();
        self.run("request_checkout", || {
            let booking = self
                .store
                .booking(booking_id)?
                .ok_or_else(|| EngineError::not_found(format!("booking {booking_id}")))?;
            let snapshot = self.require_snapshot(booking.room_id)?;
            if snapshot.booking_id() != Some(booking_id) {
                return Err(DomainError::conflict(format!(
                    "booking {booking_id} is no longer attached to room {}",
                    booking.room_id
                ))
                .into());
            }
            if let Some(open) = self.store.open_checkout(booking_id)? {
                return Err(DomainError::conflict(format!(
                    "booking {booking_id} already has open checkout {}",
                    open.id_typed()
                ))
                .into());
            }

            let (checkout, event) = CheckoutInspection::request(
                checkout_id,
                booking.hotel_id,
                booking_id,
                booking.room_id,
                Utc::now(),
            );
            let committed = self.store.commit(UnitOfWork::new().put_checkout(checkout))?;
            let checkout = committed.checkout.ok_or_else(|| not_returned("checkout"))?;
            tracing::info!(checkout_id = %checkout_id, booking_id = %booking_id, "checkout requested");
            let events = vec![checkout_envelope(&checkout, event)];
            Ok((checkout, events))
        })
    }

    pub fn begin_checkout_inspection(
        &self,
        checkout_id: CheckoutId,
        inspector_id: UserId,
    ) -> Result<CheckoutInspection, EngineError> {
        self.run("begin_checkout_inspection", || {
            let mut checkout = self.require_checkout(checkout_id)?;
            let event = checkout.begin_inspection(inspector_id, Utc::now())?;
            let committed = self.store.commit(UnitOfWork::new().put_checkout(checkout))?;
            let checkout = committed.checkout.ok_or_else(|| not_returned("checkout"))?;
            tracing::info!(checkout_id = %checkout_id, inspector_id = %inspector_id, "checkout inspection started");
            let events = vec![checkout_envelope(&checkout, event)];
            Ok((checkout, events))
        })
    }

    /// Record the checkout inspection and move the gate.
    ///
    /// Guest-chargeable findings open pending `checkout_charge` transactions.
    /// Earlier charges still pending on the booking hold the gate too. A
    /// checkout that passes outright resets the room in the same commit.
    pub fn submit_checkout_inspection(
        &self,
        cmd: SubmitCheckoutInspection,
    ) -> Result<CheckoutView, EngineError> {
        let inspection_id = InspectionId::new();
        self.run("submit_checkout_inspection", || {
            let now = Utc::now();
            let mut checkout = self.require_checkout(cmd.checkout_id)?;
            let mut snapshot = self.require_snapshot(checkout.room_id())?;
            ensure_attached(&snapshot, &checkout)?;
            let catalog = self.store.catalog(checkout.hotel_id())?;

            let outcome = self.inspection_engine().record(
                &mut snapshot,
                &catalog,
                inspection_id,
                cmd.inspector_id,
                InspectionType::CheckoutInspection,
                cmd.findings.clone(),
                now,
            )?;

            let key = LedgerKey::Booking(checkout.booking_id());
            let ledger = self.store.ledger(key)?;
            let charges = self.pending_transactions(
                &snapshot,
                &catalog,
                outcome.requests.iter().filter(|r| r.charge_guest),
                true,
                cmd.inspector_id,
                TransactionOrigin::Checkout(cmd.checkout_id),
                now,
            )?;
            let charge_ids: Vec<TransactionId> = charges.iter().map(|t| t.id_typed()).collect();
            let gate_event = checkout.submit_inspection(
                cmd.checklist.clone(),
                &outcome.record,
                &charge_ids,
                &ledger.transactions,
                now,
            )?;

            let mut uow = UnitOfWork::new().record_inspection(outcome.record.clone());
            for tx in charges {
                uow = uow.append(key, ledger.sequence, tx);
            }
            let mut inventory_events = vec![outcome.event];
            if checkout.status() == CheckoutStatus::Passed {
                if let Some(tx) =
                    self.hotel_replacement(&checkout, &snapshot, &catalog, cmd.inspector_id, now)?
                {
                    uow = uow.append(key, ledger.sequence, tx);
                }
                inventory_events.push(snapshot.reset(cmd.inspector_id, now));
            }

            let committed = self
                .store
                .commit(uow.put_snapshot(snapshot).put_checkout(checkout))?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;
            let checkout = committed.checkout.ok_or_else(|| not_returned("checkout"))?;

            tracing::info!(
                checkout_id = %cmd.checkout_id,
                booking_id = %checkout.booking_id(),
                room_id = %checkout.room_id(),
                status = ?checkout.status(),
                total_charges = %checkout.total_charges(),
                "checkout inspection submitted"
            );

            let mut events: Vec<DomainEnvelope> = inventory_events
                .into_iter()
                .map(|e| snapshot_envelope(&snapshot, e))
                .collect();
            events.extend(
                committed
                    .appended
                    .iter()
                    .map(|tx| transaction_envelope(tx, tx.posted_event())),
            );
            events.push(checkout_envelope(&checkout, gate_event));

            let ledger = self.store.ledger(key)?;
            Ok((CheckoutView::new(checkout, &ledger.transactions), events))
        })
    }

    /// Release a `pending_charges` checkout once every linked charge is settled
    /// and invoiced, resetting the room in the same commit.
    pub fn confirm_charges(
        &self,
        checkout_id: CheckoutId,
        processed_by: UserId,
    ) -> Result<CheckoutView, EngineError> {
        self.run("confirm_charges", || {
            let now = Utc::now();
            let mut checkout = self.require_checkout(checkout_id)?;
            let key = LedgerKey::Booking(checkout.booking_id());
            let ledger = self.store.ledger(key)?;
            let gate_event = checkout.confirm_charges(&ledger.transactions, now)?;

            let mut snapshot = self.require_snapshot(checkout.room_id())?;
            ensure_attached(&snapshot, &checkout)?;
            let catalog = self.store.catalog(checkout.hotel_id())?;

            let mut uow = UnitOfWork::new();
            if let Some(tx) = self.hotel_replacement(&checkout, &snapshot, &catalog, processed_by, now)? {
                uow = uow.append(key, ledger.sequence, tx);
            }
            let reset = snapshot.reset(processed_by, now);

            let committed = self
                .store
                .commit(uow.put_snapshot(snapshot).put_checkout(checkout))?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;
            let checkout = committed.checkout.ok_or_else(|| not_returned("checkout"))?;
            tracing::info!(checkout_id = %checkout_id, booking_id = %checkout.booking_id(), "checkout charges confirmed");

            let mut events = vec![snapshot_envelope(&snapshot, reset)];
            events.extend(
                committed
                    .appended
                    .iter()
                    .map(|tx| transaction_envelope(tx, tx.posted_event())),
            );
            events.push(checkout_envelope(&checkout, gate_event));

            let ledger = self.store.ledger(key)?;
            Ok((CheckoutView::new(checkout, &ledger.transactions), events))
        })
    }

    pub fn checkout_status(&self, checkout_id: CheckoutId) -> Result<CheckoutView, EngineError> {
        let checkout = self.require_checkout(checkout_id)?;
        let ledger = self.store.ledger(LedgerKey::Booking(checkout.booking_id()))?;
        Ok(CheckoutView::new(checkout, &ledger.transactions))
    }

    pub fn can_checkout(&self, checkout_id: CheckoutId) -> Result<bool, EngineError> {
        Ok(self.checkout_status(checkout_id)?.can_checkout)
    }

    /// Completed hotel-cost `replacement` for the non-chargeable deviations of a
    /// checkout, or `None` if there were none.
    fn hotel_replacement(
        &self,
        checkout: &CheckoutInspection,
        snapshot: &RoomInventorySnapshot,
        catalog: &ItemCatalog,
        processed_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryTransaction>, EngineError> {
        let entries: Vec<EntryInput> = checkout
            .damages()
            .iter()
            .filter(|d| !d.charge_guest)
            .map(|d| EntryInput {
                item_id: d.item_id,
                units: d.units,
                quantity_delta: 0,
                condition: Some(d.condition),
                chargeable: false,
                replace_on_settle: true,
                reason: Some(format!("replaced at checkout {}", checkout.id_typed())),
            })
            .collect();
        if entries.is_empty() {
            return Ok(None);
        }
        let request = TransactionRequest {
            id: TransactionId::new(),
            booking_id: Some(checkout.booking_id()),
            kind: TransactionType::Replacement,
            entries,
            processed_by,
            origin: TransactionOrigin::Checkout(checkout.id_typed()),
            status: TransactionStatus::Completed,
        };
        Ok(Some(InventoryTransaction::build(
            request,
            snapshot,
            catalog,
            &self.config.pricing,
            now,
        )?))
    }
}

fn ensure_attached(snapshot: &RoomInventorySnapshot, checkout: &CheckoutInspection) -> Result<(), EngineError> {
    if snapshot.booking_id() != Some(checkout.booking_id()) {
        return Err(DomainError::conflict(format!(
            "booking {} is no longer attached to room {}",
            checkout.booking_id(),
            checkout.room_id()
        ))
        .into());
    }
    Ok(())
}
