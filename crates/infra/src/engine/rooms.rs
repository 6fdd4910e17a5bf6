use chrono::Utc;
use serde::{Deserialize, Serialize};

use innkeep_billing::{InventoryTransaction, TransactionOrigin};
use innkeep_core::{BookingId, DomainError, InspectionId, RoomId, SnapshotId, TemplateId, UserId};
use innkeep_events::EventBus;
use innkeep_inventory::{
    FindingInput, InspectionRecord, InspectionType, RoomInventorySnapshot, SnapshotStatus,
};

use super::{InventoryEngine, not_returned, snapshot_envelope, transaction_envelope};
use crate::error::EngineError;
use crate::event::DomainEnvelope;
use crate::store::{InventoryStore, LedgerKey, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInspection {
    pub room_id: RoomId,
    pub inspector_id: UserId,
    pub inspection_type: InspectionType,
    pub findings: Vec<FindingInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub record: InspectionRecord,
    pub status: SnapshotStatus,
    /// Pending ledger entries created for the findings that need follow-up.
    pub transactions: Vec<InventoryTransaction>,
}

impl<S, B> InventoryEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<DomainEnvelope>,
{
    /// Create the room's single active snapshot from a template version (latest if `None`).
    pub fn create_snapshot(
        &self,
        room_id: RoomId,
        template_id: TemplateId,
        version: Option<u32>,
    ) -> Result<RoomInventorySnapshot, EngineError> {
        let snapshot_id = SnapshotId::new();
        self.run("create_snapshot", || {
            let template = self.store.template(template_id, version)?;
            if self.store.snapshot(room_id)?.is_some() {
                return Err(DomainError::conflict(format!(
                    "room {room_id} already has an active snapshot"
                ))
                .into());
            }
            let (snapshot, event) =
                RoomInventorySnapshot::from_template(snapshot_id, room_id, &template, Utc::now());
            let committed = self.store.commit(UnitOfWork::new().put_snapshot(snapshot))?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;
            tracing::info!(room_id = %room_id, template = %snapshot.template(), "snapshot created");
            let events = vec![snapshot_envelope(&snapshot, event)];
            Ok((snapshot, events))
        })
    }

    pub fn attach_booking(
        &self,
        room_id: RoomId,
        booking_id: BookingId,
        guest_id: UserId,
    ) -> Result<RoomInventorySnapshot, EngineError> {
        self.run("attach_booking", || {
            if let Some(existing) = self.store.booking(booking_id)? {
                if existing.room_id != room_id {
                    return Err(DomainError::conflict(format!(
                        "booking {booking_id} is attached to room {}",
                        existing.room_id
                    ))
                    .into());
                }
            }
            let mut snapshot = self.require_snapshot(room_id)?;
            let event = snapshot.attach_booking(booking_id, guest_id, Utc::now())?;
            let committed = self.store.commit(UnitOfWork::new().put_snapshot(snapshot))?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;
            tracing::info!(room_id = %room_id, booking_id = %booking_id, "booking attached");
            let events = vec![snapshot_envelope(&snapshot, event)];
            Ok((snapshot, events))
        })
    }

    /// Move the snapshot onto a newer version of its template (latest if `None`).
    pub fn migrate_snapshot(
        &self,
        room_id: RoomId,
        version: Option<u32>,
    ) -> Result<RoomInventorySnapshot, EngineError> {
        self.run("migrate_snapshot", || {
            let mut snapshot = self.require_snapshot(room_id)?;
            let template = self
                .store
                .template(snapshot.template().template_id, version)?;
            let now = Utc::now();
            let event = snapshot.migrate(&template, now)?;
            snapshot.refresh_status(now, self.config.staleness, false);
            let committed = self.store.commit(UnitOfWork::new().put_snapshot(snapshot))?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;
            tracing::info!(room_id = %room_id, template = %snapshot.template(), "snapshot migrated");
            let events = vec![snapshot_envelope(&snapshot, event)];
            Ok((snapshot, events))
        })
    }

    /// Record an inspection and open pending ledger entries for its follow-ups,
    /// all in one commit.
    pub fn record_inspection(&self, cmd: RecordInspection) -> Result<InspectionReport, EngineError> {
        let inspection_id = InspectionId::new();
        self.run("record_inspection", || {
            let now = Utc::now();
            let mut snapshot = self.require_snapshot(cmd.room_id)?;
            let catalog = self.store.catalog(snapshot.hotel_id())?;
            let outcome = self.inspection_engine().record(
                &mut snapshot,
                &catalog,
                inspection_id,
                cmd.inspector_id,
                cmd.inspection_type,
                cmd.findings.clone(),
                now,
            )?;

            let key = LedgerKey::for_transaction(cmd.room_id, snapshot.booking_id());
            let ledger = self.store.ledger(key)?;
            let pending = self.pending_transactions(
                &snapshot,
                &catalog,
                outcome.requests.iter(),
                cmd.inspection_type == InspectionType::CheckoutInspection,
                cmd.inspector_id,
                TransactionOrigin::Inspection(inspection_id),
                now,
            )?;

            let mut uow = UnitOfWork::new()
                .put_snapshot(snapshot)
                .record_inspection(outcome.record.clone());
            for tx in pending {
                uow = uow.append(key, ledger.sequence, tx);
            }
            let committed = self.store.commit(uow)?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;

            tracing::info!(
                room_id = %cmd.room_id,
                inspection_id = %inspection_id,
                result = ?outcome.record.result,
                status = ?snapshot.status(),
                pending = committed.appended.len(),
                "inspection recorded"
            );

            let mut events = vec![snapshot_envelope(&snapshot, outcome.event)];
            events.extend(
                committed
                    .appended
                    .iter()
                    .map(|tx| transaction_envelope(tx, tx.posted_event())),
            );
            let report = InspectionReport {
                record: outcome.record,
                status: snapshot.status(),
                transactions: committed.appended,
            };
            Ok((report, events))
        })
    }
}
