use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_billing::InventoryTransaction;
use innkeep_core::{
    AggregateRoot, BookingId, CheckoutId, DomainError, DomainResult, HotelId, InspectionId,
    ItemId, Money, RoomId, TransactionId, UserId,
};
use innkeep_events::Event;
use innkeep_inventory::{Condition, FindingAction, FindingIssue, InspectionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Requested,
    Inspecting,
    Passed,
    PendingCharges,
    Failed,
}

impl CheckoutStatus {
    /// Open checkouts block a second request for the same booking.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            CheckoutStatus::Requested | CheckoutStatus::Inspecting | CheckoutStatus::PendingCharges
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    pub passed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryVerification {
    pub item_id: ItemId,
    pub expected: u32,
    pub observed: u32,
    pub condition: Condition,
    pub charge_guest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRecord {
    pub item_id: ItemId,
    pub condition: Condition,
    pub units: u32,
    pub estimated_cost: Money,
    pub charge_guest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutEventKind {
    Requested,
    InspectionStarted {
        inspector_id: UserId,
    },
    InspectionSubmitted {
        inspection_id: InspectionId,
        total_charges: Money,
        transaction_ids: Vec<TransactionId>,
    },
    ChargesConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEvent {
    pub checkout_id: CheckoutId,
    pub hotel_id: HotelId,
    pub booking_id: BookingId,
    pub room_id: RoomId,
    pub status: CheckoutStatus,
    #[serde(flatten)]
    pub kind: CheckoutEventKind,
    pub occurred_at: DateTime<Utc>,
}

impl Event for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            CheckoutEventKind::Requested => "checkout.gate.requested",
            CheckoutEventKind::InspectionStarted { .. } => "checkout.gate.inspection_started",
            CheckoutEventKind::InspectionSubmitted { .. } => "checkout.gate.inspection_submitted",
            CheckoutEventKind::ChargesConfirmed => "checkout.gate.charges_confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Aggregate root: one checkout attempt for a booking.
///
/// `requested → inspecting → {passed | pending_charges | failed}`, and
/// `pending_charges → passed` once every linked charge is completed and invoiced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutInspection {
    id: CheckoutId,
    hotel_id: HotelId,
    booking_id: BookingId,
    room_id: RoomId,
    inspector_id: Option<UserId>,
    inspection_id: Option<InspectionId>,
    checklist: Vec<ChecklistItem>,
    verification: Vec<InventoryVerification>,
    damages: Vec<DamageRecord>,
    total_charges: Money,
    linked_transactions: Vec<TransactionId>,
    status: CheckoutStatus,
    requested_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl CheckoutInspection {
    pub fn request(
        id: CheckoutId,
        hotel_id: HotelId,
        booking_id: BookingId,
        room_id: RoomId,
        now: DateTime<Utc>,
    ) -> (Self, CheckoutEvent) {
        let checkout = Self {
            id,
            hotel_id,
            booking_id,
            room_id,
            inspector_id: None,
            inspection_id: None,
            checklist: Vec::new(),
            verification: Vec::new(),
            damages: Vec::new(),
            total_charges: Money::ZERO,
            linked_transactions: Vec::new(),
            status: CheckoutStatus::Requested,
            requested_at: now,
            updated_at: now,
            version: 0,
        };
        let event = checkout.event(CheckoutEventKind::Requested, now);
        (checkout, event)
    }

    pub fn id_typed(&self) -> CheckoutId {
        self.id
    }

    pub fn hotel_id(&self) -> HotelId {
        self.hotel_id
    }

    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn inspector_id(&self) -> Option<UserId> {
        self.inspector_id
    }

    pub fn inspection_id(&self) -> Option<InspectionId> {
        self.inspection_id
    }

    pub fn status(&self) -> CheckoutStatus {
        self.status
    }

    pub fn checklist(&self) -> &[ChecklistItem] {
        &self.checklist
    }

    pub fn verification(&self) -> &[InventoryVerification] {
        &self.verification
    }

    pub fn damages(&self) -> &[DamageRecord] {
        &self.damages
    }

    pub fn total_charges(&self) -> Money {
        self.total_charges
    }

    pub fn linked_transactions(&self) -> &[TransactionId] {
        &self.linked_transactions
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Called by persistence after a successful write.
    pub fn committed(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn begin_inspection(
        &mut self,
        inspector_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<CheckoutEvent> {
        self.ensure_status(CheckoutStatus::Requested, "begin inspection")?;
        self.inspector_id = Some(inspector_id);
        self.status = CheckoutStatus::Inspecting;
        self.updated_at = now;
        Ok(self.event(CheckoutEventKind::InspectionStarted { inspector_id }, now))
    }

    /// Record the checkout inspection result.
    ///
    /// `charges` are the pending `checkout_charge` transactions created for the
    /// guest-chargeable findings of `record`. `ledger` is the booking ledger
    /// before those charges: anything still pending there also holds the gate.
    pub fn submit_inspection(
        &mut self,
        checklist: Vec<ChecklistItem>,
        record: &InspectionRecord,
        charges: &[TransactionId],
        ledger: &[InventoryTransaction],
        now: DateTime<Utc>,
    ) -> DomainResult<CheckoutEvent> {
        self.ensure_status(CheckoutStatus::Inspecting, "submit inspection")?;
        if record.room_id != self.room_id {
            return Err(DomainError::invariant(format!(
                "inspection {} belongs to room {}, not {}",
                record.id, record.room_id, self.room_id
            )));
        }
        if checklist.iter().any(|c| c.label.trim().is_empty()) {
            return Err(DomainError::validation("checklist items must have a label"));
        }

        self.verification = record
            .findings
            .iter()
            .map(|f| InventoryVerification {
                item_id: f.item_id,
                expected: f.expected_quantity,
                observed: f.observed_quantity,
                condition: f.resulting_condition,
                charge_guest: f.action == FindingAction::ChargeGuest,
            })
            .collect();
        self.damages = record
            .findings
            .iter()
            .filter(|f| f.issue != FindingIssue::None)
            .map(|f| DamageRecord {
                item_id: f.item_id,
                condition: f.resulting_condition,
                units: f.units,
                estimated_cost: f.cost,
                charge_guest: f.action == FindingAction::ChargeGuest,
            })
            .collect();
        self.total_charges = self
            .damages
            .iter()
            .filter(|d| d.charge_guest)
            .map(|d| d.estimated_cost)
            .sum();
        self.linked_transactions = charges.to_vec();
        self.inspection_id = Some(record.id);

        self.status = if checklist.iter().any(|c| !c.passed) {
            CheckoutStatus::Failed
        } else if !self.linked_transactions.is_empty()
            || !self.pending_on_booking(ledger).is_empty()
        {
            CheckoutStatus::PendingCharges
        } else {
            CheckoutStatus::Passed
        };
        self.checklist = checklist;
        self.updated_at = now;

        Ok(self.event(
            CheckoutEventKind::InspectionSubmitted {
                inspection_id: record.id,
                total_charges: self.total_charges,
                transaction_ids: self.linked_transactions.clone(),
            },
            now,
        ))
    }

    /// Linked charges that are not yet completed and invoiced, followed by any
    /// other transaction of the booking that is still pending.
    pub fn outstanding(&self, ledger: &[InventoryTransaction]) -> Vec<TransactionId> {
        let mut outstanding: Vec<TransactionId> = self
            .linked_transactions
            .iter()
            .copied()
            .filter(|id| {
                !ledger
                    .iter()
                    .any(|tx| tx.id_typed() == *id && tx.is_billed())
            })
            .collect();
        outstanding.extend(
            self.pending_on_booking(ledger)
                .into_iter()
                .filter(|id| !self.linked_transactions.contains(id)),
        );
        outstanding
    }

    fn pending_on_booking(&self, ledger: &[InventoryTransaction]) -> Vec<TransactionId> {
        ledger
            .iter()
            .filter(|tx| tx.is_pending() && tx.booking_id() == Some(self.booking_id))
            .map(InventoryTransaction::id_typed)
            .collect()
    }

    /// True only when passed and nothing for the booking is still outstanding.
    pub fn can_checkout(&self, ledger: &[InventoryTransaction]) -> bool {
        matches!(
            self.status,
            CheckoutStatus::Passed | CheckoutStatus::PendingCharges
        ) && self.outstanding(ledger).is_empty()
    }

    pub fn confirm_charges(
        &mut self,
        ledger: &[InventoryTransaction],
        now: DateTime<Utc>,
    ) -> DomainResult<CheckoutEvent> {
        self.ensure_status(CheckoutStatus::PendingCharges, "confirm charges")?;
        let outstanding = self.outstanding(ledger);
        if !outstanding.is_empty() {
            let ids: Vec<String> = outstanding.iter().map(ToString::to_string).collect();
            return Err(DomainError::conflict(format!(
                "checkout {} has outstanding charges: {}",
                self.id,
                ids.join(", ")
            )));
        }
        self.status = CheckoutStatus::Passed;
        self.updated_at = now;
        Ok(self.event(CheckoutEventKind::ChargesConfirmed, now))
    }

    fn ensure_status(&self, expected: CheckoutStatus, action: &str) -> DomainResult<()> {
        if self.status != expected {
            return Err(DomainError::conflict(format!(
                "cannot {action}: checkout {} is {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn event(&self, kind: CheckoutEventKind, now: DateTime<Utc>) -> CheckoutEvent {
        CheckoutEvent {
            checkout_id: self.id,
            hotel_id: self.hotel_id,
            booking_id: self.booking_id,
            room_id: self.room_id,
            status: self.status,
            kind,
            occurred_at: now,
        }
    }
}

impl AggregateRoot for CheckoutInspection {
    type Id = CheckoutId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::SnapshotId;
    use innkeep_inventory::{Finding, InspectionResult, InspectionType};

    fn checkout() -> CheckoutInspection {
        let (c, _) = CheckoutInspection::request(
            CheckoutId::new(),
            HotelId::new(),
            BookingId::new(),
            RoomId::new(),
            Utc::now(),
        );
        c
    }

    fn record(room_id: RoomId, findings: Vec<Finding>) -> InspectionRecord {
        InspectionRecord {
            id: InspectionId::new(),
            hotel_id: HotelId::new(),
            snapshot_id: SnapshotId::new(),
            room_id,
            booking_id: None,
            inspection_type: InspectionType::CheckoutInspection,
            inspector_id: UserId::new(),
            recorded_at: Utc::now(),
            findings,
            result: InspectionResult::Passed,
        }
    }

    fn missing_sheet() -> Finding {
        Finding {
            item_id: ItemId::new(),
            issue: FindingIssue::Missing,
            units: 1,
            expected_quantity: 2,
            observed_quantity: 1,
            resulting_condition: Condition::Missing,
            action: FindingAction::ChargeGuest,
            cost: Money::new(1600),
            note: None,
        }
    }

    fn ok_checklist() -> Vec<ChecklistItem> {
        vec![ChecklistItem {
            label: "Keys returned".to_string(),
            passed: true,
            note: None,
        }]
    }

    #[test]
    fn clean_inspection_passes_immediately() {
        let mut c = checkout();
        c.begin_inspection(UserId::new(), Utc::now()).unwrap();
        let rec = record(c.room_id(), vec![]);
        c.submit_inspection(ok_checklist(), &rec, &[], &[], Utc::now()).unwrap();
        assert_eq!(c.status(), CheckoutStatus::Passed);
        assert!(c.can_checkout(&[]));
    }

    #[test]
    fn chargeable_damage_waits_for_confirmation() {
        let mut c = checkout();
        c.begin_inspection(UserId::new(), Utc::now()).unwrap();
        let rec = record(c.room_id(), vec![missing_sheet()]);
        let charge = TransactionId::new();
        c.submit_inspection(ok_checklist(), &rec, &[charge], &[], Utc::now()).unwrap();

        assert_eq!(c.status(), CheckoutStatus::PendingCharges);
        assert_eq!(c.total_charges(), Money::new(1600));
        assert!(!c.can_checkout(&[]));
        let err = c.confirm_charges(&[], Utc::now()).unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains(&charge.to_string()));
    }

    #[test]
    fn failed_checklist_is_terminal() {
        let mut c = checkout();
        c.begin_inspection(UserId::new(), Utc::now()).unwrap();
        let rec = record(c.room_id(), vec![]);
        let checklist = vec![ChecklistItem {
            label: "Minibar sealed".to_string(),
            passed: false,
            note: Some("seal broken".to_string()),
        }];
        c.submit_inspection(checklist, &rec, &[], &[], Utc::now()).unwrap();
        assert_eq!(c.status(), CheckoutStatus::Failed);
        assert!(!c.status().is_open());
        assert!(!c.can_checkout(&[]));
        assert!(c.begin_inspection(UserId::new(), Utc::now()).is_err());
    }

    #[test]
    fn transitions_out_of_order_conflict() {
        let mut c = checkout();
        let rec = record(c.room_id(), vec![]);
        assert!(
            c.submit_inspection(ok_checklist(), &rec, &[], &[], Utc::now())
                .unwrap_err()
                .is_conflict()
        );
        assert!(c.confirm_charges(&[], Utc::now()).unwrap_err().is_conflict());
    }

    #[test]
    fn inspection_of_another_room_is_rejected() {
        let mut c = checkout();
        c.begin_inspection(UserId::new(), Utc::now()).unwrap();
        let rec = record(RoomId::new(), vec![]);
        assert!(matches!(
            c.submit_inspection(ok_checklist(), &rec, &[], &[], Utc::now()),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
