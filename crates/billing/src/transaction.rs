use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{
    AggregateRoot, BookingId, CheckoutId, DomainError, DomainResult, HotelId, InspectionId,
    InvoiceLineId, ItemId, Money, RoomId, TransactionId, UserId,
};
use innkeep_inventory::{
    Condition, ItemCatalog, LineChange, ReplacementRequest, RoomInventorySnapshot,
};

use crate::event::LedgerEvent;
use crate::pricing::PricingPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Replacement,
    ExtraRequest,
    Damage,
    CheckoutCharge,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Replacement => "replacement",
            TransactionType::ExtraRequest => "extra_request",
            TransactionType::Damage => "damage",
            TransactionType::CheckoutCharge => "checkout_charge",
        }
    }

    /// Ledger type for an inspection finding.
    pub fn for_finding(checkout: bool, charge_guest: bool) -> Self {
        match (charge_guest, checkout) {
            (true, true) => TransactionType::CheckoutCharge,
            (true, false) => TransactionType::Damage,
            (false, _) => TransactionType::Replacement,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Where a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum TransactionOrigin {
    Direct,
    Inspection(InspectionId),
    Checkout(CheckoutId),
}

/// Requested entry, before pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    pub item_id: ItemId,
    pub units: u32,
    /// Signed change to the line's current quantity.
    #[serde(default)]
    pub quantity_delta: i64,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub chargeable: bool,
    #[serde(default)]
    pub replace_on_settle: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<&ReplacementRequest> for EntryInput {
    fn from(request: &ReplacementRequest) -> Self {
        Self {
            item_id: request.item_id,
            units: request.units,
            quantity_delta: 0,
            condition: Some(request.condition),
            chargeable: request.charge_guest,
            replace_on_settle: request.replace_on_settle,
            reason: Some(request.reason.clone()),
        }
    }
}

/// A priced, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub item_id: ItemId,
    pub units: u32,
    pub quantity_delta: i64,
    pub condition: Option<Condition>,
    pub unit_price: Money,
    pub total_cost: Money,
    pub reason: String,
    pub chargeable: bool,
    pub replace_on_settle: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub id: TransactionId,
    pub booking_id: Option<BookingId>,
    pub kind: TransactionType,
    pub entries: Vec<EntryInput>,
    pub processed_by: UserId,
    pub origin: TransactionOrigin,
    pub status: TransactionStatus,
}

/// Aggregate root: one cost-attributed ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    id: TransactionId,
    hotel_id: HotelId,
    room_id: RoomId,
    booking_id: Option<BookingId>,
    kind: TransactionType,
    entries: Vec<TransactionEntry>,
    total_amount: Money,
    charged_to_guest: bool,
    processed_by: UserId,
    status: TransactionStatus,
    invoice_line_id: Option<InvoiceLineId>,
    origin: TransactionOrigin,
    pricing_version: u32,
    sequence: u64,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
    version: u64,
}

impl InventoryTransaction {
    /// Validate and price a request against the room's current snapshot.
    pub fn build(
        request: TransactionRequest,
        snapshot: &RoomInventorySnapshot,
        catalog: &ItemCatalog,
        policy: &PricingPolicy,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if request.status == TransactionStatus::Cancelled {
            return Err(DomainError::validation("a transaction cannot be created cancelled"));
        }
        if request.entries.is_empty() {
            return Err(DomainError::validation("transaction must have entries"));
        }
        if let (Some(requested), Some(attached)) = (request.booking_id, snapshot.booking_id()) {
            if requested != attached {
                return Err(DomainError::validation(format!(
                    "booking {requested} is not attached to room {}",
                    snapshot.room_id()
                )));
            }
        }
        if request.booking_id.is_some() && snapshot.booking_id().is_none() {
            return Err(DomainError::validation(format!(
                "room {} has no attached booking",
                snapshot.room_id()
            )));
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(request.entries.len());
        for input in request.entries {
            if !seen.insert(input.item_id) {
                return Err(DomainError::validation(format!(
                    "item {} appears more than once in the transaction",
                    input.item_id
                )));
            }
            entries.push(price_entry(
                input,
                request.kind,
                request.booking_id,
                snapshot,
                catalog,
                policy,
            )?);
        }

        let total_amount = entries.iter().map(|e| e.total_cost).sum();
        let charged_to_guest = entries.iter().any(|e| e.chargeable);
        let settled_at = (request.status == TransactionStatus::Completed).then_some(now);

        Ok(Self {
            id: request.id,
            hotel_id: snapshot.hotel_id(),
            room_id: snapshot.room_id(),
            booking_id: request.booking_id,
            kind: request.kind,
            entries,
            total_amount,
            charged_to_guest,
            processed_by: request.processed_by,
            status: request.status,
            invoice_line_id: None,
            origin: request.origin,
            pricing_version: policy.version,
            sequence: 0,
            created_at: now,
            settled_at,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn hotel_id(&self) -> HotelId {
        self.hotel_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn entries(&self) -> &[TransactionEntry] {
        &self.entries
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Sum of the entries the guest pays for.
    pub fn chargeable_amount(&self) -> Money {
        self.entries
            .iter()
            .filter(|e| e.chargeable)
            .map(|e| e.total_cost)
            .sum()
    }

    pub fn charged_to_guest(&self) -> bool {
        self.charged_to_guest
    }

    pub fn processed_by(&self) -> UserId {
        self.processed_by
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn invoice_line_id(&self) -> Option<InvoiceLineId> {
        self.invoice_line_id
    }

    pub fn origin(&self) -> TransactionOrigin {
        self.origin
    }

    pub fn pricing_version(&self) -> u32 {
        self.pricing_version
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Completed, charged and invoiced.
    pub fn is_billed(&self) -> bool {
        self.status == TransactionStatus::Completed && self.invoice_line_id.is_some()
    }

    /// Eligible for the next invoice.
    pub fn is_unbilled_charge(&self) -> bool {
        self.status == TransactionStatus::Completed
            && self.charged_to_guest
            && self.invoice_line_id.is_none()
    }

    /// Ledger position assigned at append time.
    pub fn sequenced(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Called by persistence after a successful write.
    pub fn committed(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Apply quantity deltas and reported conditions to the snapshot.
    pub fn apply_to(
        &self,
        snapshot: &mut RoomInventorySnapshot,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<LineChange>> {
        self.entries
            .iter()
            .map(|e| snapshot.adjust_line(e.item_id, e.quantity_delta, e.condition, now))
            .collect()
    }

    /// Restore the lines flagged replace-on-settle.
    pub fn restore_on_settle(
        &self,
        snapshot: &mut RoomInventorySnapshot,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<LineChange>> {
        self.entries
            .iter()
            .filter(|e| e.replace_on_settle)
            .map(|e| snapshot.restore_line(e.item_id, now))
            .collect()
    }

    pub fn posted_event(&self) -> LedgerEvent {
        LedgerEvent::TransactionPosted {
            hotel_id: self.hotel_id,
            room_id: self.room_id,
            booking_id: self.booking_id,
            transaction_id: self.id,
            kind: self.kind,
            status: self.status,
            total_amount: self.total_amount,
            charged_to_guest: self.charged_to_guest,
            occurred_at: self.created_at,
        }
    }

    pub fn complete(&mut self, by: UserId, now: DateTime<Utc>) -> DomainResult<LedgerEvent> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Completed;
        self.processed_by = by;
        self.settled_at = Some(now);
        Ok(LedgerEvent::TransactionCompleted {
            hotel_id: self.hotel_id,
            room_id: self.room_id,
            booking_id: self.booking_id,
            transaction_id: self.id,
            kind: self.kind,
            total_amount: self.total_amount,
            charged_to_guest: self.charged_to_guest,
            occurred_at: now,
        })
    }

    pub fn cancel(
        &mut self,
        by: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<LedgerEvent> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Cancelled;
        self.processed_by = by;
        self.settled_at = Some(now);
        Ok(LedgerEvent::TransactionCancelled {
            hotel_id: self.hotel_id,
            room_id: self.room_id,
            booking_id: self.booking_id,
            transaction_id: self.id,
            reason,
            occurred_at: now,
        })
    }

    /// Claim this transaction for an invoice line.
    pub fn link_invoice_line(&mut self, line_id: InvoiceLineId) -> DomainResult<()> {
        if !self.is_unbilled_charge() {
            return Err(DomainError::conflict(format!(
                "transaction {} is not an unbilled completed charge",
                self.id
            )));
        }
        self.invoice_line_id = Some(line_id);
        Ok(())
    }

    /// Release a claim whose invoice submission failed.
    pub fn release_invoice_line(&mut self, line_id: InvoiceLineId) {
        if self.invoice_line_id == Some(line_id) {
            self.invoice_line_id = None;
        }
    }

    fn ensure_pending(&self) -> DomainResult<()> {
        if self.status != TransactionStatus::Pending {
            return Err(DomainError::conflict(format!(
                "transaction {} is already {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for InventoryTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn price_entry(
    input: EntryInput,
    kind: TransactionType,
    booking_id: Option<BookingId>,
    snapshot: &RoomInventorySnapshot,
    catalog: &ItemCatalog,
    policy: &PricingPolicy,
) -> DomainResult<TransactionEntry> {
    if input.units == 0 {
        return Err(DomainError::validation(format!(
            "entry for item {} must have at least one unit",
            input.item_id
        )));
    }
    let line = snapshot.require_line(input.item_id)?;
    let item = catalog.require(input.item_id)?;
    let projected = snapshot.projected_quantity(input.item_id, input.quantity_delta)?;

    // Complimentary items are free up to the template quantity.
    let free = kind == TransactionType::ExtraRequest
        && item.complimentary
        && projected <= line.expected_quantity;

    if input.chargeable {
        if kind == TransactionType::Replacement {
            return Err(DomainError::validation(format!(
                "replacement of item {} is a hotel cost and cannot be charged",
                input.item_id
            )));
        }
        if free {
            return Err(DomainError::validation(format!(
                "item {} is complimentary within its expected quantity",
                input.item_id
            )));
        }
        if booking_id.is_none() {
            return Err(DomainError::validation(format!(
                "chargeable entry for item {} requires a booking",
                input.item_id
            )));
        }
    }

    let condition = input.condition.unwrap_or(Condition::Good);
    let (unit_price, total_cost) = if free {
        (Money::ZERO, Money::ZERO)
    } else {
        policy.price(item, kind, condition, input.units)
    };
    let reason = input
        .reason
        .unwrap_or_else(|| format!("{} {} x {}", kind, input.units, item.name));

    Ok(TransactionEntry {
        item_id: input.item_id,
        units: input.units,
        quantity_delta: input.quantity_delta,
        condition: input.condition,
        unit_price,
        total_cost,
        reason,
        chargeable: input.chargeable,
        replace_on_settle: input.replace_on_settle,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::{SnapshotId, TemplateId};
    use innkeep_inventory::{ItemCategory, NewItem, RoomTemplate, TemplateLine};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    struct Room {
        catalog: ItemCatalog,
        snapshot: RoomInventorySnapshot,
        sheets: ItemId,
        towels: ItemId,
        booking: BookingId,
    }

    fn room() -> Room {
        let now = Utc::now();
        let mut catalog = ItemCatalog::new(HotelId::new());
        let sheets = ItemId::new();
        let towels = ItemId::new();
        catalog
            .register(
                sheets,
                NewItem {
                    name: "Bed sheet set".to_string(),
                    category: ItemCategory::Linen,
                    unit_price: Money::new(500),
                    replacement_price: Money::new(800),
                    complimentary: true,
                },
                now,
            )
            .unwrap();
        catalog
            .register(
                towels,
                NewItem {
                    name: "Bath towel".to_string(),
                    category: ItemCategory::Towel,
                    unit_price: Money::new(200),
                    replacement_price: Money::new(300),
                    complimentary: false,
                },
                now,
            )
            .unwrap();
        let template = RoomTemplate::new(
            TemplateId::new(),
            "Standard double",
            BTreeSet::from(["double".to_string()]),
            vec![
                TemplateLine { item_id: sheets, default_quantity: 2 },
                TemplateLine { item_id: towels, default_quantity: 2 },
            ],
            &catalog,
            now,
        )
        .unwrap();
        let (mut snapshot, _) =
            RoomInventorySnapshot::from_template(SnapshotId::new(), RoomId::new(), &template, now);
        let booking = BookingId::new();
        snapshot.attach_booking(booking, UserId::new(), now).unwrap();
        Room { catalog, snapshot, sheets, towels, booking }
    }

    fn request(room: &Room, kind: TransactionType, entries: Vec<EntryInput>) -> TransactionRequest {
        TransactionRequest {
            id: TransactionId::new(),
            booking_id: Some(room.booking),
            kind,
            entries,
            processed_by: UserId::new(),
            origin: TransactionOrigin::Direct,
            status: TransactionStatus::Completed,
        }
    }

    fn entry(item_id: ItemId, delta: i64, chargeable: bool) -> EntryInput {
        EntryInput {
            item_id,
            units: delta.unsigned_abs().max(1) as u32,
            quantity_delta: delta,
            condition: None,
            chargeable,
            replace_on_settle: false,
            reason: None,
        }
    }

    fn build(room: &Room, req: TransactionRequest) -> DomainResult<InventoryTransaction> {
        InventoryTransaction::build(req, &room.snapshot, &room.catalog, &PricingPolicy::standard(), Utc::now())
    }

    #[test]
    fn extra_towel_is_marked_up_and_charged() {
        let mut room = room();
        let req = request(&room, TransactionType::ExtraRequest, vec![entry(room.towels, 1, true)]);
        let tx = build(&room, req).unwrap();

        assert_eq!(tx.total_amount(), Money::new(300));
        assert!(tx.charged_to_guest());
        assert_eq!(tx.status(), TransactionStatus::Completed);

        tx.apply_to(&mut room.snapshot, Utc::now()).unwrap();
        assert_eq!(room.snapshot.line(room.towels).unwrap().current_quantity, 3);
    }

    #[test]
    fn complimentary_item_within_expected_quantity_cannot_be_charged() {
        let mut room = room();
        room.snapshot.adjust_line(room.sheets, -1, None, Utc::now()).unwrap();

        let req = request(&room, TransactionType::ExtraRequest, vec![entry(room.sheets, 1, true)]);
        assert!(matches!(build(&room, req), Err(DomainError::Validation(_))));

        let req = request(&room, TransactionType::ExtraRequest, vec![entry(room.sheets, 1, false)]);
        let tx = build(&room, req).unwrap();
        assert_eq!(tx.total_amount(), Money::ZERO);
        assert!(!tx.charged_to_guest());
    }

    #[test]
    fn complimentary_overage_is_chargeable() {
        let room = room();
        let req = request(&room, TransactionType::ExtraRequest, vec![entry(room.sheets, 1, true)]);
        assert_eq!(build(&room, req).unwrap().total_amount(), Money::new(750));
    }

    #[test]
    fn replacements_are_never_chargeable() {
        let room = room();
        let req = request(&room, TransactionType::Replacement, vec![entry(room.towels, 1, true)]);
        assert!(matches!(build(&room, req), Err(DomainError::Validation(_))));
    }

    #[test]
    fn chargeable_entry_requires_booking() {
        let room = room();
        let mut req = request(&room, TransactionType::Damage, vec![entry(room.towels, 0, true)]);
        req.booking_id = None;
        assert!(matches!(build(&room, req), Err(DomainError::Validation(_))));
    }

    #[test]
    fn delta_below_zero_and_foreign_items_are_rejected() {
        let room = room();
        let req = request(&room, TransactionType::Replacement, vec![entry(room.towels, -3, false)]);
        assert!(matches!(build(&room, req), Err(DomainError::Validation(_))));

        let req = request(&room, TransactionType::Replacement, vec![entry(ItemId::new(), 1, false)]);
        assert!(matches!(build(&room, req), Err(DomainError::Validation(_))));
    }

    #[test]
    fn settled_transactions_cannot_be_settled_again() {
        let room = room();
        let mut req = request(&room, TransactionType::Damage, vec![entry(room.towels, 0, true)]);
        req.status = TransactionStatus::Pending;
        let mut tx = build(&room, req).unwrap();
        assert!(tx.link_invoice_line(InvoiceLineId::new()).is_err());

        tx.complete(UserId::new(), Utc::now()).unwrap();
        assert!(tx.complete(UserId::new(), Utc::now()).unwrap_err().is_conflict());
        assert!(tx.cancel(UserId::new(), None, Utc::now()).unwrap_err().is_conflict());
        assert!(tx.is_unbilled_charge());
    }

    #[test]
    fn replace_on_settle_restores_the_line() {
        let mut room = room();
        room.snapshot
            .adjust_line(room.sheets, -1, Some(Condition::Missing), Utc::now())
            .unwrap();
        let mut req = request(
            &room,
            TransactionType::CheckoutCharge,
            vec![EntryInput {
                condition: Some(Condition::Missing),
                replace_on_settle: true,
                ..entry(room.sheets, 0, true)
            }],
        );
        req.status = TransactionStatus::Pending;
        let mut tx = build(&room, req).unwrap();
        assert_eq!(tx.total_amount(), Money::new(1600));

        tx.complete(UserId::new(), Utc::now()).unwrap();
        tx.restore_on_settle(&mut room.snapshot, Utc::now()).unwrap();
        let line = room.snapshot.line(room.sheets).unwrap();
        assert_eq!((line.current_quantity, line.condition), (2, Condition::Good));
    }

    fn condition() -> impl Strategy<Value = Option<Condition>> {
        prop_oneof![
            Just(None),
            Just(Some(Condition::Worn)),
            Just(Some(Condition::Damaged)),
            Just(Some(Condition::Missing)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the total is the exact sum of entry costs and the guest flag
        /// follows the chargeable entries.
        #[test]
        fn total_amount_is_sum_of_entry_costs(
            towel_units in 1u32..50,
            sheet_units in 1u32..50,
            towel_condition in condition(),
            sheet_condition in condition(),
            charge_towels in any::<bool>(),
            charge_sheets in any::<bool>(),
        ) {
            let room = room();
            let entries = vec![
                EntryInput {
                    units: towel_units,
                    condition: towel_condition,
                    ..entry(room.towels, 0, charge_towels)
                },
                EntryInput {
                    units: sheet_units,
                    condition: sheet_condition,
                    ..entry(room.sheets, 0, charge_sheets)
                },
            ];
            let tx = build(&room, request(&room, TransactionType::Damage, entries)).unwrap();

            let sum: i64 = tx.entries().iter().map(|e| e.total_cost.amount()).sum();
            prop_assert_eq!(tx.total_amount().amount(), sum);
            prop_assert_eq!(tx.charged_to_guest(), charge_towels || charge_sheets);
            prop_assert!(tx.chargeable_amount() <= tx.total_amount());
        }
    }
}
