use innkeep_billing::InventoryTransaction;
use innkeep_checkout::CheckoutInspection;
use innkeep_core::{AggregateRoot, ExpectedVersion};
use innkeep_inventory::{InspectionRecord, ItemCatalog, RoomInventorySnapshot, RoomTemplate};

use crate::store::r#trait::LedgerKey;

/// Version-0 aggregates have never been stored.
pub(crate) fn expected_for(version: u64) -> ExpectedVersion {
    if version == 0 {
        ExpectedVersion::Absent
    } else {
        ExpectedVersion::Exact(version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LedgerAppend {
    pub key: LedgerKey,
    pub expected_sequence: u64,
    pub transactions: Vec<InventoryTransaction>,
}

/// Writes of one logical operation.
///
/// Each aggregate is checked against the version it was loaded at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    pub(crate) catalog: Option<ItemCatalog>,
    pub(crate) template: Option<RoomTemplate>,
    pub(crate) snapshot: Option<RoomInventorySnapshot>,
    pub(crate) inspections: Vec<InspectionRecord>,
    pub(crate) appends: Vec<LedgerAppend>,
    pub(crate) updated_transactions: Vec<InventoryTransaction>,
    pub(crate) checkout: Option<CheckoutInspection>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_catalog(mut self, catalog: ItemCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// A new template version; must be exactly one past the latest stored.
    pub fn put_template(mut self, template: RoomTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn put_snapshot(mut self, snapshot: RoomInventorySnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn record_inspection(mut self, record: InspectionRecord) -> Self {
        self.inspections.push(record);
        self
    }

    /// Append to a ledger that was read at `expected_sequence`.
    pub fn append(mut self, key: LedgerKey, expected_sequence: u64, tx: InventoryTransaction) -> Self {
        match self.appends.iter_mut().find(|a| a.key == key) {
            Some(existing) => existing.transactions.push(tx),
            None => self.appends.push(LedgerAppend {
                key,
                expected_sequence,
                transactions: vec![tx],
            }),
        }
        self
    }

    /// Replace a stored transaction (settlement, invoice claim).
    pub fn update_transaction(mut self, tx: InventoryTransaction) -> Self {
        self.updated_transactions.retain(|t| t.id() != tx.id());
        self.updated_transactions.push(tx);
        self
    }

    pub fn put_checkout(mut self, checkout: CheckoutInspection) -> Self {
        self.checkout = Some(checkout);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_none()
            && self.template.is_none()
            && self.snapshot.is_none()
            && self.inspections.is_empty()
            && self.appends.is_empty()
            && self.updated_transactions.is_empty()
            && self.checkout.is_none()
    }
}

/// The stored state after a commit, with versions and ledger sequences assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Committed {
    pub catalog: Option<ItemCatalog>,
    pub template: Option<RoomTemplate>,
    pub snapshot: Option<RoomInventorySnapshot>,
    pub appended: Vec<InventoryTransaction>,
    pub updated: Vec<InventoryTransaction>,
    pub checkout: Option<CheckoutInspection>,
}
