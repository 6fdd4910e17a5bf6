use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use innkeep_billing::InventoryTransaction;
use innkeep_checkout::CheckoutInspection;
use innkeep_core::{
    AggregateRoot, BookingId, CheckoutId, ExpectedVersion, HotelId, InspectionId, RoomId,
    TemplateId, TransactionId, UserId,
};
use innkeep_inventory::{InspectionRecord, ItemCatalog, RoomInventorySnapshot, RoomTemplate};

use crate::error::StoreError;
use crate::store::r#trait::{BookingRecord, InventoryStore, LedgerKey, LedgerView};
use crate::store::unit_of_work::{Committed, UnitOfWork, expected_for};

#[derive(Debug, Default)]
struct State {
    catalogs: HashMap<HotelId, ItemCatalog>,
    /// Versions in order; index `v - 1` holds version `v`.
    templates: HashMap<TemplateId, Vec<RoomTemplate>>,
    snapshots: HashMap<RoomId, RoomInventorySnapshot>,
    inspections: HashMap<RoomId, Vec<InspectionRecord>>,
    inspection_ids: HashSet<InspectionId>,
    transactions: HashMap<TransactionId, InventoryTransaction>,
    ledgers: HashMap<LedgerKey, Vec<TransactionId>>,
    checkouts: HashMap<CheckoutId, CheckoutInspection>,
    bookings: HashMap<BookingId, BookingRecord>,
}

fn check(what: &str, expected: ExpectedVersion, actual: Option<u64>) -> Result<(), StoreError> {
    if expected.matches(actual) {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "{what}: expected {expected:?}, found {actual:?}"
        )))
    }
}

impl State {
    fn ledger_len(&self, key: &LedgerKey) -> u64 {
        self.ledgers.get(key).map_or(0, |ids| ids.len() as u64)
    }

    fn validate(&self, uow: &UnitOfWork) -> Result<(), StoreError> {
        if let Some(catalog) = &uow.catalog {
            let stored = self.catalogs.get(&catalog.hotel_id()).map(ItemCatalog::version);
            check("catalog", expected_for(catalog.version()), stored)?;
        }

        if let Some(template) = &uow.template {
            let latest = self.templates.get(&template.id).map_or(0, |v| v.len() as u32);
            if template.version != latest + 1 {
                return Err(StoreError::Conflict(format!(
                    "template {}: expected version {}, got {}",
                    template.id,
                    latest + 1,
                    template.version
                )));
            }
        }

        if let Some(snapshot) = &uow.snapshot {
            let stored = self.snapshots.get(&snapshot.room_id()).map(|s| s.version());
            check(
                &format!("snapshot for room {}", snapshot.room_id()),
                expected_for(snapshot.version()),
                stored,
            )?;
        }

        let mut new_inspections = HashSet::new();
        for record in &uow.inspections {
            if self.inspection_ids.contains(&record.id) || !new_inspections.insert(record.id) {
                return Err(StoreError::Conflict(format!("inspection {} already recorded", record.id)));
            }
        }

        for append in &uow.appends {
            let current = self.ledger_len(&append.key);
            if current != append.expected_sequence {
                return Err(StoreError::Conflict(format!(
                    "ledger {:?}: expected sequence {}, found {current}",
                    append.key, append.expected_sequence
                )));
            }
            for tx in &append.transactions {
                if self.transactions.contains_key(tx.id()) {
                    return Err(StoreError::Conflict(format!("transaction {} already exists", tx.id())));
                }
            }
        }

        for tx in &uow.updated_transactions {
            let stored = self.transactions.get(tx.id()).map(|t| t.version());
            if stored.is_none() {
                return Err(StoreError::NotFound(format!("transaction {}", tx.id())));
            }
            check(
                &format!("transaction {}", tx.id()),
                ExpectedVersion::Exact(tx.version()),
                stored,
            )?;
        }

        if let Some(checkout) = &uow.checkout {
            let stored = self.checkouts.get(checkout.id()).map(|c| c.version());
            check(
                &format!("checkout {}", checkout.id()),
                expected_for(checkout.version()),
                stored,
            )?;
            if stored.is_none() {
                let open = self.checkouts.values().any(|c| {
                    c.booking_id() == checkout.booking_id() && c.status().is_open()
                });
                if open {
                    return Err(StoreError::Conflict(format!(
                        "booking {} already has an open checkout",
                        checkout.booking_id()
                    )));
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, uow: UnitOfWork) -> Committed {
        let mut committed = Committed::default();

        if let Some(catalog) = uow.catalog {
            let next = catalog.version() + 1;
            let catalog = catalog.committed(next);
            self.catalogs.insert(catalog.hotel_id(), catalog.clone());
            committed.catalog = Some(catalog);
        }

        if let Some(template) = uow.template {
            self.templates
                .entry(template.id)
                .or_default()
                .push(template.clone());
            committed.template = Some(template);
        }

        if let Some(snapshot) = uow.snapshot {
            let next = snapshot.version() + 1;
            let snapshot = snapshot.committed(next);
            if let Some(b) = snapshot.booking() {
                self.bookings.entry(b.booking_id).or_insert(BookingRecord {
                    booking_id: b.booking_id,
                    hotel_id: snapshot.hotel_id(),
                    room_id: snapshot.room_id(),
                    guest_id: b.guest_id,
                });
            }
            self.snapshots.insert(snapshot.room_id(), snapshot.clone());
            committed.snapshot = Some(snapshot);
        }

        for record in uow.inspections {
            self.inspection_ids.insert(record.id);
            self.inspections.entry(record.room_id).or_default().push(record);
        }

        for append in uow.appends {
            let mut sequence = self.ledger_len(&append.key);
            for tx in append.transactions {
                sequence += 1;
                let tx = tx.sequenced(sequence).committed(1);
                self.ledgers.entry(append.key).or_default().push(tx.id_typed());
                self.transactions.insert(tx.id_typed(), tx.clone());
                committed.appended.push(tx);
            }
        }

        for tx in uow.updated_transactions {
            let next = tx.version() + 1;
            let tx = tx.committed(next);
            self.transactions.insert(tx.id_typed(), tx.clone());
            committed.updated.push(tx);
        }

        if let Some(checkout) = uow.checkout {
            let next = checkout.version() + 1;
            let checkout = checkout.committed(next);
            self.checkouts.insert(checkout.id_typed(), checkout.clone());
            committed.checkout = Some(checkout);
        }

        committed
    }
}

/// In-memory store for tests/dev. One lock makes every commit atomic.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn catalog(&self, hotel_id: HotelId) -> Result<ItemCatalog, StoreError> {
        let state = self.read()?;
        Ok(state
            .catalogs
            .get(&hotel_id)
            .cloned()
            .unwrap_or_else(|| ItemCatalog::new(hotel_id)))
    }

    fn template(&self, template_id: TemplateId, version: Option<u32>) -> Result<RoomTemplate, StoreError> {
        let state = self.read()?;
        let versions = state
            .templates
            .get(&template_id)
            .ok_or_else(|| StoreError::NotFound(format!("template {template_id}")))?;
        let found = match version {
            None => versions.last(),
            Some(v) => v.checked_sub(1).and_then(|i| versions.get(i as usize)),
        };
        found.cloned().ok_or_else(|| {
            StoreError::NotFound(format!("template {template_id} version {version:?}"))
        })
    }

    fn templates(&self, hotel_id: HotelId) -> Result<Vec<RoomTemplate>, StoreError> {
        let state = self.read()?;
        let mut out: Vec<RoomTemplate> = state
            .templates
            .values()
            .filter_map(|versions| versions.last())
            .filter(|t| t.hotel_id == hotel_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn snapshot(&self, room_id: RoomId) -> Result<Option<RoomInventorySnapshot>, StoreError> {
        Ok(self.read()?.snapshots.get(&room_id).cloned())
    }

    fn inspections(&self, room_id: RoomId) -> Result<Vec<InspectionRecord>, StoreError> {
        Ok(self.read()?.inspections.get(&room_id).cloned().unwrap_or_default())
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<InventoryTransaction>, StoreError> {
        Ok(self.read()?.transactions.get(&id).cloned())
    }

    fn ledger(&self, key: LedgerKey) -> Result<LedgerView, StoreError> {
        let state = self.read()?;
        let ids = state.ledgers.get(&key).map(Vec::as_slice).unwrap_or_default();
        Ok(LedgerView {
            sequence: ids.len() as u64,
            transactions: ids
                .iter()
                .filter_map(|id| state.transactions.get(id).cloned())
                .collect(),
        })
    }

    fn checkout(&self, id: CheckoutId) -> Result<Option<CheckoutInspection>, StoreError> {
        Ok(self.read()?.checkouts.get(&id).cloned())
    }

    fn open_checkout(&self, booking_id: BookingId) -> Result<Option<CheckoutInspection>, StoreError> {
        Ok(self
            .read()?
            .checkouts
            .values()
            .find(|c| c.booking_id() == booking_id && c.status().is_open())
            .cloned())
    }

    fn booking(&self, booking_id: BookingId) -> Result<Option<BookingRecord>, StoreError> {
        Ok(self.read()?.bookings.get(&booking_id).copied())
    }

    fn guest_bookings(&self, guest_id: UserId) -> Result<Vec<BookingRecord>, StoreError> {
        Ok(self
            .read()?
            .bookings
            .values()
            .filter(|b| b.guest_id == guest_id)
            .copied()
            .collect())
    }

    fn commit(&self, uow: UnitOfWork) -> Result<Committed, StoreError> {
        let mut state = self.write()?;
        state.validate(&uow)?;
        Ok(state.apply(uow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use innkeep_core::{ItemId, Money, SnapshotId};
    use innkeep_inventory::{ItemCategory, NewItem, TemplateLine};
    use std::collections::BTreeSet;

    fn seeded() -> (InMemoryInventoryStore, RoomTemplate) {
        let store = InMemoryInventoryStore::new();
        let hotel = HotelId::new();
        let now = Utc::now();
        let mut catalog = store.catalog(hotel).unwrap();
        let towels = ItemId::new();
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
            "Single",
            BTreeSet::from(["single".to_string()]),
            vec![TemplateLine { item_id: towels, default_quantity: 2 }],
            &catalog,
            now,
        )
        .unwrap();
        store
            .commit(UnitOfWork::new().put_catalog(catalog).put_template(template.clone()))
            .unwrap();
        (store, template)
    }

    #[test]
    fn stale_snapshot_write_is_rejected_atomically() {
        let (store, template) = seeded();
        let (snapshot, _) =
            RoomInventorySnapshot::from_template(SnapshotId::new(), RoomId::new(), &template, Utc::now());
        let room_id = snapshot.room_id();
        store.commit(UnitOfWork::new().put_snapshot(snapshot.clone())).unwrap();

        let loaded = store.snapshot(room_id).unwrap().unwrap();
        assert_eq!(loaded.version(), 1);
        store.commit(UnitOfWork::new().put_snapshot(loaded.clone())).unwrap();

        // Second writer still holds version 1, and its catalog write must not land either.
        let catalog = store.catalog(template.hotel_id).unwrap();
        let err = store
            .commit(UnitOfWork::new().put_snapshot(loaded).put_catalog(catalog.clone()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.catalog(template.hotel_id).unwrap().version(), catalog.version());
    }

    #[test]
    fn second_snapshot_for_a_room_conflicts() {
        let (store, template) = seeded();
        let room_id = RoomId::new();
        let (a, _) = RoomInventorySnapshot::from_template(SnapshotId::new(), room_id, &template, Utc::now());
        let (b, _) = RoomInventorySnapshot::from_template(SnapshotId::new(), room_id, &template, Utc::now());
        store.commit(UnitOfWork::new().put_snapshot(a)).unwrap();
        assert!(matches!(
            store.commit(UnitOfWork::new().put_snapshot(b)),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn template_versions_must_be_contiguous() {
        let (store, template) = seeded();
        assert!(matches!(
            store.commit(UnitOfWork::new().put_template(template.clone())),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.template(template.id, None).unwrap().version, 1);
        assert!(matches!(
            store.template(template.id, Some(2)),
            Err(StoreError::NotFound(_))
        ));
    }
}
