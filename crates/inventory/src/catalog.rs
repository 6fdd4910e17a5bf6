//! Master list of inventory item definitions for one hotel.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{DomainError, DomainResult, HotelId, ItemId, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Linen,
    Towel,
    Amenity,
    Minibar,
    Electronics,
    Furniture,
    Other,
}

/// Item definition. Pricing is frozen once a template references the item;
/// price changes go through [`ItemCatalog::supersede`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub hotel_id: HotelId,
    pub name: String,
    pub category: ItemCategory,
    /// Price charged for an extra unit (before markup).
    pub unit_price: Money,
    /// Cost basis for damage/missing/wear charges.
    pub replacement_price: Money,
    /// Provided free up to the template quantity; overage is chargeable.
    pub complimentary: bool,
    pub active: bool,
    pub superseded_by: Option<ItemId>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub category: ItemCategory,
    pub unit_price: Money,
    pub replacement_price: Money,
    pub complimentary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogEntry {
    definition: ItemDefinition,
    referenced: bool,
}

/// Hotel-scoped item catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCatalog {
    hotel_id: HotelId,
    items: HashMap<ItemId, CatalogEntry>,
    version: u64,
}

impl ItemCatalog {
    pub fn new(hotel_id: HotelId) -> Self {
        Self {
            hotel_id,
            items: HashMap::new(),
            version: 0,
        }
    }

    pub fn hotel_id(&self) -> HotelId {
        self.hotel_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Called by persistence after a successful write.
    pub fn committed(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemDefinition> {
        self.items.get(&id).map(|e| &e.definition)
    }

    pub fn require(&self, id: ItemId) -> DomainResult<&ItemDefinition> {
        self.get(id)
            .ok_or_else(|| DomainError::not_found(format!("item {id}")))
    }

    pub fn require_active(&self, id: ItemId) -> DomainResult<&ItemDefinition> {
        let item = self.require(id)?;
        if !item.active {
            return Err(DomainError::validation(format!(
                "item '{}' ({id}) is deactivated",
                item.name
            )));
        }
        Ok(item)
    }

    pub fn is_referenced(&self, id: ItemId) -> bool {
        self.items.get(&id).is_some_and(|e| e.referenced)
    }

    pub fn list(&self) -> Vec<&ItemDefinition> {
        let mut items: Vec<_> = self.items.values().map(|e| &e.definition).collect();
        items.sort_by_key(|d| d.id);
        items
    }

    pub fn register(
        &mut self,
        id: ItemId,
        item: NewItem,
        now: DateTime<Utc>,
    ) -> DomainResult<&ItemDefinition> {
        if self.items.contains_key(&id) {
            return Err(DomainError::conflict(format!("item {id} already exists")));
        }
        validate_new_item(&item)?;

        let definition = ItemDefinition {
            id,
            hotel_id: self.hotel_id,
            name: item.name.trim().to_string(),
            category: item.category,
            unit_price: item.unit_price,
            replacement_price: item.replacement_price,
            complimentary: item.complimentary,
            active: true,
            superseded_by: None,
            created_at: now,
        };
        let entry = self.items.entry(id).or_insert(CatalogEntry {
            definition,
            referenced: false,
        });
        Ok(&entry.definition)
    }

    /// Record that a template now references these items (freezes them).
    pub fn mark_referenced(&mut self, ids: impl IntoIterator<Item = ItemId>) -> DomainResult<()> {
        for id in ids {
            let entry = self
                .items
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("item {id}")))?;
            entry.referenced = true;
        }
        Ok(())
    }

    /// Reprice an item that no template references yet.
    pub fn update_pricing(
        &mut self,
        id: ItemId,
        unit_price: Money,
        replacement_price: Money,
    ) -> DomainResult<()> {
        let entry = self
            .items
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("item {id}")))?;
        if entry.referenced {
            return Err(DomainError::conflict(format!(
                "item {id} is referenced by a template; supersede it instead"
            )));
        }
        if unit_price.is_negative() || replacement_price.is_negative() {
            return Err(DomainError::validation("prices cannot be negative"));
        }
        entry.definition.unit_price = unit_price;
        entry.definition.replacement_price = replacement_price;
        Ok(())
    }

    /// Register `replacement` and deactivate `old`. The old definition stays
    /// readable so historical snapshots and ledger entries resolve.
    pub fn supersede(
        &mut self,
        old: ItemId,
        new_id: ItemId,
        replacement: NewItem,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let old_active = self.require(old)?.active;
        if !old_active {
            return Err(DomainError::conflict(format!("item {old} is already deactivated")));
        }
        self.register(new_id, replacement, now)?;
        if let Some(entry) = self.items.get_mut(&old) {
            entry.definition.active = false;
            entry.definition.superseded_by = Some(new_id);
        }
        Ok(())
    }
}

fn validate_new_item(item: &NewItem) -> DomainResult<()> {
    if item.name.trim().is_empty() {
        return Err(DomainError::validation("item name cannot be empty"));
    }
    if item.unit_price.is_negative() || item.replacement_price.is_negative() {
        return Err(DomainError::validation("prices cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheets() -> NewItem {
        NewItem {
            name: "Bed sheet set".to_string(),
            category: ItemCategory::Linen,
            unit_price: Money::new(500),
            replacement_price: Money::new(800),
            complimentary: true,
        }
    }

    #[test]
    fn register_rejects_blank_name_and_negative_prices() {
        let mut catalog = ItemCatalog::new(HotelId::new());
        let mut item = sheets();
        item.name = "  ".to_string();
        assert!(matches!(
            catalog.register(ItemId::new(), item, Utc::now()),
            Err(DomainError::Validation(_))
        ));

        let mut item = sheets();
        item.replacement_price = Money::new(-1);
        assert!(matches!(
            catalog.register(ItemId::new(), item, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn referenced_items_cannot_be_repriced() {
        let mut catalog = ItemCatalog::new(HotelId::new());
        let id = ItemId::new();
        catalog.register(id, sheets(), Utc::now()).unwrap();
        catalog
            .update_pricing(id, Money::new(550), Money::new(850))
            .unwrap();

        catalog.mark_referenced([id]).unwrap();
        let err = catalog
            .update_pricing(id, Money::new(600), Money::new(900))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn supersede_deactivates_but_keeps_old_definition() {
        let mut catalog = ItemCatalog::new(HotelId::new());
        let old = ItemId::new();
        let new = ItemId::new();
        catalog.register(old, sheets(), Utc::now()).unwrap();
        catalog.mark_referenced([old]).unwrap();

        let mut replacement = sheets();
        replacement.replacement_price = Money::new(900);
        catalog.supersede(old, new, replacement, Utc::now()).unwrap();

        let old_def = catalog.get(old).unwrap();
        assert!(!old_def.active);
        assert_eq!(old_def.superseded_by, Some(new));
        assert!(catalog.require_active(old).is_err());
        assert_eq!(catalog.require_active(new).unwrap().replacement_price, Money::new(900));
    }
}
