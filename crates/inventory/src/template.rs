//! Per-room-type default item sets.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{DomainError, DomainResult, HotelId, ItemId, TemplateId};

use crate::catalog::ItemCatalog;

/// Reference to one immutable template version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    pub template_id: TemplateId,
    pub version: u32,
}

impl core::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@v{}", self.template_id, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateLine {
    pub item_id: ItemId,
    pub default_quantity: u32,
}

/// A template version. Revisions produce a new value; stored versions never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTemplate {
    pub id: TemplateId,
    pub hotel_id: HotelId,
    pub version: u32,
    pub name: String,
    pub room_types: BTreeSet<String>,
    pub lines: Vec<TemplateLine>,
    pub created_at: DateTime<Utc>,
}

impl RoomTemplate {
    /// Build version 1 of a template. Every item must be active in `catalog`.
    pub fn new(
        id: TemplateId,
        name: impl Into<String>,
        room_types: BTreeSet<String>,
        lines: Vec<TemplateLine>,
        catalog: &ItemCatalog,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("template name cannot be empty"));
        }
        if room_types.is_empty() {
            return Err(DomainError::validation("template must apply to at least one room type"));
        }
        validate_lines(&lines, catalog)?;

        Ok(Self {
            id,
            hotel_id: catalog.hotel_id(),
            version: 1,
            name,
            room_types,
            lines,
            created_at: now,
        })
    }

    /// Next version with a new line set.
    pub fn revise(
        &self,
        lines: Vec<TemplateLine>,
        catalog: &ItemCatalog,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_lines(&lines, catalog)?;
        Ok(Self {
            version: self.version + 1,
            lines,
            created_at: now,
            ..self.clone()
        })
    }

    pub fn reference(&self) -> TemplateRef {
        TemplateRef {
            template_id: self.id,
            version: self.version,
        }
    }

    pub fn line(&self, item_id: ItemId) -> Option<&TemplateLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.line(item_id).is_some()
    }

    pub fn applies_to(&self, room_type: &str) -> bool {
        self.room_types.contains(room_type)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.lines.iter().map(|l| l.item_id)
    }
}

fn validate_lines(lines: &[TemplateLine], catalog: &ItemCatalog) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("template must contain at least one item"));
    }
    let mut seen = HashSet::new();
    for line in lines {
        if !seen.insert(line.item_id) {
            return Err(DomainError::validation(format!(
                "item {} listed twice in template",
                line.item_id
            )));
        }
        if line.default_quantity == 0 {
            return Err(DomainError::validation(format!(
                "default quantity for item {} must be positive",
                line.item_id
            )));
        }
        catalog.require_active(line.item_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemCategory, NewItem};
    use innkeep_core::Money;

    fn catalog_with(n: usize) -> (ItemCatalog, Vec<ItemId>) {
        let mut catalog = ItemCatalog::new(HotelId::new());
        let ids: Vec<ItemId> = (0..n).map(|_| ItemId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            catalog
                .register(
                    *id,
                    NewItem {
                        name: format!("item-{i}"),
                        category: ItemCategory::Amenity,
                        unit_price: Money::new(100),
                        replacement_price: Money::new(150),
                        complimentary: false,
                    },
                    Utc::now(),
                )
                .unwrap();
        }
        (catalog, ids)
    }

    fn types() -> BTreeSet<String> {
        BTreeSet::from(["double".to_string()])
    }

    #[test]
    fn duplicate_items_are_rejected() {
        let (catalog, ids) = catalog_with(1);
        let lines = vec![
            TemplateLine { item_id: ids[0], default_quantity: 1 },
            TemplateLine { item_id: ids[0], default_quantity: 2 },
        ];
        let err = RoomTemplate::new(TemplateId::new(), "Double", types(), lines, &catalog, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn revise_bumps_version_and_keeps_identity() {
        let (catalog, ids) = catalog_with(2);
        let v1 = RoomTemplate::new(
            TemplateId::new(),
            "Double",
            types(),
            vec![TemplateLine { item_id: ids[0], default_quantity: 2 }],
            &catalog,
            Utc::now(),
        )
        .unwrap();

        let v2 = v1
            .revise(
                vec![
                    TemplateLine { item_id: ids[0], default_quantity: 3 },
                    TemplateLine { item_id: ids[1], default_quantity: 1 },
                ],
                &catalog,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(v2.id, v1.id);
        assert_eq!(v2.version, 2);
        assert_eq!(v1.line(ids[0]).unwrap().default_quantity, 2);
        assert!(v2.contains(ids[1]));
        assert!(v2.applies_to("double"));
    }

    #[test]
    fn unknown_items_are_not_found() {
        let (catalog, _) = catalog_with(0);
        let err = RoomTemplate::new(
            TemplateId::new(),
            "Suite",
            types(),
            vec![TemplateLine { item_id: ItemId::new(), default_quantity: 1 }],
            &catalog,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
