use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use innkeep_core::{HotelId, ItemId, Money, TemplateId};
use innkeep_events::EventBus;
use innkeep_inventory::{ItemDefinition, NewItem, RoomTemplate, TemplateLine};

use super::{InventoryEngine, not_returned};
use crate::error::EngineError;
use crate::event::DomainEnvelope;
use crate::store::{Committed, InventoryStore, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub room_types: BTreeSet<String>,
    pub lines: Vec<TemplateLine>,
}

fn committed_item(committed: &Committed, item_id: ItemId) -> Result<ItemDefinition, EngineError> {
    committed
        .catalog
        .as_ref()
        .and_then(|c| c.get(item_id))
        .cloned()
        .ok_or_else(|| not_returned("catalog"))
}

impl<S, B> InventoryEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<DomainEnvelope>,
{
    pub fn register_item(&self, hotel_id: HotelId, item: NewItem) -> Result<ItemDefinition, EngineError> {
        let item_id = ItemId::new();
        self.run("register_item", || {
            let mut catalog = self.store.catalog(hotel_id)?;
            catalog.register(item_id, item.clone(), Utc::now())?;
            let committed = self.store.commit(UnitOfWork::new().put_catalog(catalog))?;
            let definition = committed_item(&committed, item_id)?;
            tracing::info!(hotel_id = %hotel_id, item_id = %item_id, name = %definition.name, "item registered");
            Ok((definition, Vec::new()))
        })
    }

    pub fn update_item_pricing(
        &self,
        hotel_id: HotelId,
        item_id: ItemId,
        unit_price: Money,
        replacement_price: Money,
    ) -> Result<ItemDefinition, EngineError> {
        self.run("update_item_pricing", || {
            let mut catalog = self.store.catalog(hotel_id)?;
            catalog.update_pricing(item_id, unit_price, replacement_price)?;
            let committed = self.store.commit(UnitOfWork::new().put_catalog(catalog))?;
            tracing::info!(hotel_id = %hotel_id, item_id = %item_id, "item repriced");
            Ok((committed_item(&committed, item_id)?, Vec::new()))
        })
    }

    /// Register `replacement` as a new item and deactivate `old`.
    pub fn supersede_item(
        &self,
        hotel_id: HotelId,
        old: ItemId,
        replacement: NewItem,
    ) -> Result<ItemDefinition, EngineError> {
        let new_id = ItemId::new();
        self.run("supersede_item", || {
            let mut catalog = self.store.catalog(hotel_id)?;
            catalog.supersede(old, new_id, replacement.clone(), Utc::now())?;
            let committed = self.store.commit(UnitOfWork::new().put_catalog(catalog))?;
            tracing::info!(hotel_id = %hotel_id, old = %old, new = %new_id, "item superseded");
            Ok((committed_item(&committed, new_id)?, Vec::new()))
        })
    }

    pub fn list_items(&self, hotel_id: HotelId) -> Result<Vec<ItemDefinition>, EngineError> {
        let catalog = self.store.catalog(hotel_id)?;
        Ok(catalog.list().into_iter().cloned().collect())
    }

    /// Publish version 1 of a template. Its items become price-frozen.
    pub fn create_template(&self, hotel_id: HotelId, new: NewTemplate) -> Result<RoomTemplate, EngineError> {
        let template_id = TemplateId::new();
        self.run("create_template", || {
            let mut catalog = self.store.catalog(hotel_id)?;
            let template = RoomTemplate::new(
                template_id,
                new.name.clone(),
                new.room_types.clone(),
                new.lines.clone(),
                &catalog,
                Utc::now(),
            )?;
            catalog.mark_referenced(template.item_ids())?;
            let committed = self
                .store
                .commit(UnitOfWork::new().put_catalog(catalog).put_template(template))?;
            let template = committed.template.ok_or_else(|| not_returned("template"))?;
            tracing::info!(hotel_id = %hotel_id, template_id = %template.id, "template created");
            Ok((template, Vec::new()))
        })
    }

    /// Publish the next version of a template with a new line set.
    pub fn revise_template(
        &self,
        template_id: TemplateId,
        lines: Vec<TemplateLine>,
    ) -> Result<RoomTemplate, EngineError> {
        self.run("revise_template", || {
            let current = self.store.template(template_id, None)?;
            let mut catalog = self.store.catalog(current.hotel_id)?;
            let next = current.revise(lines.clone(), &catalog, Utc::now())?;
            catalog.mark_referenced(next.item_ids())?;
            let committed = self
                .store
                .commit(UnitOfWork::new().put_catalog(catalog).put_template(next))?;
            let template = committed.template.ok_or_else(|| not_returned("template"))?;
            tracing::info!(template_id = %template_id, version = template.version, "template revised");
            Ok((template, Vec::new()))
        })
    }

    pub fn get_template(&self, template_id: TemplateId, version: Option<u32>) -> Result<RoomTemplate, EngineError> {
        Ok(self.store.template(template_id, version)?)
    }

    pub fn list_templates(&self, hotel_id: HotelId) -> Result<Vec<RoomTemplate>, EngineError> {
        Ok(self.store.templates(hotel_id)?)
    }
}
