use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_billing::LedgerEvent;
use innkeep_checkout::CheckoutEvent;
use innkeep_events::{Event, EventEnvelope};
use innkeep_inventory::InventoryEvent;

pub const SNAPSHOT_AGGREGATE: &str = "inventory.snapshot";
pub const TRANSACTION_AGGREGATE: &str = "billing.transaction";
pub const CHECKOUT_AGGREGATE: &str = "checkout.inspection";
pub const INVOICE_AGGREGATE: &str = "billing.invoice";

/// Every event the engine publishes after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Inventory(InventoryEvent),
    Ledger(LedgerEvent),
    Checkout(CheckoutEvent),
}

pub type DomainEnvelope = EventEnvelope<DomainEvent>;

impl Event for DomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Inventory(e) => e.event_type(),
            DomainEvent::Ledger(e) => e.event_type(),
            DomainEvent::Checkout(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            DomainEvent::Inventory(e) => e.version(),
            DomainEvent::Ledger(e) => e.version(),
            DomainEvent::Checkout(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::Inventory(e) => e.occurred_at(),
            DomainEvent::Ledger(e) => e.occurred_at(),
            DomainEvent::Checkout(e) => e.occurred_at(),
        }
    }
}

impl From<InventoryEvent> for DomainEvent {
    fn from(value: InventoryEvent) -> Self {
        DomainEvent::Inventory(value)
    }
}

impl From<LedgerEvent> for DomainEvent {
    fn from(value: LedgerEvent) -> Self {
        DomainEvent::Ledger(value)
    }
}

impl From<CheckoutEvent> for DomainEvent {
    fn from(value: CheckoutEvent) -> Self {
        DomainEvent::Checkout(value)
    }
}
