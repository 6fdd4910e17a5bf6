//! Application-level orchestration of the room-inventory domain.
//!
//! Every operation follows the same pipeline:
//!
//! ```text
//! load (snapshot, catalog, ledger, checkout)
//!   ↓
//! decide (pure domain calls, no IO)
//!   ↓
//! commit one UnitOfWork (optimistic versions + ledger sequences)
//!   ↓  StoreError::Conflict → reload and retry, up to `commit_retries`
//! publish events to the bus (best effort)
//! ```
//!
//! A publish failure never rolls anything back: state is already committed and
//! the bus only feeds notifications.

mod catalog;
mod checkout;
mod ledger;
mod queries;
mod rooms;

use std::sync::Arc;

use chrono::Utc;

use innkeep_billing::{
    EntryInput, InventoryTransaction, LedgerEvent, TransactionOrigin, TransactionRequest,
    TransactionStatus, TransactionType,
};
use innkeep_checkout::{CheckoutEvent, CheckoutInspection};
use innkeep_core::{AggregateRoot, CheckoutId, RoomId, TransactionId, UserId};
use innkeep_events::{EventBus, EventEnvelope};
use innkeep_inventory::{
    InspectionEngine, InventoryEvent, ItemCatalog, ReplacementRequest, RoomInventorySnapshot,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, StoreError};
use crate::event::{
    CHECKOUT_AGGREGATE, DomainEnvelope, DomainEvent, SNAPSHOT_AGGREGATE, TRANSACTION_AGGREGATE,
};
use crate::invoicing::InvoicingClient;
use crate::store::InventoryStore;

pub use checkout::{CheckoutView, SubmitCheckoutInspection};
pub use ledger::{PostTransaction, Reconciliation};
pub use queries::{GuestCharge, GuestChargeItem};
pub use rooms::{InspectionReport, RecordInspection};
pub use catalog::NewTemplate;

/// Result of one attempt: the value to return plus the events to publish once committed.
type Attempt<T> = Result<(T, Vec<DomainEnvelope>), EngineError>;

pub struct InventoryEngine<S, B> {
    store: S,
    bus: B,
    invoicing: Arc<dyn InvoicingClient>,
    config: EngineConfig,
}

impl<S, B> InventoryEngine<S, B> {
    pub fn new(store: S, bus: B, invoicing: Arc<dyn InvoicingClient>, config: EngineConfig) -> Self {
        Self {
            store,
            bus,
            invoicing,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> InventoryEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<DomainEnvelope>,
{
    /// Run `attempt` until it commits, fails for a non-retryable reason, or the
    /// retry bound is hit. Events are published only for the attempt that committed.
    fn run<T>(&self, op: &'static str, mut attempt: impl FnMut() -> Attempt<T>) -> Result<T, EngineError> {
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt() {
                Ok((value, events)) => {
                    self.publish(events);
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && tries < self.config.commit_retries => {
                    tracing::warn!(op, attempt = tries, error = %err, "commit conflict; retrying against fresh state");
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::warn!(op, attempts = tries, error = %err, "giving up after repeated conflicts");
                    }
                    return Err(err);
                }
            }
        }
    }

    fn publish(&self, events: Vec<DomainEnvelope>) {
        for envelope in events {
            let event_type = innkeep_events::Event::event_type(envelope.payload());
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(event_type, error = ?err, "event publish failed after commit");
            }
        }
    }

    fn inspection_engine(&self) -> InspectionEngine<'_> {
        InspectionEngine::new(&self.config.pricing, self.config.staleness)
    }

    fn require_snapshot(&self, room_id: RoomId) -> Result<RoomInventorySnapshot, EngineError> {
        self.store
            .snapshot(room_id)?
            .ok_or_else(|| EngineError::not_found(format!("snapshot for room {room_id}")))
    }

    fn require_transaction(&self, id: TransactionId) -> Result<InventoryTransaction, EngineError> {
        self.store
            .transaction(id)?
            .ok_or_else(|| EngineError::not_found(format!("transaction {id}")))
    }

    fn require_checkout(&self, id: CheckoutId) -> Result<CheckoutInspection, EngineError> {
        self.store
            .checkout(id)?
            .ok_or_else(|| EngineError::not_found(format!("checkout {id}")))
    }

    /// Price inspection requests into pending ledger transactions, one per type.
    #[allow(clippy::too_many_arguments)]
    fn pending_transactions<'r>(
        &self,
        snapshot: &RoomInventorySnapshot,
        catalog: &ItemCatalog,
        requests: impl Iterator<Item = &'r ReplacementRequest>,
        checkout: bool,
        processed_by: UserId,
        origin: TransactionOrigin,
        now: chrono::DateTime<Utc>,
    ) -> Result<Vec<InventoryTransaction>, EngineError> {
        let mut grouped: std::collections::BTreeMap<TransactionType, Vec<EntryInput>> =
            std::collections::BTreeMap::new();
        for request in requests {
            grouped
                .entry(TransactionType::for_finding(checkout, request.charge_guest))
                .or_default()
                .push(EntryInput::from(request));
        }

        grouped
            .into_iter()
            .map(|(kind, entries)| {
                let request = TransactionRequest {
                    id: TransactionId::new(),
                    booking_id: snapshot.booking_id(),
                    kind,
                    entries,
                    processed_by,
                    origin,
                    status: TransactionStatus::Pending,
                };
                InventoryTransaction::build(request, snapshot, catalog, &self.config.pricing, now)
                    .map_err(EngineError::from)
            })
            .collect()
    }
}

fn snapshot_envelope(snapshot: &RoomInventorySnapshot, event: InventoryEvent) -> DomainEnvelope {
    EventEnvelope::new(
        snapshot.hotel_id(),
        snapshot.id_typed(),
        SNAPSHOT_AGGREGATE,
        snapshot.version(),
        DomainEvent::from(event),
    )
}

fn transaction_envelope(tx: &InventoryTransaction, event: LedgerEvent) -> DomainEnvelope {
    EventEnvelope::new(
        tx.hotel_id(),
        tx.id_typed(),
        TRANSACTION_AGGREGATE,
        tx.sequence(),
        DomainEvent::from(event),
    )
}

fn checkout_envelope(checkout: &CheckoutInspection, event: CheckoutEvent) -> DomainEnvelope {
    EventEnvelope::new(
        checkout.hotel_id(),
        checkout.id_typed(),
        CHECKOUT_AGGREGATE,
        checkout.version(),
        DomainEvent::from(event),
    )
}

/// A commit that succeeded but did not hand back what was written.
fn not_returned(what: &str) -> EngineError {
    EngineError::Store(StoreError::Unavailable(format!("commit did not return the {what}")))
}
