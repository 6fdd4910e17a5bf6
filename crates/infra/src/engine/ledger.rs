use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use innkeep_billing::{
    BillingReconciler, EntryInput, InventoryTransaction, InvoiceLine, LedgerEvent,
    ReconciliationPlan, TransactionOrigin, TransactionRequest, TransactionStatus, TransactionType,
};
use innkeep_core::{BookingId, InvoiceId, InvoiceLineId, RoomId, TransactionId, UserId};
use innkeep_events::{EventBus, EventEnvelope};
use innkeep_inventory::InventoryEvent;

use super::{InventoryEngine, not_returned, snapshot_envelope, transaction_envelope};
use crate::error::EngineError;
use crate::event::{DomainEnvelope, DomainEvent, INVOICE_AGGREGATE};
use crate::store::{InventoryStore, LedgerKey, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTransaction {
    pub room_id: RoomId,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(rename = "transaction_type")]
    pub kind: TransactionType,
    pub entries: Vec<EntryInput>,
    pub processed_by: UserId,
}

/// Lines handed to invoicing. Empty (and no invoice) when nothing new was billable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub booking_id: BookingId,
    pub invoice_id: Option<InvoiceId>,
    pub lines: Vec<InvoiceLine>,
}

impl<S, B> InventoryEngine<S, B>
where
    S: InventoryStore,
    B: EventBus<DomainEnvelope>,
{
    /// Price and append a completed transaction, applying its quantity deltas to
    /// the snapshot in the same commit. Direct posts settle immediately, so
    /// replace-on-settle lines are restored in that commit as well.
    pub fn post_transaction(&self, cmd: PostTransaction) -> Result<InventoryTransaction, EngineError> {
        let tx_id = TransactionId::new();
        self.run("post_transaction", || {
            let now = Utc::now();
            let mut snapshot = self.require_snapshot(cmd.room_id)?;
            let catalog = self.store.catalog(snapshot.hotel_id())?;
            let key = LedgerKey::for_transaction(cmd.room_id, cmd.booking_id);
            let ledger = self.store.ledger(key)?;

            let request = TransactionRequest {
                id: tx_id,
                booking_id: cmd.booking_id,
                kind: cmd.kind,
                entries: cmd.entries.clone(),
                processed_by: cmd.processed_by,
                origin: TransactionOrigin::Direct,
                status: TransactionStatus::Completed,
            };
            let tx = InventoryTransaction::build(request, &snapshot, &catalog, &self.config.pricing, now)?;
            let mut changes = tx.apply_to(&mut snapshot, now)?;
            changes.extend(tx.restore_on_settle(&mut snapshot, now)?);
            let status = snapshot.refresh_status(now, self.config.staleness, false);

            let committed = self.store.commit(
                UnitOfWork::new()
                    .put_snapshot(snapshot)
                    .append(key, ledger.sequence, tx),
            )?;
            let snapshot = committed.snapshot.ok_or_else(|| not_returned("snapshot"))?;
            let tx = committed
                .appended
                .into_iter()
                .next()
                .ok_or_else(|| not_returned("transaction"))?;

            tracing::info!(
                room_id = %cmd.room_id,
                booking_id = ?cmd.booking_id,
                transaction_id = %tx_id,
                kind = %tx.kind(),
                total = %tx.total_amount(),
                "transaction posted"
            );

            let events = vec![
                snapshot_envelope(
                    &snapshot,
                    InventoryEvent::LinesAdjusted {
                        room_id: cmd.room_id,
                        snapshot_id: snapshot.id_typed(),
                        status,
                        changes,
                        occurred_at: now,
                    },
                ),
                transaction_envelope(&tx, tx.posted_event()),
            ];
            Ok((tx, events))
        })
    }

    /// Settle a pending transaction. Replace-on-settle lines are restored in the
    /// same commit, but only while the room still holds the transaction's
    /// booking; after turnover the lines belong to someone else.
    pub fn complete_transaction(
        &self,
        transaction_id: TransactionId,
        processed_by: UserId,
    ) -> Result<InventoryTransaction, EngineError> {
        self.run("complete_transaction", || {
            let now = Utc::now();
            let mut tx = self.require_transaction(transaction_id)?;
            let event = tx.complete(processed_by, now)?;

            let mut uow = UnitOfWork::new();
            let mut adjusted = None;
            let snapshot = match self.store.snapshot(tx.room_id())? {
                Some(s) if s.booking_id() == tx.booking_id() => Some(s),
                Some(s) => {
                    tracing::debug!(
                        transaction_id = %transaction_id,
                        room_id = %tx.room_id(),
                        current_booking = ?s.booking_id(),
                        "room has turned over; lines left as they are"
                    );
                    None
                }
                None => None,
            };
            if let Some(mut snapshot) = snapshot {
                let changes = tx.restore_on_settle(&mut snapshot, now)?;
                if !changes.is_empty() {
                    let status = snapshot.refresh_status(now, self.config.staleness, false);
                    adjusted = Some(InventoryEvent::LinesAdjusted {
                        room_id: snapshot.room_id(),
                        snapshot_id: snapshot.id_typed(),
                        status,
                        changes,
                        occurred_at: now,
                    });
                    uow = uow.put_snapshot(snapshot);
                }
            }

            let committed = self.store.commit(uow.update_transaction(tx))?;
            let tx = committed
                .updated
                .into_iter()
                .next()
                .ok_or_else(|| not_returned("transaction"))?;
            tracing::info!(transaction_id = %transaction_id, room_id = %tx.room_id(), "transaction completed");

            let mut events = Vec::with_capacity(2);
            if let (Some(snapshot), Some(adjusted)) = (committed.snapshot.as_ref(), adjusted) {
                events.push(snapshot_envelope(snapshot, adjusted));
            }
            events.push(transaction_envelope(&tx, event));
            Ok((tx, events))
        })
    }

    pub fn cancel_transaction(
        &self,
        transaction_id: TransactionId,
        processed_by: UserId,
        reason: Option<String>,
    ) -> Result<InventoryTransaction, EngineError> {
        self.run("cancel_transaction", || {
            let mut tx = self.require_transaction(transaction_id)?;
            let event = tx.cancel(processed_by, reason.clone(), Utc::now())?;
            let committed = self.store.commit(UnitOfWork::new().update_transaction(tx))?;
            let tx = committed
                .updated
                .into_iter()
                .next()
                .ok_or_else(|| not_returned("transaction"))?;
            tracing::info!(transaction_id = %transaction_id, "transaction cancelled");
            let events = vec![transaction_envelope(&tx, event)];
            Ok((tx, events))
        })
    }

    /// Group the booking's settled, uninvoiced guest charges into invoice lines
    /// and hand them to invoicing.
    ///
    /// Transactions are claimed before the collaborator is called, so a
    /// concurrent reconciliation cannot bill them twice. A failed submission
    /// releases the claim.
    pub fn reconcile_for_invoice(&self, booking_id: BookingId) -> Result<Reconciliation, EngineError> {
        let (plan, hotel_id) = self.run("reconcile_for_invoice", || {
            let ledger = self.store.ledger(LedgerKey::Booking(booking_id))?;
            let plan = BillingReconciler::plan(booking_id, &ledger.transactions, InvoiceLineId::new);
            if plan.is_empty() {
                return Ok(((plan, None), Vec::new()));
            }

            let claimed: HashSet<TransactionId> = plan.claimed_transactions().map(|(id, _)| id).collect();
            let mut transactions: Vec<InventoryTransaction> = ledger
                .transactions
                .into_iter()
                .filter(|t| claimed.contains(&t.id_typed()))
                .collect();
            BillingReconciler::claim(&plan, &mut transactions)?;
            let hotel_id = transactions.first().map(|t| t.hotel_id());

            let uow = transactions
                .into_iter()
                .fold(UnitOfWork::new(), UnitOfWork::update_transaction);
            self.store.commit(uow)?;
            Ok(((plan, hotel_id), Vec::new()))
        })?;

        let Some(hotel_id) = hotel_id else {
            tracing::debug!(booking_id = %booking_id, "nothing new to reconcile");
            return Ok(Reconciliation {
                booking_id,
                invoice_id: None,
                lines: Vec::new(),
            });
        };

        match self.invoicing.submit(booking_id, &plan.lines) {
            Ok(invoice_id) => {
                tracing::info!(
                    booking_id = %booking_id,
                    invoice_id = %invoice_id,
                    lines = plan.lines.len(),
                    total = %plan.total(),
                    "charges reconciled"
                );
                let event = LedgerEvent::InvoiceReconciled {
                    hotel_id,
                    booking_id,
                    invoice_id,
                    line_count: plan.lines.len(),
                    total_amount: plan.total(),
                    occurred_at: Utc::now(),
                };
                self.publish(vec![EventEnvelope::new(
                    hotel_id,
                    invoice_id,
                    INVOICE_AGGREGATE,
                    1,
                    DomainEvent::from(event),
                )]);
                Ok(Reconciliation {
                    booking_id,
                    invoice_id: Some(invoice_id),
                    lines: plan.lines,
                })
            }
            Err(err) => {
                tracing::warn!(booking_id = %booking_id, error = %err, "invoice submission failed; releasing claim");
                if let Err(release) = self.release_claim(&plan) {
                    tracing::error!(booking_id = %booking_id, error = %release, "failed to release invoice claim");
                }
                Err(err.into())
            }
        }
    }

    fn release_claim(&self, plan: &ReconciliationPlan) -> Result<(), EngineError> {
        self.run("reconcile_for_invoice.release", || {
            let mut transactions = Vec::new();
            for (id, _) in plan.claimed_transactions() {
                transactions.push(self.require_transaction(id)?);
            }
            BillingReconciler::release(plan, &mut transactions);
            let uow = transactions
                .into_iter()
                .fold(UnitOfWork::new(), UnitOfWork::update_transaction);
            self.store.commit(uow)?;
            Ok(((), Vec::new()))
        })
    }
}
