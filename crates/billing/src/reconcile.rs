//! Grouping of settled guest charges into invoice lines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use innkeep_core::{BookingId, DomainError, DomainResult, InvoiceLineId, Money, TransactionId};

use crate::transaction::{InventoryTransaction, TransactionType};

/// Invoice line submitted to the invoicing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: InvoiceLineId,
    pub booking_id: BookingId,
    #[serde(rename = "transaction_type")]
    pub kind: TransactionType,
    pub description: String,
    pub amount: Money,
    pub transaction_ids: Vec<TransactionId>,
}

/// Lines to claim for one booking. Empty when nothing new is billable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconciliationPlan {
    pub lines: Vec<InvoiceLine>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(|l| l.amount).sum()
    }

    pub fn claimed_transactions(&self) -> impl Iterator<Item = (TransactionId, InvoiceLineId)> + '_ {
        self.lines
            .iter()
            .flat_map(|l| l.transaction_ids.iter().map(move |t| (*t, l.id)))
    }
}

pub struct BillingReconciler;

impl BillingReconciler {
    /// One line per transaction type, over completed guest charges not yet invoiced.
    pub fn plan(
        booking_id: BookingId,
        transactions: &[InventoryTransaction],
        mut next_line_id: impl FnMut() -> InvoiceLineId,
    ) -> ReconciliationPlan {
        let mut groups: BTreeMap<TransactionType, Vec<&InventoryTransaction>> = BTreeMap::new();
        for tx in transactions
            .iter()
            .filter(|t| t.booking_id() == Some(booking_id) && t.is_unbilled_charge())
        {
            groups.entry(tx.kind()).or_default().push(tx);
        }

        let lines = groups
            .into_iter()
            .map(|(kind, txs)| {
                let amount = txs.iter().map(|t| t.chargeable_amount()).sum();
                InvoiceLine {
                    id: next_line_id(),
                    booking_id,
                    kind,
                    description: describe(kind, txs.len()),
                    amount,
                    transaction_ids: txs.iter().map(|t| t.id_typed()).collect(),
                }
            })
            .collect();

        ReconciliationPlan { lines }
    }

    /// Link every planned transaction to its line. All-or-nothing.
    pub fn claim(
        plan: &ReconciliationPlan,
        transactions: &mut [InventoryTransaction],
    ) -> DomainResult<()> {
        for (tx_id, _) in plan.claimed_transactions() {
            let tx = transactions
                .iter()
                .find(|t| t.id_typed() == tx_id)
                .ok_or_else(|| DomainError::not_found(format!("transaction {tx_id}")))?;
            if !tx.is_unbilled_charge() {
                return Err(DomainError::conflict(format!(
                    "transaction {tx_id} was claimed by another reconciliation"
                )));
            }
        }
        for (tx_id, line_id) in plan.claimed_transactions() {
            if let Some(tx) = transactions.iter_mut().find(|t| t.id_typed() == tx_id) {
                tx.link_invoice_line(line_id)?;
            }
        }
        Ok(())
    }

    pub fn release(plan: &ReconciliationPlan, transactions: &mut [InventoryTransaction]) {
        for (tx_id, line_id) in plan.claimed_transactions() {
            if let Some(tx) = transactions.iter_mut().find(|t| t.id_typed() == tx_id) {
                tx.release_invoice_line(line_id);
            }
        }
    }
}

fn describe(kind: TransactionType, count: usize) -> String {
    let label = match kind {
        TransactionType::Replacement => "Replacements",
        TransactionType::ExtraRequest => "Extra item requests",
        TransactionType::Damage => "Damage charges",
        TransactionType::CheckoutCharge => "Checkout charges",
    };
    if count == 1 {
        label.to_string()
    } else {
        format!("{label} ({count} transactions)")
    }
}
