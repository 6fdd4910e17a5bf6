//! Billing module: pricing, the inventory transaction ledger and invoice reconciliation.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod event;
pub mod pricing;
pub mod reconcile;
pub mod transaction;

pub use event::LedgerEvent;
pub use pricing::{PriceBasis, PriceRule, PricingPolicy};
pub use reconcile::{BillingReconciler, InvoiceLine, ReconciliationPlan};
pub use transaction::{
    EntryInput, InventoryTransaction, TransactionEntry, TransactionOrigin, TransactionRequest,
    TransactionStatus, TransactionType,
};
