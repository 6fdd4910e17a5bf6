//! Infrastructure layer: persistence, invoicing seam, engine orchestration and
//! notification routing.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod invoicing;
pub mod notify;
pub mod store;


pub use config::EngineConfig;
pub use engine::{
    CheckoutView, GuestCharge, GuestChargeItem, InspectionReport, InventoryEngine, NewTemplate,
    PostTransaction, Reconciliation, RecordInspection, SubmitCheckoutInspection,
};
pub use error::{EngineError, InvoicingError, StoreError};
pub use event::{DomainEnvelope, DomainEvent};
pub use invoicing::{InMemoryInvoicingClient, InvoicingClient, Submission};
pub use notify::{NotificationPump, NotificationRouter, PumpHandle};
pub use store::{BookingRecord, InMemoryInventoryStore, InventoryStore, LedgerKey, UnitOfWork};
