//! Checkout gate: the guest may only leave once inventory charges are settled.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod gate;

pub use gate::{
    ChecklistItem, CheckoutEvent, CheckoutEventKind, CheckoutInspection, CheckoutStatus,
    DamageRecord, InventoryVerification,
};
