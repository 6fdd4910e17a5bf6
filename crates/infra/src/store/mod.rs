//! Persistence boundary for the room-inventory engine.
//!
//! Reads are plain lookups. Every write goes through one [`UnitOfWork`], which
//! the store applies atomically after checking all of its optimistic versions.

pub mod in_memory;
pub mod r#trait;
pub mod unit_of_work;

pub use in_memory::InMemoryInventoryStore;
pub use r#trait::{BookingRecord, InventoryStore, LedgerKey, LedgerView};
pub use unit_of_work::{Committed, UnitOfWork};
