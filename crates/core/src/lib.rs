//! `innkeep-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{
    BookingId, CheckoutId, ConnectionId, HotelId, InspectionId, InvoiceId, InvoiceLineId, ItemId,
    NotificationId, RoomId, SnapshotId, TemplateId, TransactionId, UserId,
};
pub use money::{Money, Multiplier};
pub use value_object::ValueObject;
