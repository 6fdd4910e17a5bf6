//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**; they are defined entirely by their attribute
//! values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one, build a
/// new one.
///
/// - **Value Object**: `Money(1600)`, `Multiplier::from_bps(20_000)`
/// - **Entity**: a room snapshot identified by its `SnapshotId`
///
/// ```ignore
/// let a = Money::new(800);
/// let b = Money::new(800);
/// assert_eq!(a, b); // equal by value, not identity
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
