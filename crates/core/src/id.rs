//! Strongly-typed identifiers used across the domain.
//!
//! Cross-entity references (item, room, booking) are always one of these opaque ids,
//! never embedded entities.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a hotel (multi-tenant boundary).
    HotelId,
    "HotelId"
);
uuid_newtype!(
    /// Identifier of a user (staff, admin or guest).
    UserId,
    "UserId"
);
uuid_newtype!(RoomId, "RoomId");
uuid_newtype!(BookingId, "BookingId");
uuid_newtype!(
    /// Identifier of an item definition in the catalog.
    ItemId,
    "ItemId"
);
uuid_newtype!(TemplateId, "TemplateId");
uuid_newtype!(SnapshotId, "SnapshotId");
uuid_newtype!(InspectionId, "InspectionId");
uuid_newtype!(TransactionId, "TransactionId");
uuid_newtype!(CheckoutId, "CheckoutId");
uuid_newtype!(InvoiceLineId, "InvoiceLineId");
uuid_newtype!(
    /// Identifier returned by the external invoicing collaborator.
    InvoiceId,
    "InvoiceId"
);
uuid_newtype!(
    /// Identifier of one live notification connection.
    ConnectionId,
    "ConnectionId"
);
uuid_newtype!(NotificationId, "NotificationId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        let id = RoomId::new();
        let parsed: RoomId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_failure_names_the_type() {
        let err = "not-a-uuid".parse::<BookingId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("BookingId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
