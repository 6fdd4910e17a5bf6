use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{BookingId, HotelId, InspectionId, ItemId, RoomId, SnapshotId, UserId};
use innkeep_events::Event;

use crate::inspection::{InspectionResult, InspectionType};
use crate::snapshot::{Condition, SnapshotStatus};
use crate::template::TemplateRef;

/// Resulting projection of one line after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub item_id: ItemId,
    pub current_quantity: u32,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryEvent {
    SnapshotCreated {
        hotel_id: HotelId,
        room_id: RoomId,
        snapshot_id: SnapshotId,
        template: TemplateRef,
        occurred_at: DateTime<Utc>,
    },
    BookingAttached {
        room_id: RoomId,
        snapshot_id: SnapshotId,
        booking_id: BookingId,
        guest_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    InspectionRecorded {
        room_id: RoomId,
        snapshot_id: SnapshotId,
        inspection_id: InspectionId,
        inspection_type: InspectionType,
        result: InspectionResult,
        status: SnapshotStatus,
        changes: Vec<LineChange>,
        occurred_at: DateTime<Utc>,
    },
    LinesAdjusted {
        room_id: RoomId,
        snapshot_id: SnapshotId,
        status: SnapshotStatus,
        changes: Vec<LineChange>,
        occurred_at: DateTime<Utc>,
    },
    SnapshotReset {
        room_id: RoomId,
        snapshot_id: SnapshotId,
        booking_id: Option<BookingId>,
        occurred_at: DateTime<Utc>,
    },
    SnapshotMigrated {
        room_id: RoomId,
        snapshot_id: SnapshotId,
        from: TemplateRef,
        to: TemplateRef,
        occurred_at: DateTime<Utc>,
    },
}

impl InventoryEvent {
    pub fn room_id(&self) -> RoomId {
        match self {
            InventoryEvent::SnapshotCreated { room_id, .. }
            | InventoryEvent::BookingAttached { room_id, .. }
            | InventoryEvent::InspectionRecorded { room_id, .. }
            | InventoryEvent::LinesAdjusted { room_id, .. }
            | InventoryEvent::SnapshotReset { room_id, .. }
            | InventoryEvent::SnapshotMigrated { room_id, .. } => *room_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::SnapshotCreated { .. } => "inventory.snapshot.created",
            InventoryEvent::BookingAttached { .. } => "inventory.snapshot.booking_attached",
            InventoryEvent::InspectionRecorded { .. } => "inventory.snapshot.inspection_recorded",
            InventoryEvent::LinesAdjusted { .. } => "inventory.snapshot.lines_adjusted",
            InventoryEvent::SnapshotReset { .. } => "inventory.snapshot.reset",
            InventoryEvent::SnapshotMigrated { .. } => "inventory.snapshot.migrated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::SnapshotCreated { occurred_at, .. }
            | InventoryEvent::BookingAttached { occurred_at, .. }
            | InventoryEvent::InspectionRecorded { occurred_at, .. }
            | InventoryEvent::LinesAdjusted { occurred_at, .. }
            | InventoryEvent::SnapshotReset { occurred_at, .. }
            | InventoryEvent::SnapshotMigrated { occurred_at, .. } => *occurred_at,
        }
    }
}
