//! Live per-room inventory state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{
    AggregateRoot, BookingId, DomainError, DomainResult, HotelId, ItemId, RoomId, SnapshotId, UserId,
};

use crate::event::{InventoryEvent, LineChange};
use crate::template::{RoomTemplate, TemplateRef};

/// Physical condition of a line. Ordered from best to worst; inspections only
/// ever move a line rightwards (`good → worn → damaged → missing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Good,
    Worn,
    Damaged,
    Missing,
}

impl Condition {
    /// The worse of the two conditions.
    pub fn worsen(self, reported: Condition) -> Condition {
        self.max(reported)
    }

    /// Damaged/missing lines keep the room in maintenance until resolved.
    pub fn needs_resolution(self) -> bool {
        matches!(self, Condition::Damaged | Condition::Missing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Clean,
    Dirty,
    Maintenance,
    InspectionRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEntry {
    pub item_id: ItemId,
    pub expected_quantity: u32,
    pub current_quantity: u32,
    pub condition: Condition,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub checked_by: Option<UserId>,
}

impl LineEntry {
    fn full(item_id: ItemId, quantity: u32) -> Self {
        Self {
            item_id,
            expected_quantity: quantity,
            current_quantity: quantity,
            condition: Condition::Good,
            last_checked_at: None,
            checked_by: None,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        match self.last_checked_at {
            None => true,
            Some(at) => now - at > staleness,
        }
    }

    fn restore(&mut self) {
        self.current_quantity = self.expected_quantity;
        self.condition = Condition::Good;
    }

    fn change(&self) -> LineChange {
        LineChange {
            item_id: self.item_id,
            current_quantity: self.current_quantity,
            condition: self.condition,
        }
    }
}

/// The booking currently occupying the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingAttachment {
    pub booking_id: BookingId,
    pub guest_id: UserId,
    pub attached_at: DateTime<Utc>,
}

/// Aggregate root: the room's one active inventory snapshot.
///
/// The room owns its snapshot; bookings attach to it and it is reset between guests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInventorySnapshot {
    id: SnapshotId,
    hotel_id: HotelId,
    room_id: RoomId,
    template: TemplateRef,
    booking: Option<BookingAttachment>,
    status: SnapshotStatus,
    lines: Vec<LineEntry>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomInventorySnapshot {
    /// Build a snapshot with every template line full and in good condition.
    ///
    /// Lines have never been checked, so a new room starts as `inspection_required`.
    pub fn from_template(
        id: SnapshotId,
        room_id: RoomId,
        template: &RoomTemplate,
        now: DateTime<Utc>,
    ) -> (Self, InventoryEvent) {
        let lines = template
            .lines
            .iter()
            .map(|l| LineEntry::full(l.item_id, l.default_quantity))
            .collect();
        let snapshot = Self {
            id,
            hotel_id: template.hotel_id,
            room_id,
            template: template.reference(),
            booking: None,
            status: SnapshotStatus::InspectionRequired,
            lines,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let event = InventoryEvent::SnapshotCreated {
            hotel_id: snapshot.hotel_id,
            room_id,
            snapshot_id: id,
            template: snapshot.template,
            occurred_at: now,
        };
        (snapshot, event)
    }

    pub fn id_typed(&self) -> SnapshotId {
        self.id
    }

    pub fn hotel_id(&self) -> HotelId {
        self.hotel_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn template(&self) -> TemplateRef {
        self.template
    }

    pub fn booking(&self) -> Option<&BookingAttachment> {
        self.booking.as_ref()
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking.map(|b| b.booking_id)
    }

    pub fn status(&self) -> SnapshotStatus {
        self.status
    }

    pub fn lines(&self) -> &[LineEntry] {
        &self.lines
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Called by persistence after a successful write.
    pub fn committed(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn line(&self, item_id: ItemId) -> Option<&LineEntry> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    pub fn require_line(&self, item_id: ItemId) -> DomainResult<&LineEntry> {
        self.line(item_id).ok_or_else(|| {
            DomainError::validation(format!(
                "item {item_id} is not part of template {} for room {}",
                self.template, self.room_id
            ))
        })
    }

    pub(crate) fn require_line_mut(&mut self, item_id: ItemId) -> DomainResult<&mut LineEntry> {
        let template = self.template;
        let room_id = self.room_id;
        self.lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "item {item_id} is not part of template {template} for room {room_id}"
                ))
            })
    }

    pub fn attach_booking(
        &mut self,
        booking_id: BookingId,
        guest_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryEvent> {
        match self.booking {
            Some(current) if current.booking_id == booking_id => {}
            Some(current) => {
                return Err(DomainError::conflict(format!(
                    "room {} is occupied by booking {}",
                    self.room_id, current.booking_id
                )));
            }
            None => {
                self.booking = Some(BookingAttachment {
                    booking_id,
                    guest_id,
                    attached_at: now,
                });
                if self.status == SnapshotStatus::Clean {
                    self.status = SnapshotStatus::Dirty;
                }
                self.updated_at = now;
            }
        }
        Ok(InventoryEvent::BookingAttached {
            room_id: self.room_id,
            snapshot_id: self.id,
            booking_id,
            guest_id,
            occurred_at: now,
        })
    }

    /// Quantity the line would hold after `delta`, without mutating.
    pub fn projected_quantity(&self, item_id: ItemId, delta: i64) -> DomainResult<u32> {
        let line = self.require_line(item_id)?;
        let next = i64::from(line.current_quantity) + delta;
        if next < 0 {
            return Err(DomainError::validation(format!(
                "quantity delta {delta} would drive item {item_id} below zero (current {})",
                line.current_quantity
            )));
        }
        u32::try_from(next)
            .map_err(|_| DomainError::validation(format!("quantity for item {item_id} overflows")))
    }

    /// Apply a ledger-driven change to one line. Condition only ever worsens here.
    pub fn adjust_line(
        &mut self,
        item_id: ItemId,
        delta: i64,
        condition: Option<Condition>,
        now: DateTime<Utc>,
    ) -> DomainResult<LineChange> {
        let next = self.projected_quantity(item_id, delta)?;
        let line = self.require_line_mut(item_id)?;
        line.current_quantity = next;
        if let Some(reported) = condition {
            line.condition = line.condition.worsen(reported);
        }
        let change = line.change();
        self.updated_at = now;
        Ok(change)
    }

    /// Replace a line: back to expected quantity, good condition.
    pub fn restore_line(&mut self, item_id: ItemId, now: DateTime<Utc>) -> DomainResult<LineChange> {
        let line = self.require_line_mut(item_id)?;
        line.restore();
        let change = line.change();
        self.updated_at = now;
        Ok(change)
    }

    /// Turnover between guests: every line restored, booking detached, room clean.
    pub fn reset(&mut self, inspector_id: UserId, now: DateTime<Utc>) -> InventoryEvent {
        let booking_id = self.booking_id();
        for line in &mut self.lines {
            line.restore();
            line.last_checked_at = Some(now);
            line.checked_by = Some(inspector_id);
        }
        self.booking = None;
        self.status = SnapshotStatus::Clean;
        self.updated_at = now;
        InventoryEvent::SnapshotReset {
            room_id: self.room_id,
            snapshot_id: self.id,
            booking_id,
            occurred_at: now,
        }
    }

    /// Rebuild lines against a newer template version. Items kept across versions
    /// carry their current projection; new items start full; dropped items go away.
    pub fn migrate(
        &mut self,
        template: &RoomTemplate,
        now: DateTime<Utc>,
    ) -> DomainResult<InventoryEvent> {
        if template.id != self.template.template_id {
            return Err(DomainError::validation(format!(
                "snapshot is built from template {}, not {}",
                self.template.template_id, template.id
            )));
        }
        if template.version <= self.template.version {
            return Err(DomainError::conflict(format!(
                "snapshot already at {}; cannot migrate to v{}",
                self.template, template.version
            )));
        }

        let from = self.template;
        let mut lines = Vec::with_capacity(template.lines.len());
        for tl in &template.lines {
            let line = match self.line(tl.item_id) {
                Some(existing) => LineEntry {
                    expected_quantity: tl.default_quantity,
                    ..existing.clone()
                },
                None => LineEntry::full(tl.item_id, tl.default_quantity),
            };
            lines.push(line);
        }
        self.lines = lines;
        self.template = template.reference();
        self.updated_at = now;

        Ok(InventoryEvent::SnapshotMigrated {
            room_id: self.room_id,
            snapshot_id: self.id,
            from,
            to: self.template,
            occurred_at: now,
        })
    }

    /// Recompute the overall status.
    ///
    /// Priority: `inspection_required` (stale line) > `maintenance` (unresolved
    /// damaged/missing line) > `dirty` (kept unless `cleaned`) > `clean`.
    pub fn refresh_status(
        &mut self,
        now: DateTime<Utc>,
        staleness: Duration,
        cleaned: bool,
    ) -> SnapshotStatus {
        self.status = if self.lines.iter().any(|l| l.is_stale(now, staleness)) {
            SnapshotStatus::InspectionRequired
        } else if self.lines.iter().any(|l| l.condition.needs_resolution()) {
            SnapshotStatus::Maintenance
        } else if self.status == SnapshotStatus::Dirty && !cleaned {
            SnapshotStatus::Dirty
        } else {
            SnapshotStatus::Clean
        };
        self.status
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl AggregateRoot for RoomInventorySnapshot {
    type Id = SnapshotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
