//! Room inventory domain module.
//!
//! Business rules for the item catalog, room templates, per-room snapshots and
//! inspections, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod catalog;
pub mod event;
pub mod inspection;
pub mod snapshot;
pub mod template;

pub use catalog::{ItemCatalog, ItemCategory, ItemDefinition, NewItem};
pub use event::{InventoryEvent, LineChange};
pub use inspection::{
    CostEstimator, Finding, FindingAction, FindingInput, FindingIssue, InspectionEngine,
    InspectionOutcome, InspectionRecord, InspectionResult, InspectionType, ReplacementRequest,
};
pub use snapshot::{BookingAttachment, Condition, LineEntry, RoomInventorySnapshot, SnapshotStatus};
pub use template::{RoomTemplate, TemplateLine, TemplateRef};
