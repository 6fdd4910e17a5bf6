//! Inspection recording and finding classification.
//!
//! An inspection overwrites the "current" projection of the lines it covers and
//! produces an immutable [`InspectionRecord`]. Deviations flagged for replacement
//! or guest charging are returned as [`ReplacementRequest`]s for the ledger to
//! turn into pending transactions.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use innkeep_core::{
    BookingId, DomainError, DomainResult, HotelId, InspectionId, ItemId, Money, RoomId, SnapshotId,
    UserId,
};

use crate::catalog::{ItemCatalog, ItemDefinition};
use crate::event::{InventoryEvent, LineChange};
use crate::snapshot::{Condition, RoomInventorySnapshot, SnapshotStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionType {
    DailyCleaning,
    CheckoutInspection,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionResult {
    Passed,
    Failed,
}

/// What the inspector found wrong with a line, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingIssue {
    None,
    Worn,
    Damaged,
    Missing,
}

impl FindingIssue {
    fn from_condition(condition: Condition) -> Self {
        match condition {
            Condition::Good => FindingIssue::None,
            Condition::Worn => FindingIssue::Worn,
            Condition::Damaged => FindingIssue::Damaged,
            Condition::Missing => FindingIssue::Missing,
        }
    }

    pub fn condition(self) -> Condition {
        match self {
            FindingIssue::None => Condition::Good,
            FindingIssue::Worn => Condition::Worn,
            FindingIssue::Damaged => Condition::Damaged,
            FindingIssue::Missing => Condition::Missing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingAction {
    None,
    Monitor,
    Replace,
    ChargeGuest,
}

/// Prices a finding without the inventory domain knowing the pricing table.
pub trait CostEstimator: Send + Sync {
    fn estimate(&self, item: &ItemDefinition, issue: FindingIssue, units: u32) -> Money;
}

fn default_units() -> u32 {
    1
}

/// One inspector observation for one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingInput {
    pub item_id: ItemId,
    /// Counted quantity; `None` means the count was not taken.
    #[serde(default)]
    pub observed_quantity: Option<u32>,
    pub condition: Condition,
    /// Units affected by a worn/damaged condition.
    #[serde(default = "default_units")]
    pub affected_units: u32,
    #[serde(default)]
    pub needs_replacement: bool,
    #[serde(default)]
    pub charge_guest: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl FindingInput {
    pub fn ok(item_id: ItemId) -> Self {
        Self {
            item_id,
            observed_quantity: None,
            condition: Condition::Good,
            affected_units: 1,
            needs_replacement: false,
            charge_guest: false,
            note: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub item_id: ItemId,
    pub issue: FindingIssue,
    pub units: u32,
    pub expected_quantity: u32,
    pub observed_quantity: u32,
    pub resulting_condition: Condition,
    pub action: FindingAction,
    pub cost: Money,
    pub note: Option<String>,
}

/// Immutable, append-only inspection history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: InspectionId,
    pub hotel_id: HotelId,
    pub snapshot_id: SnapshotId,
    pub room_id: RoomId,
    pub booking_id: Option<BookingId>,
    pub inspection_type: InspectionType,
    pub inspector_id: UserId,
    pub recorded_at: DateTime<Utc>,
    pub findings: Vec<Finding>,
    pub result: InspectionResult,
}

impl InspectionRecord {
    pub fn total_cost(&self) -> Money {
        self.findings.iter().map(|f| f.cost).sum()
    }
}

/// A deviation to be recorded as a pending ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRequest {
    pub item_id: ItemId,
    pub issue: FindingIssue,
    pub units: u32,
    pub condition: Condition,
    pub charge_guest: bool,
    /// Restore the line to expected/good once the transaction completes.
    pub replace_on_settle: bool,
    pub estimated_cost: Money,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionOutcome {
    pub record: InspectionRecord,
    pub requests: Vec<ReplacementRequest>,
    pub status: SnapshotStatus,
    pub event: InventoryEvent,
}

pub struct InspectionEngine<'a> {
    estimator: &'a dyn CostEstimator,
    staleness: Duration,
}

impl<'a> InspectionEngine<'a> {
    pub fn new(estimator: &'a dyn CostEstimator, staleness: Duration) -> Self {
        Self {
            estimator,
            staleness,
        }
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    /// Apply `findings` to `snapshot` and classify them.
    ///
    /// All findings are validated before the snapshot is touched, so an error
    /// leaves it unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        snapshot: &mut RoomInventorySnapshot,
        catalog: &ItemCatalog,
        id: InspectionId,
        inspector_id: UserId,
        inspection_type: InspectionType,
        findings: Vec<FindingInput>,
        now: DateTime<Utc>,
    ) -> DomainResult<InspectionOutcome> {
        validate_findings(snapshot, catalog, &findings)?;

        let mut recorded = Vec::with_capacity(findings.len());
        let mut requests = Vec::new();
        let mut changes = Vec::with_capacity(findings.len());

        for input in findings {
            let item = catalog.require(input.item_id)?;
            let line = snapshot.require_line_mut(input.item_id)?;

            let observed = input.observed_quantity.unwrap_or(line.current_quantity);
            let shortfall = line.expected_quantity.saturating_sub(observed);
            let reported = if shortfall > 0 {
                Condition::Missing
            } else {
                input.condition
            };
            let issue = FindingIssue::from_condition(reported);
            let units = match issue {
                FindingIssue::None => 0,
                FindingIssue::Missing if shortfall > 0 => shortfall,
                _ => input.affected_units.max(1),
            };

            line.current_quantity = observed;
            line.condition = line.condition.worsen(reported);
            line.last_checked_at = Some(now);
            line.checked_by = Some(inspector_id);

            let deviation = issue != FindingIssue::None;
            let action = match (deviation, input.charge_guest, input.needs_replacement) {
                (false, _, _) => FindingAction::None,
                (true, true, _) => FindingAction::ChargeGuest,
                (true, false, true) => FindingAction::Replace,
                (true, false, false) => FindingAction::Monitor,
            };
            let cost = if deviation {
                self.estimator.estimate(item, issue, units)
            } else {
                Money::ZERO
            };

            if matches!(action, FindingAction::ChargeGuest | FindingAction::Replace) {
                requests.push(ReplacementRequest {
                    item_id: input.item_id,
                    issue,
                    units,
                    condition: reported,
                    charge_guest: input.charge_guest,
                    replace_on_settle: input.needs_replacement || issue == FindingIssue::Missing,
                    estimated_cost: cost,
                    reason: input
                        .note
                        .clone()
                        .unwrap_or_else(|| describe(item, issue, units)),
                });
            }

            changes.push(LineChange {
                item_id: input.item_id,
                current_quantity: line.current_quantity,
                condition: line.condition,
            });
            recorded.push(Finding {
                item_id: input.item_id,
                issue,
                units,
                expected_quantity: line.expected_quantity,
                observed_quantity: observed,
                resulting_condition: line.condition,
                action,
                cost,
                note: input.note,
            });
        }

        let result = if recorded
            .iter()
            .any(|f| matches!(f.issue, FindingIssue::Damaged | FindingIssue::Missing))
        {
            InspectionResult::Failed
        } else {
            InspectionResult::Passed
        };

        let cleaned = inspection_type != InspectionType::Maintenance;
        let status = snapshot.refresh_status(now, self.staleness, cleaned);
        snapshot.touch(now);

        let record = InspectionRecord {
            id,
            hotel_id: snapshot.hotel_id(),
            snapshot_id: snapshot.id_typed(),
            room_id: snapshot.room_id(),
            booking_id: snapshot.booking_id(),
            inspection_type,
            inspector_id,
            recorded_at: now,
            findings: recorded,
            result,
        };
        let event = InventoryEvent::InspectionRecorded {
            room_id: snapshot.room_id(),
            snapshot_id: snapshot.id_typed(),
            inspection_id: id,
            inspection_type,
            result,
            status,
            changes,
            occurred_at: now,
        };

        Ok(InspectionOutcome {
            record,
            requests,
            status,
            event,
        })
    }
}

fn validate_findings(
    snapshot: &RoomInventorySnapshot,
    catalog: &ItemCatalog,
    findings: &[FindingInput],
) -> DomainResult<()> {
    if findings.is_empty() {
        return Err(DomainError::validation("inspection must contain at least one finding"));
    }
    let mut seen = HashSet::new();
    for finding in findings {
        if !seen.insert(finding.item_id) {
            return Err(DomainError::validation(format!(
                "item {} appears more than once in the inspection",
                finding.item_id
            )));
        }
        snapshot.require_line(finding.item_id)?;
        catalog.require(finding.item_id)?;
    }
    Ok(())
}

fn describe(item: &ItemDefinition, issue: FindingIssue, units: u32) -> String {
    let what = match issue {
        FindingIssue::None => "ok",
        FindingIssue::Worn => "worn",
        FindingIssue::Damaged => "damaged",
        FindingIssue::Missing => "missing",
    };
    format!("{units} x {} {what}", item.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::fixture;

    /// Flat estimator: replacement price per unit, doubled when missing.
    struct Flat;

    impl CostEstimator for Flat {
        fn estimate(&self, item: &ItemDefinition, issue: FindingIssue, units: u32) -> Money {
            let per_unit = match issue {
                FindingIssue::Missing => item.replacement_price.times(2),
                FindingIssue::None => Money::ZERO,
                _ => item.replacement_price,
            };
            per_unit.times(units)
        }
    }

    fn engine() -> InspectionEngine<'static> {
        InspectionEngine::new(&Flat, Duration::hours(24))
    }

    fn fresh() -> (crate::snapshot::tests::Fixture, RoomInventorySnapshot) {
        let f = fixture();
        let (snapshot, _) =
            RoomInventorySnapshot::from_template(SnapshotId::new(), RoomId::new(), &f.template, Utc::now());
        (f, snapshot)
    }

    #[test]
    fn shortfall_is_classified_missing_and_forwarded_for_charging() {
        let (f, mut snapshot) = fresh();
        let finding = FindingInput {
            observed_quantity: Some(1),
            charge_guest: true,
            ..FindingInput::ok(f.sheets)
        };

        let outcome = engine()
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::CheckoutInspection,
                vec![finding, FindingInput::ok(f.towels)],
                Utc::now(),
            )
            .unwrap();

        let line = snapshot.line(f.sheets).unwrap();
        assert_eq!(line.current_quantity, 1);
        assert_eq!(line.condition, Condition::Missing);
        assert_eq!(outcome.record.result, InspectionResult::Failed);
        assert_eq!(outcome.status, SnapshotStatus::Maintenance);
        assert_eq!(outcome.requests.len(), 1);

        let request = &outcome.requests[0];
        assert_eq!(request.issue, FindingIssue::Missing);
        assert_eq!(request.units, 1);
        assert_eq!(request.estimated_cost, Money::new(1600));
        assert!(request.replace_on_settle);
        assert_eq!(outcome.record.findings[0].action, FindingAction::ChargeGuest);
    }

    #[test]
    fn inspection_never_upgrades_condition() {
        let (f, mut snapshot) = fresh();
        let engine = engine();
        let damaged = FindingInput {
            condition: Condition::Damaged,
            ..FindingInput::ok(f.towels)
        };
        engine
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::Maintenance,
                vec![damaged],
                Utc::now(),
            )
            .unwrap();
        engine
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::DailyCleaning,
                vec![FindingInput::ok(f.towels)],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(snapshot.line(f.towels).unwrap().condition, Condition::Damaged);
    }

    #[test]
    fn unflagged_wear_is_monitored_not_forwarded() {
        let (f, mut snapshot) = fresh();
        let worn = FindingInput {
            condition: Condition::Worn,
            ..FindingInput::ok(f.towels)
        };
        let outcome = engine()
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::DailyCleaning,
                vec![worn, FindingInput::ok(f.sheets)],
                Utc::now(),
            )
            .unwrap();
        assert!(outcome.requests.is_empty());
        assert_eq!(outcome.record.findings[0].action, FindingAction::Monitor);
        assert_eq!(outcome.record.result, InspectionResult::Passed);
        assert_eq!(outcome.status, SnapshotStatus::Clean);
    }

    #[test]
    fn partially_inspected_room_still_requires_inspection() {
        let (f, mut snapshot) = fresh();
        let outcome = engine()
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::DailyCleaning,
                vec![FindingInput::ok(f.sheets)],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(outcome.status, SnapshotStatus::InspectionRequired);
    }

    #[test]
    fn empty_and_unknown_findings_leave_snapshot_untouched() {
        let (f, mut snapshot) = fresh();
        let before = snapshot.clone();
        let engine = engine();

        let err = engine
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::DailyCleaning,
                vec![],
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = engine
            .record(
                &mut snapshot,
                &f.catalog,
                InspectionId::new(),
                UserId::new(),
                InspectionType::DailyCleaning,
                vec![FindingInput::ok(f.sheets), FindingInput::ok(ItemId::new())],
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(snapshot, before);
    }
}
