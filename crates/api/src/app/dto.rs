use serde::{Deserialize, Serialize};

use innkeep_billing::{EntryInput, TransactionType};
use innkeep_checkout::ChecklistItem;
use innkeep_core::{BookingId, Money, RoomId, TemplateId, UserId};
use innkeep_infra::GuestCharge;
use innkeep_inventory::{FindingInput, InspectionType, TemplateLine};

// -------------------------
// Request DTOs
// -------------------------
//
// Acting user ids (inspector, processed_by) always come from the token, never the body.

#[derive(Debug, Deserialize)]
pub struct UpdatePricingRequest {
    pub unit_price: Money,
    pub replacement_price: Money,
}

#[derive(Debug, Deserialize)]
pub struct ReviseTemplateRequest {
    pub lines: Vec<TemplateLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    #[serde(default)]
    pub version: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSnapshotRequest {
    pub template_id: TemplateId,
    #[serde(default)]
    pub version: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AttachBookingRequest {
    pub booking_id: BookingId,
    pub guest_id: UserId,
}

#[derive(Debug, Default, Deserialize)]
pub struct MigrateSnapshotRequest {
    #[serde(default)]
    pub version: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecordInspectionRequest {
    pub inspection_type: InspectionType,
    #[serde(default)]
    pub findings: Vec<FindingInput>,
}

#[derive(Debug, Deserialize)]
pub struct PostTransactionRequest {
    pub room_id: RoomId,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    pub transaction_type: TransactionType,
    pub entries: Vec<EntryInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelTransactionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitCheckoutRequest {
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub findings: Vec<FindingInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GuestChargesQuery {
    #[serde(default)]
    pub booking_id: Option<BookingId>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct GuestChargesResponse {
    pub guest_id: UserId,
    pub charges: Vec<GuestCharge>,
    pub total_amount: Money,
}

impl GuestChargesResponse {
    pub fn new(guest_id: UserId, charges: Vec<GuestCharge>) -> Self {
        let total_amount = charges.iter().map(|c| c.total_amount).sum();
        Self {
            guest_id,
            charges,
            total_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_transaction_request_defaults_optional_fields() {
        let room_id = RoomId::new();
        let item_id = innkeep_core::ItemId::new();
        let body = serde_json::json!({
            "room_id": room_id,
            "transaction_type": "extra_request",
            "entries": [{ "item_id": item_id, "units": 1, "quantity_delta": 1, "chargeable": true }],
        });
        let req: PostTransactionRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.room_id, room_id);
        assert_eq!(req.booking_id, None);
        assert_eq!(req.transaction_type, TransactionType::ExtraRequest);
        assert_eq!(req.entries[0].item_id, item_id);
    }
}
