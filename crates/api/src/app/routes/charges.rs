//! Guest-facing charge views.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Router,
};

use innkeep_auth::permissions;
use innkeep_core::{BookingId, HotelId, UserId};
use innkeep_infra::{EngineError, GuestCharge, InventoryStore};

use crate::app::routes::common::{engine, respond, HandlerResult};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/me/charges", get(my_charges))
        .route("/guests/:guest_id/charges", get(guest_charges))
}

/// The caller's own charges, across every hotel they stayed at.
pub async fn my_charges(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::GuestChargesQuery>,
) -> HandlerResult {
    let granted = principal.principal().permissions.iter().any(|p| {
        p.is_wildcard() || *p == permissions::CHARGES_READ_OWN || *p == permissions::CHARGES_READ_ANY
    });
    if !granted {
        return Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("forbidden: missing permission '{}'", permissions::CHARGES_READ_OWN),
        ));
    }

    let guest_id = principal.user_id();
    let charges = engine(services.engine.get_guest_charges(guest_id, query.booking_id))?;
    Ok(respond(StatusCode::OK, &dto::GuestChargesResponse::new(guest_id, charges)))
}

/// Staff view of a guest's charges, narrowed to bookings at the caller's hotel.
pub async fn guest_charges(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(guest_id): Path<String>,
    Query(query): Query<dto::GuestChargesQuery>,
) -> HandlerResult {
    let guest_id: UserId = errors::parse_id(&guest_id)?;
    let hotel_id = authz::require(&principal, &permissions::CHARGES_READ_ANY)?;

    let charges = engine(services.engine.get_guest_charges(guest_id, query.booking_id))?;
    let mut visible: Vec<GuestCharge> = Vec::with_capacity(charges.len());
    for charge in charges {
        if engine(booking_at(&services, charge.booking_id))? == Some(hotel_id) {
            visible.push(charge);
        }
    }
    Ok(respond(StatusCode::OK, &dto::GuestChargesResponse::new(guest_id, visible)))
}

fn booking_at(services: &AppServices, booking_id: BookingId) -> Result<Option<HotelId>, EngineError> {
    Ok(services.engine.store().booking(booking_id)?.map(|b| b.hotel_id))
}
