use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use innkeep_auth::permissions;
use innkeep_core::{BookingId, CheckoutId};
use innkeep_infra::SubmitCheckoutInspection;

use crate::app::routes::common::{booking_hotel, checkout_hotel, engine, respond, HandlerResult};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/bookings/:booking_id/checkout", post(request_checkout))
        .route("/checkouts/:checkout_id", get(checkout_status))
        .route("/checkouts/:checkout_id/begin", post(begin_checkout_inspection))
        .route("/checkouts/:checkout_id/inspection", post(submit_checkout_inspection))
        .route("/checkouts/:checkout_id/confirm", post(confirm_charges))
}

/// Caller must manage checkouts in the hotel that owns `checkout_id`.
fn authorize_checkout(
    services: &AppServices,
    principal: &PrincipalContext,
    raw_id: &str,
) -> Result<CheckoutId, axum::response::Response> {
    let checkout_id: CheckoutId = errors::parse_id(raw_id)?;
    authz::require_in(principal, checkout_hotel(services, checkout_id)?, &permissions::CHECKOUT_MANAGE)?;
    Ok(checkout_id)
}

pub async fn request_checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(booking_id): Path<String>,
) -> HandlerResult {
    let booking_id: BookingId = errors::parse_id(&booking_id)?;
    authz::require_in(&principal, booking_hotel(&services, booking_id)?, &permissions::CHECKOUT_MANAGE)?;

    let checkout = engine(services.engine.request_checkout(booking_id))?;
    Ok(respond(StatusCode::CREATED, &checkout))
}

pub async fn checkout_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(checkout_id): Path<String>,
) -> HandlerResult {
    let checkout_id = authorize_checkout(&services, &principal, &checkout_id)?;
    let view = engine(services.engine.checkout_status(checkout_id))?;
    Ok(respond(StatusCode::OK, &view))
}

pub async fn begin_checkout_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(checkout_id): Path<String>,
) -> HandlerResult {
    let checkout_id = authorize_checkout(&services, &principal, &checkout_id)?;
    let checkout = engine(services.engine.begin_checkout_inspection(checkout_id, principal.user_id()))?;
    Ok(respond(StatusCode::OK, &checkout))
}

pub async fn submit_checkout_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(checkout_id): Path<String>,
    Json(body): Json<dto::SubmitCheckoutRequest>,
) -> HandlerResult {
    let checkout_id = authorize_checkout(&services, &principal, &checkout_id)?;
    let view = engine(services.engine.submit_checkout_inspection(SubmitCheckoutInspection {
        checkout_id,
        inspector_id: principal.user_id(),
        checklist: body.checklist,
        findings: body.findings,
    }))?;
    Ok(respond(StatusCode::OK, &view))
}

pub async fn confirm_charges(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(checkout_id): Path<String>,
) -> HandlerResult {
    let checkout_id = authorize_checkout(&services, &principal, &checkout_id)?;
    let view = engine(services.engine.confirm_charges(checkout_id, principal.user_id()))?;
    Ok(respond(StatusCode::OK, &view))
}
