use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use innkeep_auth::permissions;
use innkeep_core::{BookingId, TransactionId};
use innkeep_infra::PostTransaction;

use crate::app::routes::common::{booking_hotel, engine, respond, room_hotel, transaction_hotel, HandlerResult};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/transactions", post(post_transaction))
        .route("/transactions/:transaction_id", get(get_transaction))
        .route("/transactions/:transaction_id/complete", post(complete_transaction))
        .route("/transactions/:transaction_id/cancel", post(cancel_transaction))
        .route("/bookings/:booking_id/ledger", get(booking_ledger))
        .route("/bookings/:booking_id/reconcile", post(reconcile_for_invoice))
}

pub async fn post_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PostTransactionRequest>,
) -> HandlerResult {
    authz::require_in(&principal, room_hotel(&services, body.room_id)?, &permissions::LEDGER_POST)?;

    let tx = engine(services.engine.post_transaction(PostTransaction {
        room_id: body.room_id,
        booking_id: body.booking_id,
        kind: body.transaction_type,
        entries: body.entries,
        processed_by: principal.user_id(),
    }))?;
    Ok(respond(StatusCode::CREATED, &tx))
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(transaction_id): Path<String>,
) -> HandlerResult {
    let transaction_id: TransactionId = errors::parse_id(&transaction_id)?;
    let tx = engine(services.engine.get_transaction(transaction_id))?;
    authz::require_in(&principal, tx.hotel_id(), &permissions::CHARGES_READ_ANY)?;
    Ok(respond(StatusCode::OK, &tx))
}

pub async fn complete_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(transaction_id): Path<String>,
) -> HandlerResult {
    let transaction_id: TransactionId = errors::parse_id(&transaction_id)?;
    authz::require_in(
        &principal,
        transaction_hotel(&services, transaction_id)?,
        &permissions::LEDGER_SETTLE,
    )?;

    let tx = engine(services.engine.complete_transaction(transaction_id, principal.user_id()))?;
    Ok(respond(StatusCode::OK, &tx))
}

pub async fn cancel_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(transaction_id): Path<String>,
    body: Option<Json<dto::CancelTransactionRequest>>,
) -> HandlerResult {
    let transaction_id: TransactionId = errors::parse_id(&transaction_id)?;
    authz::require_in(
        &principal,
        transaction_hotel(&services, transaction_id)?,
        &permissions::LEDGER_SETTLE,
    )?;

    let reason = body.and_then(|Json(b)| b.reason);
    let tx = engine(services.engine.cancel_transaction(transaction_id, principal.user_id(), reason))?;
    Ok(respond(StatusCode::OK, &tx))
}

pub async fn booking_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(booking_id): Path<String>,
) -> HandlerResult {
    let booking_id: BookingId = errors::parse_id(&booking_id)?;
    authz::require_in(&principal, booking_hotel(&services, booking_id)?, &permissions::CHARGES_READ_ANY)?;

    let ledger = engine(services.engine.booking_ledger(booking_id))?;
    Ok(respond(StatusCode::OK, &ledger))
}

pub async fn reconcile_for_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(booking_id): Path<String>,
) -> HandlerResult {
    let booking_id: BookingId = errors::parse_id(&booking_id)?;
    authz::require_in(&principal, booking_hotel(&services, booking_id)?, &permissions::BILLING_RECONCILE)?;

    let reconciliation = engine(services.engine.reconcile_for_invoice(booking_id))?;
    Ok(respond(StatusCode::OK, &reconciliation))
}
