use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use innkeep_auth::permissions;
use innkeep_core::RoomId;
use innkeep_infra::RecordInspection;

use crate::app::routes::common::{engine, respond, room_hotel, HandlerResult};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:room_id/snapshot", post(create_snapshot))
        .route("/:room_id/inventory", get(get_room_inventory))
        .route("/:room_id/booking", post(attach_booking))
        .route("/:room_id/migrate", post(migrate_snapshot))
        .route("/:room_id/inspections", post(record_inspection).get(inspection_history))
}

pub async fn create_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(room_id): Path<String>,
    Json(body): Json<dto::CreateSnapshotRequest>,
) -> HandlerResult {
    let room_id: RoomId = errors::parse_id(&room_id)?;
    let template = engine(services.engine.get_template(body.template_id, body.version))?;
    authz::require_in(&principal, template.hotel_id, &permissions::ROOMS_CONFIGURE)?;

    let snapshot = engine(services.engine.create_snapshot(room_id, template.id, Some(template.version)))?;
    Ok(respond(StatusCode::CREATED, &snapshot))
}

pub async fn get_room_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(room_id): Path<String>,
) -> HandlerResult {
    let room_id: RoomId = errors::parse_id(&room_id)?;
    let snapshot = engine(services.engine.get_room_inventory(room_id))?;
    authz::require_in(&principal, snapshot.hotel_id(), &permissions::ROOMS_READ)?;
    Ok(respond(StatusCode::OK, &snapshot))
}

pub async fn attach_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(room_id): Path<String>,
    Json(body): Json<dto::AttachBookingRequest>,
) -> HandlerResult {
    let room_id: RoomId = errors::parse_id(&room_id)?;
    authz::require_in(&principal, room_hotel(&services, room_id)?, &permissions::ROOMS_CONFIGURE)?;

    let snapshot = engine(services.engine.attach_booking(room_id, body.booking_id, body.guest_id))?;
    Ok(respond(StatusCode::OK, &snapshot))
}

pub async fn migrate_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(room_id): Path<String>,
    body: Option<Json<dto::MigrateSnapshotRequest>>,
) -> HandlerResult {
    let room_id: RoomId = errors::parse_id(&room_id)?;
    authz::require_in(&principal, room_hotel(&services, room_id)?, &permissions::ROOMS_CONFIGURE)?;

    let version = body.and_then(|Json(b)| b.version);
    let snapshot = engine(services.engine.migrate_snapshot(room_id, version))?;
    Ok(respond(StatusCode::OK, &snapshot))
}

pub async fn record_inspection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(room_id): Path<String>,
    Json(body): Json<dto::RecordInspectionRequest>,
) -> HandlerResult {
    let room_id: RoomId = errors::parse_id(&room_id)?;
    authz::require_in(&principal, room_hotel(&services, room_id)?, &permissions::INSPECTIONS_RECORD)?;

    let report = engine(services.engine.record_inspection(RecordInspection {
        room_id,
        inspector_id: principal.user_id(),
        inspection_type: body.inspection_type,
        findings: body.findings,
    }))?;
    Ok(respond(StatusCode::CREATED, &report))
}

pub async fn inspection_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(room_id): Path<String>,
) -> HandlerResult {
    let room_id: RoomId = errors::parse_id(&room_id)?;
    authz::require_in(&principal, room_hotel(&services, room_id)?, &permissions::ROOMS_READ)?;

    let history = engine(services.engine.inspection_history(room_id))?;
    Ok(respond(StatusCode::OK, &history))
}
