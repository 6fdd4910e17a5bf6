use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use innkeep_auth::permissions;
use innkeep_core::{ItemId, TemplateId};
use innkeep_infra::NewTemplate;
use innkeep_inventory::NewItem;

use crate::app::routes::common::{engine, respond, HandlerResult};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/items", post(register_item).get(list_items))
        .route("/items/:item_id/pricing", put(update_item_pricing))
        .route("/items/:item_id/supersede", post(supersede_item))
        .route("/templates", post(create_template).get(list_templates))
        .route("/templates/:template_id", get(get_template))
        .route("/templates/:template_id/revisions", post(revise_template))
}

pub async fn register_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewItem>,
) -> HandlerResult {
    let hotel_id = authz::require(&principal, &permissions::CATALOG_MANAGE)?;
    let item = engine(services.engine.register_item(hotel_id, body))?;
    Ok(respond(StatusCode::CREATED, &item))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> HandlerResult {
    let hotel_id = authz::require(&principal, &permissions::ROOMS_READ)?;
    let items = engine(services.engine.list_items(hotel_id))?;
    Ok(respond(StatusCode::OK, &items))
}

pub async fn update_item_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(item_id): Path<String>,
    Json(body): Json<dto::UpdatePricingRequest>,
) -> HandlerResult {
    let item_id: ItemId = errors::parse_id(&item_id)?;
    let hotel_id = authz::require(&principal, &permissions::CATALOG_MANAGE)?;
    let item = engine(services.engine.update_item_pricing(
        hotel_id,
        item_id,
        body.unit_price,
        body.replacement_price,
    ))?;
    Ok(respond(StatusCode::OK, &item))
}

pub async fn supersede_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(item_id): Path<String>,
    Json(body): Json<NewItem>,
) -> HandlerResult {
    let item_id: ItemId = errors::parse_id(&item_id)?;
    let hotel_id = authz::require(&principal, &permissions::CATALOG_MANAGE)?;
    let item = engine(services.engine.supersede_item(hotel_id, item_id, body))?;
    Ok(respond(StatusCode::CREATED, &item))
}

pub async fn create_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewTemplate>,
) -> HandlerResult {
    let hotel_id = authz::require(&principal, &permissions::CATALOG_MANAGE)?;
    let template = engine(services.engine.create_template(hotel_id, body))?;
    Ok(respond(StatusCode::CREATED, &template))
}

pub async fn list_templates(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> HandlerResult {
    let hotel_id = authz::require(&principal, &permissions::ROOMS_READ)?;
    let templates = engine(services.engine.list_templates(hotel_id))?;
    Ok(respond(StatusCode::OK, &templates))
}

pub async fn get_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(template_id): Path<String>,
    Query(query): Query<dto::VersionQuery>,
) -> HandlerResult {
    let template_id: TemplateId = errors::parse_id(&template_id)?;
    let template = engine(services.engine.get_template(template_id, query.version))?;
    authz::require_in(&principal, template.hotel_id, &permissions::ROOMS_READ)?;
    Ok(respond(StatusCode::OK, &template))
}

pub async fn revise_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(template_id): Path<String>,
    Json(body): Json<dto::ReviseTemplateRequest>,
) -> HandlerResult {
    let template_id: TemplateId = errors::parse_id(&template_id)?;
    let current = engine(services.engine.get_template(template_id, None))?;
    authz::require_in(&principal, current.hotel_id, &permissions::CATALOG_MANAGE)?;
    let revised = engine(services.engine.revise_template(template_id, body.lines))?;
    Ok(respond(StatusCode::CREATED, &revised))
}
