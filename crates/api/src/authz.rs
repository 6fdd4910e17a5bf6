//! Request-boundary authorization.
//!
//! Handlers check a permission against the hotel that owns the resource they
//! touch, so a token for one hotel can never act on another hotel's rooms.

use axum::http::StatusCode;
use axum::response::Response;

use innkeep_auth::{AuthzError, Permission, authorize};
use innkeep_core::HotelId;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Hotel the caller acts within; guests without one are refused.
pub fn acting_hotel(principal: &PrincipalContext) -> Result<HotelId, Response> {
    principal.hotel_id().ok_or_else(|| {
        errors::json_error(StatusCode::FORBIDDEN, "hotel_required", "token carries no hotel")
    })
}

/// Require `permission` within the caller's own hotel and return that hotel.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<HotelId, Response> {
    let hotel_id = acting_hotel(principal)?;
    require_in(principal, hotel_id, permission)?;
    Ok(hotel_id)
}

/// Require `permission` within `hotel_id` (the owner of the resource being touched).
pub fn require_in(
    principal: &PrincipalContext,
    hotel_id: HotelId,
    permission: &Permission,
) -> Result<(), Response> {
    authorize(principal.principal(), hotel_id, permission).map_err(forbidden)
}

/// Whether the caller holds `permission` in `hotel_id`, without producing a response.
pub fn holds(principal: &PrincipalContext, hotel_id: HotelId, permission: &Permission) -> bool {
    authorize(principal.principal(), hotel_id, permission).is_ok()
}

fn forbidden(err: AuthzError) -> Response {
    match err {
        AuthzError::HotelMismatch => {
            errors::json_error(StatusCode::FORBIDDEN, "hotel_mismatch", err.to_string())
        }
        AuthzError::Forbidden(_) => errors::json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}
