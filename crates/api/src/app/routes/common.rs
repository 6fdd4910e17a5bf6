use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;

use innkeep_core::{BookingId, CheckoutId, DomainError, HotelId, RoomId, TransactionId};
use innkeep_infra::{EngineError, InventoryStore};

use crate::app::errors;
use crate::app::services::AppServices;

/// Handlers answer with a response either way; the error arm carries the mapped failure.
pub type HandlerResult = Result<Response, Response>;

pub fn respond<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, Json(body)).into_response()
}

pub fn engine<T>(result: Result<T, EngineError>) -> Result<T, Response> {
    result.map_err(errors::engine_error_to_response)
}

// Owning hotel of the resource a request touches.

pub fn room_hotel(services: &AppServices, room_id: RoomId) -> Result<HotelId, Response> {
    engine(services.engine.get_room_inventory(room_id)).map(|s| s.hotel_id())
}

pub fn transaction_hotel(services: &AppServices, transaction_id: TransactionId) -> Result<HotelId, Response> {
    engine(services.engine.get_transaction(transaction_id)).map(|t| t.hotel_id())
}

pub fn checkout_hotel(services: &AppServices, checkout_id: CheckoutId) -> Result<HotelId, Response> {
    engine(services.engine.checkout_status(checkout_id)).map(|v| v.checkout.hotel_id())
}

pub fn booking_hotel(services: &AppServices, booking_id: BookingId) -> Result<HotelId, Response> {
    let record = engine(services.engine.store().booking(booking_id).map_err(EngineError::from))?;
    record
        .map(|r| r.hotel_id)
        .ok_or_else(|| errors::engine_error_to_response(DomainError::not_found(format!("booking {booking_id}")).into()))
}
