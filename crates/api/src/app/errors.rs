use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use innkeep_core::DomainError;
use innkeep_infra::{EngineError, InvoicingError, StoreError};

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Domain(e) => domain_error_to_response(e),
        EngineError::Store(StoreError::Conflict(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::Store(StoreError::NotFound(msg)) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        EngineError::Store(StoreError::Unavailable(msg)) => {
            tracing::error!(error = %msg, "store unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", msg)
        }
        EngineError::Invoicing(e) => {
            tracing::warn!(error = %e, "invoicing collaborator failed");
            match e {
                InvoicingError::Rejected(msg) => json_error(StatusCode::BAD_GATEWAY, "invoicing_rejected", msg),
                InvoicingError::Unavailable(msg) => {
                    json_error(StatusCode::BAD_GATEWAY, "invoicing_unavailable", msg)
                }
            }
        }
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment into a typed id, or answer 400.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::RoomId;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let cases = [
            (EngineError::from(DomainError::validation("bad")), StatusCode::BAD_REQUEST),
            (EngineError::from(DomainError::not_found("room")), StatusCode::NOT_FOUND),
            (EngineError::from(DomainError::conflict("open")), StatusCode::CONFLICT),
            (
                EngineError::from(StoreError::Conflict("version".into())),
                StatusCode::CONFLICT,
            ),
            (
                EngineError::from(DomainError::InvariantViolation("negative".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (EngineError::from(DomainError::Unauthorized), StatusCode::FORBIDDEN),
            (
                EngineError::from(StoreError::Unavailable("poisoned".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EngineError::from(InvoicingError::Unavailable("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(engine_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let res = parse_id::<RoomId>("not-a-uuid").unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(parse_id::<RoomId>(&RoomId::new().to_string()).is_ok());
    }
}
