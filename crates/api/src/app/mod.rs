//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: engine, notification hub and pump wiring
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use innkeep_auth::JwtValidator;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over fresh in-memory services.
///
/// Must be called within a tokio runtime.
pub fn build_app(config: &AppConfig) -> std::io::Result<(Router, Arc<services::AppServices>)> {
    let jwt = services::jwt_validator(&config.jwt_secret);
    let services = Arc::new(services::build_services(
        Arc::clone(&jwt),
        config.engine.clone(),
        config.hub.clone(),
    )?);
    Ok((build_router(Arc::clone(&services), jwt), services))
}

pub fn build_router(services: Arc<services::AppServices>, jwt: Arc<dyn JwtValidator>) -> Router {
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    // `/ws` authenticates inside the socket handshake.
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/ws", get(routes::ws::connect))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
