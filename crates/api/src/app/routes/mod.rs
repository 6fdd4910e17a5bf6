use axum::{routing::get, Router};

pub mod catalog;
pub mod charges;
pub mod checkout;
pub mod common;
pub mod ledger;
pub mod rooms;
pub mod system;
pub mod ws;

/// Router for all bearer-authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/catalog", catalog::router())
        .nest("/rooms", rooms::router())
        .merge(ledger::router())
        .merge(checkout::router())
        .merge(charges::router())
}
