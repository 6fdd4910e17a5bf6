//! `innkeep-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API's request middleware and the
//! WebSocket handshake both resolve a bearer credential through [`JwtValidator`].

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
