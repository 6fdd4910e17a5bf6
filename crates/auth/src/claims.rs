use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use innkeep_core::{HotelId, UserId};

use crate::Role;

/// JWT claims model (transport-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Hotel the session acts within. Guests may hold tokens without one.
    #[serde(default)]
    pub hotel_id: Option<HotelId>,

    /// Roles granted within the hotel context.
    pub roles: Vec<Role>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    /// Highest-privilege role carried by the token; `guest` when none is present.
    pub fn primary_role(&self) -> Role {
        self.roles
            .iter()
            .max_by_key(|r| r.rank())
            .cloned()
            .unwrap_or(Role::GUEST)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate JWT claims.
///
/// Validates the *claims* only; signature verification lives in [`crate::jwt`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(roles: Vec<Role>) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: UserId::new(),
            hotel_id: Some(HotelId::new()),
            roles,
            issued_at: now,
            expires_at: now + Duration::minutes(5),
        }
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let c = claims(vec![Role::STAFF]);
        let later = c.expires_at + Duration::seconds(1);
        assert_eq!(validate_claims(&c, later), Err(TokenValidationError::Expired));
    }

    #[test]
    fn primary_role_prefers_admin() {
        let c = claims(vec![Role::STAFF, Role::ADMIN]);
        assert_eq!(c.primary_role(), Role::ADMIN);
        assert_eq!(claims(vec![]).primary_role(), Role::GUEST);
    }
}
