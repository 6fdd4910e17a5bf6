//! Connection handshake: a session is registered only after its bearer credential verifies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use innkeep_auth::{JwtValidator, Role};
use innkeep_core::{HotelId, UserId};

use crate::protocol::ClientMessage;

pub mod close_codes {
    pub const GOING_AWAY: u16 = 1001;
    pub const MISSING_CREDENTIAL: u16 = 4001;
    pub const INVALID_CREDENTIAL: u16 = 4003;
    pub const HANDSHAKE_TIMEOUT: u16 = 4008;
    pub const HEARTBEAT_TIMEOUT: u16 = 4009;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("handshake timed out")]
    HandshakeTimeout,
}

impl AuthError {
    pub fn close_code(&self) -> u16 {
        match self {
            AuthError::MissingCredential => close_codes::MISSING_CREDENTIAL,
            AuthError::InvalidCredential(_) => close_codes::INVALID_CREDENTIAL,
            AuthError::HandshakeTimeout => close_codes::HANDSHAKE_TIMEOUT,
        }
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub role: Role,
    pub hotel_id: Option<HotelId>,
}

impl SessionIdentity {
    /// Staff/admin sessions with a hotel join that hotel's operator group.
    pub fn operator_hotel(&self) -> Option<HotelId> {
        self.hotel_id.filter(|_| self.role.is_hotel_operator())
    }
}

#[derive(Clone)]
pub struct Authenticator {
    validator: Arc<dyn JwtValidator>,
    timeout: Duration,
}

impl core::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authenticator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(validator: Arc<dyn JwtValidator>, timeout: Duration) -> Self {
        Self { validator, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn authenticate(&self, token: &str) -> Result<SessionIdentity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        let claims = self
            .validator
            .validate(token, Utc::now())
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;
        Ok(SessionIdentity {
            user_id: claims.sub,
            role: claims.primary_role(),
            hotel_id: claims.hotel_id,
        })
    }

    /// Resolve the session identity.
    ///
    /// `credential` comes from the upgrade request (header or `token` query
    /// parameter). Without one, the first inbound frame must be an `auth`
    /// message arriving within the handshake window.
    pub async fn handshake<F>(
        &self,
        credential: Option<String>,
        first_frame: F,
    ) -> Result<SessionIdentity, AuthError>
    where
        F: Future<Output = Option<String>>,
    {
        if let Some(token) = credential {
            return self.authenticate(&token);
        }

        let frame = tokio::time::timeout(self.timeout, first_frame)
            .await
            .map_err(|_| AuthError::HandshakeTimeout)?
            .ok_or(AuthError::MissingCredential)?;

        match serde_json::from_str::<ClientMessage>(&frame) {
            Ok(ClientMessage::Auth { token }) => self.authenticate(&token),
            _ => Err(AuthError::MissingCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use innkeep_auth::{Hs256JwtValidator, JwtClaims};
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

    const SECRET: &str = "handshake-test-secret";

    fn authenticator() -> Authenticator {
        Authenticator::new(
            Arc::new(Hs256JwtValidator::new(SECRET)),
            Duration::from_millis(50),
        )
    }

    fn token(roles: Vec<Role>) -> (UserId, String) {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            hotel_id: Some(HotelId::new()),
            roles,
            issued_at: now - ChronoDuration::seconds(1),
            expires_at: now + ChronoDuration::minutes(5),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        (claims.sub, token)
    }

    #[tokio::test]
    async fn header_credential_is_accepted() {
        let (user_id, token) = token(vec![Role::STAFF]);
        let identity = authenticator()
            .handshake(Some(token), std::future::pending())
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.role, Role::STAFF);
        assert!(identity.operator_hotel().is_some());
    }

    #[tokio::test]
    async fn first_auth_frame_is_accepted() {
        let (user_id, token) = token(vec![Role::GUEST]);
        let frame = serde_json::json!({ "type": "auth", "token": token }).to_string();
        let identity = authenticator()
            .handshake(None, async move { Some(frame) })
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.operator_hotel(), None);
    }

    #[tokio::test]
    async fn failures_map_to_close_codes() {
        let auth = authenticator();

        let err = auth.handshake(None, std::future::pending()).await.unwrap_err();
        assert_eq!(err.close_code(), 4008);

        let err = auth
            .handshake(None, async { Some(r#"{"type":"ping"}"#.to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err.close_code(), 4001);

        let err = auth
            .handshake(Some("not-a-jwt".to_string()), std::future::pending())
            .await
            .unwrap_err();
        assert_eq!(err.close_code(), 4003);
    }
}
