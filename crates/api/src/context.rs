use innkeep_auth::{JwtClaims, Principal, Role};
use innkeep_core::{HotelId, UserId};

/// Authenticated identity of a request, derived from the bearer token.
///
/// Guests may carry no hotel; hotel-scoped routes reject them in [`crate::authz`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            principal: Principal::from_claims(claims),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn hotel_id(&self) -> Option<HotelId> {
        self.principal.hotel_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
