use innkeep_core::{HotelId, UserId};

use crate::claims::JwtClaims;
use crate::permissions::{self, Permission};
use crate::Role;

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub hotel_id: Option<HotelId>,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            hotel_id: claims.hotel_id,
            roles: claims.roles.clone(),
            permissions: permissions_from_roles(&claims.roles),
        }
    }
}

/// Static role→permission policy.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r == &Role::ADMIN) {
        return vec![permissions::WILDCARD];
    }

    let mut granted = Vec::new();
    if roles.iter().any(|r| r == &Role::STAFF) {
        granted.extend([
            permissions::ROOMS_READ,
            permissions::INSPECTIONS_RECORD,
            permissions::LEDGER_POST,
            permissions::LEDGER_SETTLE,
            permissions::CHECKOUT_MANAGE,
            permissions::CHARGES_READ_ANY,
        ]);
    }
    if roles.iter().any(|r| r == &Role::GUEST) {
        granted.push(permissions::CHARGES_READ_OWN);
    }
    granted
}
