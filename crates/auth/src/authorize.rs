use innkeep_core::HotelId;
use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("hotel mismatch")]
    HotelMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for `required` within `hotel_id`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(
    principal: &Principal,
    hotel_id: HotelId,
    required: &Permission,
) -> Result<(), AuthzError> {
    if principal.hotel_id != Some(hotel_id) {
        return Err(AuthzError::HotelMismatch);
    }

    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions;
    use crate::principal::permissions_from_roles;
    use crate::Role;
    use innkeep_core::UserId;

    fn principal(hotel_id: HotelId, roles: Vec<Role>) -> Principal {
        Principal {
            user_id: UserId::new(),
            hotel_id: Some(hotel_id),
            permissions: permissions_from_roles(&roles),
            roles,
        }
    }

    #[test]
    fn admin_wildcard_grants_everything_in_own_hotel() {
        let hotel = HotelId::new();
        let p = principal(hotel, vec![Role::ADMIN]);
        assert!(authorize(&p, hotel, &permissions::BILLING_RECONCILE).is_ok());
        assert_eq!(
            authorize(&p, HotelId::new(), &permissions::BILLING_RECONCILE),
            Err(AuthzError::HotelMismatch)
        );
    }

    #[test]
    fn staff_cannot_reconcile() {
        let hotel = HotelId::new();
        let p = principal(hotel, vec![Role::STAFF]);
        assert!(authorize(&p, hotel, &permissions::LEDGER_POST).is_ok());
        assert_eq!(
            authorize(&p, hotel, &permissions::BILLING_RECONCILE),
            Err(AuthzError::Forbidden("billing.reconcile".to_string()))
        );
    }
}
