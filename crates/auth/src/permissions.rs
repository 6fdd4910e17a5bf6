use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "ledger.post"). The wildcard `"*"` grants
/// everything within the principal's hotel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Permission = Permission::from_static("*");
pub const CATALOG_MANAGE: Permission = Permission::from_static("catalog.manage");
pub const ROOMS_READ: Permission = Permission::from_static("rooms.read");
pub const ROOMS_CONFIGURE: Permission = Permission::from_static("rooms.configure");
pub const INSPECTIONS_RECORD: Permission = Permission::from_static("inspections.record");
pub const LEDGER_POST: Permission = Permission::from_static("ledger.post");
pub const LEDGER_SETTLE: Permission = Permission::from_static("ledger.settle");
pub const BILLING_RECONCILE: Permission = Permission::from_static("billing.reconcile");
pub const CHECKOUT_MANAGE: Permission = Permission::from_static("checkout.manage");
pub const CHARGES_READ_ANY: Permission = Permission::from_static("charges.read.any");
pub const CHARGES_READ_OWN: Permission = Permission::from_static("charges.read.own");
