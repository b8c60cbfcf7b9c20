use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier (e.g. "inventory.write").
///
/// The wildcard `"*"` grants everything and is only handed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    /// Manage the garment fleet (intake, state changes, retirement).
    pub const INVENTORY_WRITE: Permission = Permission(Cow::Borrowed("inventory.write"));
    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory.read"));
    /// Operate boxes and subscriptions on a customer's behalf.
    pub const FULFILMENT_WRITE: Permission = Permission(Cow::Borrowed("fulfilment.write"));
    pub const SUBSCRIPTIONS_READ: Permission = Permission(Cow::Borrowed("subscriptions.read"));

    /// Self-service: own basket, own subscription, own boxes.
    pub const RENTAL_SELF_SERVICE: Permission = Permission(Cow::Borrowed("rental.self_service"));

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

/// Static role policy.
///
/// Any authenticated user gets self-service; "admin" additionally gets the
/// wildcard. Unknown roles grant nothing extra.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut perms = vec![Permission::RENTAL_SELF_SERVICE];
    if roles.iter().any(Role::is_admin) {
        perms.push(Permission::WILDCARD);
    }
    perms
}
