use std::collections::HashSet;

use thiserror::Error;

use stockroom_core::UserId;

use crate::{Permission, Role};

/// A resolved caller for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from roles with the built-in policy.
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            user_id,
            roles,
            permissions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Built-in role policy.
///
/// - administrator: everything
/// - operator: read, write masters, record movements, reactivate products
/// - viewer: read only
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted: Vec<Permission> = Vec::new();
    for role in roles {
        let perms = match role.as_str() {
            "administrator" => vec![Permission::WILDCARD],
            "operator" => vec![
                Permission::INVENTORY_READ,
                Permission::CATALOG_WRITE,
                Permission::MOVEMENTS_CREATE,
                Permission::PRODUCTS_REACTIVATE,
            ],
            "viewer" => vec![Permission::INVENTORY_READ],
            _ => Vec::new(),
        };
        for p in perms {
            if !granted.contains(&p) {
                granted.push(p);
            }
        }
    }
    granted
}

/// Check that `principal` holds `required` (pure, no IO).
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
