use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. `"movements.create"`).
///
/// The wildcard `"*"` grants every permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    /// Read stock, movements, reports and master data.
    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory.read"));
    /// Record stock movements.
    pub const MOVEMENTS_CREATE: Permission = Permission(Cow::Borrowed("movements.create"));
    /// Create and update master data.
    pub const CATALOG_WRITE: Permission = Permission(Cow::Borrowed("catalog.write"));
    /// Deactivate master data.
    pub const CATALOG_DELETE: Permission = Permission(Cow::Borrowed("catalog.delete"));
    pub const PRODUCTS_REACTIVATE: Permission = Permission(Cow::Borrowed("products.reactivate"));

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
