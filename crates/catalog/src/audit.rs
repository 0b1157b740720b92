//! Audit trail of product deactivations and reactivations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{AuditId, DomainError, DomainResult, ProductId, UserId};

use crate::{optional_text, Product};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeactivationAction {
    Deactivate,
    Reactivate,
}

impl DeactivationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deactivate => "deactivate",
            Self::Reactivate => "reactivate",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "deactivate" => Ok(Self::Deactivate),
            "reactivate" => Ok(Self::Reactivate),
            other => Err(DomainError::validation(format!(
                "unknown deactivation action '{other}'"
            ))),
        }
    }

    /// The `is_active` value a product has after this action.
    pub fn resulting_active_flag(&self) -> bool {
        matches!(self, Self::Reactivate)
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivation {
    pub id: AuditId,
    pub product_id: ProductId,
    pub action: DeactivationAction,
    pub user_id: UserId,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProductDeactivation {
    /// Build the audit record for toggling `product`, rejecting no-op toggles.
    pub fn for_product(
        product: &Product,
        action: DeactivationAction,
        user_id: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if product.is_active == action.resulting_active_flag() {
            let state = if product.is_active { "active" } else { "inactive" };
            return Err(DomainError::conflict(format!(
                "product {} is already {state}",
                product.code
            )));
        }

        Ok(Self {
            id: AuditId::new(),
            product_id: product.id,
            action,
            user_id,
            reason: optional_text(reason),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewProduct;

    fn active_product() -> Product {
        NewProduct {
            code: "P-1".to_string(),
            name: "Pallet".to_string(),
            ..Default::default()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap()
    }

    #[test]
    fn deactivating_active_product_records_reason() {
        let product = active_product();
        let record = ProductDeactivation::for_product(
            &product,
            DeactivationAction::Deactivate,
            UserId::new(),
            Some("discontinued".to_string()),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(record.product_id, product.id);
        assert_eq!(record.reason.as_deref(), Some("discontinued"));
    }

    #[test]
    fn reactivating_active_product_is_a_conflict() {
        let err = ProductDeactivation::for_product(
            &active_product(),
            DeactivationAction::Reactivate,
            UserId::new(),
            None,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn action_parses_its_own_label() {
        for action in [DeactivationAction::Deactivate, DeactivationAction::Reactivate] {
            assert_eq!(DeactivationAction::parse(action.as_str()).unwrap(), action);
        }
    }
}
