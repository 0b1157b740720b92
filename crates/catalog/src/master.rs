//! Reference masters: categories, suppliers and warehouses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, SupplierId, UserId, WarehouseId};

use crate::{optional_text, required_text};

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    pub fn validate(self, id: CategoryId, now: DateTime<Utc>) -> DomainResult<Category> {
        Ok(Category {
            id,
            name: required_text("category name", &self.name)?,
            description: optional_text(self.description),
            is_active: true,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryPatch {
    pub fn apply_to(self, category: &mut Category) -> DomainResult<()> {
        if let Some(name) = self.name {
            category.name = required_text("category name", &name)?;
        }
        if self.description.is_some() {
            category.description = optional_text(self.description);
        }
        Ok(())
    }
}

/// Supplier of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub tax_id: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewSupplier {
    pub fn validate(self, id: SupplierId, now: DateTime<Utc>) -> DomainResult<Supplier> {
        Ok(Supplier {
            id,
            name: required_text("supplier name", &self.name)?,
            tax_id: optional_text(self.tax_id),
            contact_name: optional_text(self.contact_name),
            phone: optional_text(self.phone),
            email: checked_email(self.email)?,
            address: optional_text(self.address),
            is_active: true,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl SupplierPatch {
    pub fn apply_to(self, supplier: &mut Supplier) -> DomainResult<()> {
        if let Some(name) = self.name {
            supplier.name = required_text("supplier name", &name)?;
        }
        if self.email.is_some() {
            supplier.email = checked_email(self.email)?;
        }
        if self.tax_id.is_some() {
            supplier.tax_id = optional_text(self.tax_id);
        }
        if self.contact_name.is_some() {
            supplier.contact_name = optional_text(self.contact_name);
        }
        if self.phone.is_some() {
            supplier.phone = optional_text(self.phone);
        }
        if self.address.is_some() {
            supplier.address = optional_text(self.address);
        }
        Ok(())
    }
}

fn checked_email(email: Option<String>) -> DomainResult<Option<String>> {
    match optional_text(email) {
        Some(e) if !e.contains('@') => Err(DomainError::validation(format!(
            "supplier email '{e}' is not an email address"
        ))),
        other => Ok(other),
    }
}

/// A physical stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: Option<String>,
    pub capacity: Option<i64>,
    pub manager_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

impl NewWarehouse {
    pub fn validate(self, id: WarehouseId, now: DateTime<Utc>) -> DomainResult<Warehouse> {
        Ok(Warehouse {
            id,
            name: required_text("warehouse name", &self.name)?,
            location: optional_text(self.location),
            capacity: checked_capacity(self.capacity)?,
            manager_id: self.manager_id,
            is_active: true,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehousePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub manager_id: Option<UserId>,
}

impl WarehousePatch {
    pub fn apply_to(self, warehouse: &mut Warehouse) -> DomainResult<()> {
        if let Some(name) = self.name {
            warehouse.name = required_text("warehouse name", &name)?;
        }
        if self.capacity.is_some() {
            warehouse.capacity = checked_capacity(self.capacity)?;
        }
        if self.location.is_some() {
            warehouse.location = optional_text(self.location);
        }
        if self.manager_id.is_some() {
            warehouse.manager_id = self.manager_id;
        }
        Ok(())
    }
}

fn checked_capacity(capacity: Option<i64>) -> DomainResult<Option<i64>> {
    match capacity {
        Some(c) if c <= 0 => Err(DomainError::validation("warehouse capacity must be positive")),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_category_trims_name_and_drops_blank_description() {
        let category = NewCategory {
            name: "  Tools ".to_string(),
            description: Some("   ".to_string()),
        }
        .validate(CategoryId::new(), Utc::now())
        .unwrap();

        assert_eq!(category.name, "Tools");
        assert_eq!(category.description, None);
        assert!(category.is_active);
    }

    #[test]
    fn new_warehouse_rejects_empty_name() {
        let err = NewWarehouse {
            name: " ".to_string(),
            ..Default::default()
        }
        .validate(WarehouseId::new(), Utc::now())
        .unwrap_err();

        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty name"),
        }
    }

    #[test]
    fn new_warehouse_rejects_non_positive_capacity() {
        let err = NewWarehouse {
            name: "Main".to_string(),
            capacity: Some(0),
            ..Default::default()
        }
        .validate(WarehouseId::new(), Utc::now())
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn supplier_email_must_look_like_an_address() {
        let err = NewSupplier {
            name: "Acme".to_string(),
            email: Some("sales.acme.test".to_string()),
            ..Default::default()
        }
        .validate(SupplierId::new(), Utc::now())
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn supplier_patch_only_touches_given_fields() {
        let mut supplier = NewSupplier {
            name: "Acme".to_string(),
            phone: Some("555-0100".to_string()),
            ..Default::default()
        }
        .validate(SupplierId::new(), Utc::now())
        .unwrap();

        SupplierPatch {
            email: Some("orders@acme.test".to_string()),
            ..Default::default()
        }
        .apply_to(&mut supplier)
        .unwrap();

        assert_eq!(supplier.name, "Acme");
        assert_eq!(supplier.phone.as_deref(), Some("555-0100"));
        assert_eq!(supplier.email.as_deref(), Some("orders@acme.test"));
    }

    #[test]
    fn failed_patch_leaves_warehouse_name_intact() {
        let mut warehouse = NewWarehouse {
            name: "North".to_string(),
            ..Default::default()
        }
        .validate(WarehouseId::new(), Utc::now())
        .unwrap();

        let err = WarehousePatch {
            name: Some("".to_string()),
            ..Default::default()
        }
        .apply_to(&mut warehouse)
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(warehouse.name, "North");
    }
}
