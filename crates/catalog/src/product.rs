//! Product master data.
//!
//! The inventory engine reads `min_stock` to classify low stock and never
//! writes product data itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, ProductId, SupplierId};

use crate::{optional_text, required_text};

/// Unit of measure used when none is given.
pub const DEFAULT_UNIT: &str = "unit";

/// A stocked product.
///
/// Prices are integer amounts in the smallest currency unit (no currency
/// handling is done anywhere in the system).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique business code (SKU).
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub supplier_id: Option<SupplierId>,
    pub brand: Option<String>,
    pub unit: String,
    pub purchase_price: Option<i64>,
    pub sale_price: Option<i64>,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub barcode: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Re-check cross-field rules after construction or a patch.
    fn check(&self) -> DomainResult<()> {
        if self.min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }
        if let Some(max) = self.max_stock {
            if max < self.min_stock {
                return Err(DomainError::validation(format!(
                    "max_stock ({max}) cannot be below min_stock ({})",
                    self.min_stock
                )));
            }
        }
        for (field, price) in [
            ("purchase_price", self.purchase_price),
            ("sale_price", self.sale_price),
        ] {
            if matches!(price, Some(p) if p < 0) {
                return Err(DomainError::validation(format!("{field} cannot be negative")));
            }
        }
        Ok(())
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub purchase_price: Option<i64>,
    #[serde(default)]
    pub sale_price: Option<i64>,
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub max_stock: Option<i64>,
    #[serde(default)]
    pub barcode: Option<String>,
}

impl NewProduct {
    pub fn validate(self, id: ProductId, now: DateTime<Utc>) -> DomainResult<Product> {
        let product = Product {
            id,
            code: required_text("product code", &self.code)?,
            name: required_text("product name", &self.name)?,
            description: optional_text(self.description),
            category_id: self.category_id,
            supplier_id: self.supplier_id,
            brand: optional_text(self.brand),
            unit: optional_text(self.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            min_stock: self.min_stock.unwrap_or(0),
            max_stock: self.max_stock,
            barcode: optional_text(self.barcode),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        product.check()?;
        Ok(product)
    }
}

/// Partial product update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub purchase_price: Option<i64>,
    #[serde(default)]
    pub sale_price: Option<i64>,
    #[serde(default)]
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub max_stock: Option<i64>,
    #[serde(default)]
    pub barcode: Option<String>,
}

impl ProductPatch {
    /// Apply onto a copy of `product` and return it if the result is valid.
    pub fn applied_to(self, product: &Product, now: DateTime<Utc>) -> DomainResult<Product> {
        let mut next = product.clone();
        if let Some(code) = self.code {
            next.code = required_text("product code", &code)?;
        }
        if let Some(name) = self.name {
            next.name = required_text("product name", &name)?;
        }
        if let Some(unit) = self.unit {
            next.unit = required_text("product unit", &unit)?;
        }
        if self.description.is_some() {
            next.description = optional_text(self.description);
        }
        if self.brand.is_some() {
            next.brand = optional_text(self.brand);
        }
        if self.barcode.is_some() {
            next.barcode = optional_text(self.barcode);
        }
        next.category_id = self.category_id.or(next.category_id);
        next.supplier_id = self.supplier_id.or(next.supplier_id);
        next.purchase_price = self.purchase_price.or(next.purchase_price);
        next.sale_price = self.sale_price.or(next.sale_price);
        next.min_stock = self.min_stock.unwrap_or(next.min_stock);
        next.max_stock = self.max_stock.or(next.max_stock);
        next.updated_at = now;

        next.check()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> NewProduct {
        NewProduct {
            code: "WID-001".to_string(),
            name: "Widget".to_string(),
            min_stock: Some(5),
            ..Default::default()
        }
    }

    #[test]
    fn create_product_applies_defaults() {
        let product = widget().validate(ProductId::new(), Utc::now()).unwrap();
        assert_eq!(product.unit, DEFAULT_UNIT);
        assert_eq!(product.min_stock, 5);
        assert!(product.is_active);
    }

    #[test]
    fn create_product_rejects_empty_code() {
        let err = NewProduct {
            code: "   ".to_string(),
            ..widget()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap_err();

        match err {
            DomainError::Validation(msg) => assert!(msg.contains("code")),
            _ => panic!("Expected Validation error for empty code"),
        }
    }

    #[test]
    fn create_product_rejects_negative_min_stock() {
        let err = NewProduct {
            min_stock: Some(-1),
            ..widget()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_product_rejects_max_below_min() {
        let err = NewProduct {
            min_stock: Some(10),
            max_stock: Some(3),
            ..widget()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_product_rejects_negative_price() {
        let err = NewProduct {
            sale_price: Some(-100),
            ..widget()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn patch_is_validated_against_merged_state() {
        let product = NewProduct {
            max_stock: Some(20),
            ..widget()
        }
        .validate(ProductId::new(), Utc::now())
        .unwrap();

        let err = ProductPatch {
            min_stock: Some(50),
            ..Default::default()
        }
        .applied_to(&product, Utc::now())
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let renamed = ProductPatch {
            name: Some(" Widget XL ".to_string()),
            ..Default::default()
        }
        .applied_to(&product, Utc::now())
        .unwrap();
        assert_eq!(renamed.name, "Widget XL");
        assert_eq!(renamed.code, product.code);
        assert_eq!(renamed.max_stock, Some(20));
    }
}
