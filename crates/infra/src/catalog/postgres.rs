use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockroom_catalog::{
    Category, DeactivationAction, Product, ProductDeactivation, Supplier, Warehouse,
};
use stockroom_core::{
    AuditId, CategoryId, Page, Pagination, ProductId, SupplierId, UserId, WarehouseId,
};

use super::{CatalogStore, ProductFilter};
use crate::db::{decode_error, map_sqlx_error};
use crate::error::StoreError;

const CATEGORY_COLUMNS: &str = "id, name, description, is_active, created_at";
const SUPPLIER_COLUMNS: &str =
    "id, name, tax_id, contact_name, phone, email, address, is_active, created_at";
const WAREHOUSE_COLUMNS: &str =
    "id, name, location, capacity, manager_id, is_active, created_at";
const PRODUCT_COLUMNS: &str = "id, code, name, description, category_id, supplier_id, brand, \
     unit, purchase_price, sale_price, min_stock, max_stock, barcode, is_active, created_at, \
     updated_at";
const AUDIT_COLUMNS: &str = "id, product_id, action, user_id, reason, created_at";

/// Postgres-backed catalog store.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn not_found_unless_updated(rows: u64, what: &str, id: impl std::fmt::Display) -> Result<(), StoreError> {
    if rows == 0 {
        return Err(StoreError::NotFound(format!("{what} {id}")));
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self), err)]
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY LOWER(name)"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        rows.iter().map(category_from_row).collect()
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.description.as_deref())
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE categories SET name = $2, description = $3, is_active = $4 WHERE id = $1",
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.description.as_deref())
        .bind(category.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_category", e))?;
        not_found_unless_updated(result.rows_affected(), "category", category.id)
    }

    #[instrument(skip(self), err)]
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE is_active ORDER BY LOWER(name)"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_suppliers", e))?;
        rows.iter().map(supplier_from_row).collect()
    }

    #[instrument(skip(self), fields(supplier_id = %id), err)]
    async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_supplier", e))?;
        row.as_ref().map(supplier_from_row).transpose()
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO suppliers
                (id, name, tax_id, contact_name, phone, email, address, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(supplier.tax_id.as_deref())
        .bind(supplier.contact_name.as_deref())
        .bind(supplier.phone.as_deref())
        .bind(supplier.email.as_deref())
        .bind(supplier.address.as_deref())
        .bind(supplier.is_active)
        .bind(supplier.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn update_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = $2, tax_id = $3, contact_name = $4, phone = $5, email = $6,
                address = $7, is_active = $8
            WHERE id = $1
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(supplier.tax_id.as_deref())
        .bind(supplier.contact_name.as_deref())
        .bind(supplier.phone.as_deref())
        .bind(supplier.email.as_deref())
        .bind(supplier.address.as_deref())
        .bind(supplier.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_supplier", e))?;
        not_found_unless_updated(result.rows_affected(), "supplier", supplier.id)
    }

    #[instrument(skip(self), err)]
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE is_active ORDER BY LOWER(name)"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_warehouses", e))?;
        rows.iter().map(warehouse_from_row).collect()
    }

    #[instrument(skip(self), fields(warehouse_id = %id), err)]
    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(&format!("SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_warehouse", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn warehouses_by_ids(&self, ids: &[WarehouseId]) -> Result<Vec<Warehouse>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("warehouses_by_ids", e))?;
        rows.iter().map(warehouse_from_row).collect()
    }

    #[instrument(skip(self, warehouse), fields(warehouse_id = %warehouse.id), err)]
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, name, location, capacity, manager_id, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(&warehouse.name)
        .bind(warehouse.location.as_deref())
        .bind(warehouse.capacity)
        .bind(warehouse.manager_id.map(|m| *m.as_uuid()))
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_warehouse", e))?;
        Ok(())
    }

    #[instrument(skip(self, warehouse), fields(warehouse_id = %warehouse.id), err)]
    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE warehouses
            SET name = $2, location = $3, capacity = $4, manager_id = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(&warehouse.name)
        .bind(warehouse.location.as_deref())
        .bind(warehouse.capacity)
        .bind(warehouse.manager_id.map(|m| *m.as_uuid()))
        .bind(warehouse.is_active)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_warehouse", e))?;
        not_found_unless_updated(result.rows_affected(), "warehouse", warehouse.id)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE is_active
                AND ($1::text IS NULL OR LOWER(name) LIKE $1 OR LOWER(code) LIKE $1)
                AND ($2::uuid IS NULL OR category_id = $2)
                AND ($3::uuid IS NULL OR supplier_id = $3)
            ORDER BY LOWER(name)
            "#
        ))
        .bind(search)
        .bind(filter.category_id.map(|c| *c.as_uuid()))
        .bind(filter.supplier_id.map(|s| *s.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("products_by_ids", e))?;
        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id, code = %product.code), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, description, category_id, supplier_id, brand, unit,
                purchase_price, sale_price, min_stock, max_stock, barcode, is_active,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.category_id.map(|c| *c.as_uuid()))
        .bind(product.supplier_id.map(|s| *s.as_uuid()))
        .bind(product.brand.as_deref())
        .bind(&product.unit)
        .bind(product.purchase_price)
        .bind(product.sale_price)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(product.barcode.as_deref())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn update_product(&self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET code = $2, name = $3, description = $4, category_id = $5, supplier_id = $6,
                brand = $7, unit = $8, purchase_price = $9, sale_price = $10,
                min_stock = $11, max_stock = $12, barcode = $13, is_active = $14,
                updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.category_id.map(|c| *c.as_uuid()))
        .bind(product.supplier_id.map(|s| *s.as_uuid()))
        .bind(product.brand.as_deref())
        .bind(&product.unit)
        .bind(product.purchase_price)
        .bind(product.sale_price)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(product.barcode.as_deref())
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        not_found_unless_updated(result.rows_affected(), "product", product.id)
    }

    #[instrument(
        skip(self, audit),
        fields(product_id = %audit.product_id, action = audit.action.as_str()),
        err
    )]
    async fn set_product_active(
        &self,
        audit: &ProductDeactivation,
    ) -> Result<Product, StoreError> {
        let target = audit.action.resulting_active_flag();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // The `is_active <> $2` guard makes a replayed toggle a no-op we can detect.
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET is_active = $2, updated_at = $3
            WHERE id = $1 AND is_active <> $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(audit.product_id.as_uuid())
        .bind(target)
        .bind(audit.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("set_product_active", e))?;

        let Some(row) = row else {
            let exists = sqlx::query("SELECT 1 FROM products WHERE id = $1")
                .bind(audit.product_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("set_product_active", e))?
                .is_some();
            return Err(if exists {
                StoreError::Conflict(format!(
                    "product {} is already {}",
                    audit.product_id,
                    if target { "active" } else { "inactive" }
                ))
            } else {
                StoreError::NotFound(format!("product {}", audit.product_id))
            });
        };
        let product = product_from_row(&row)?;

        sqlx::query(
            r#"
            INSERT INTO product_deactivations (id, product_id, action, user_id, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(audit.id.as_uuid())
        .bind(audit.product_id.as_uuid())
        .bind(audit.action.as_str())
        .bind(audit.user_id.as_uuid())
        .bind(audit.reason.as_deref())
        .bind(audit.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product_audit", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn product_audit(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> Result<Page<ProductDeactivation>, StoreError> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM product_deactivations WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_product_audit", e))?
        .try_get("total")
        .map_err(|e| decode_error("count", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM product_deactivations
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(product_id.as_uuid())
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_audit", e))?;

        let items = rows.iter().map(audit_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total.max(0) as u64, pagination))
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name).map_err(|e| decode_error(name, e))
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: CategoryId::from_uuid(col::<Uuid>(row, "id")?),
        name: col(row, "name")?,
        description: col(row, "description")?,
        is_active: col(row, "is_active")?,
        created_at: col(row, "created_at")?,
    })
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, StoreError> {
    Ok(Supplier {
        id: SupplierId::from_uuid(col::<Uuid>(row, "id")?),
        name: col(row, "name")?,
        tax_id: col(row, "tax_id")?,
        contact_name: col(row, "contact_name")?,
        phone: col(row, "phone")?,
        email: col(row, "email")?,
        address: col(row, "address")?,
        is_active: col(row, "is_active")?,
        created_at: col(row, "created_at")?,
    })
}

fn warehouse_from_row(row: &PgRow) -> Result<Warehouse, StoreError> {
    Ok(Warehouse {
        id: WarehouseId::from_uuid(col::<Uuid>(row, "id")?),
        name: col(row, "name")?,
        location: col(row, "location")?,
        capacity: col(row, "capacity")?,
        manager_id: col::<Option<Uuid>>(row, "manager_id")?.map(UserId::from_uuid),
        is_active: col(row, "is_active")?,
        created_at: col(row, "created_at")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(col::<Uuid>(row, "id")?),
        code: col(row, "code")?,
        name: col(row, "name")?,
        description: col(row, "description")?,
        category_id: col::<Option<Uuid>>(row, "category_id")?.map(CategoryId::from_uuid),
        supplier_id: col::<Option<Uuid>>(row, "supplier_id")?.map(SupplierId::from_uuid),
        brand: col(row, "brand")?,
        unit: col(row, "unit")?,
        purchase_price: col(row, "purchase_price")?,
        sale_price: col(row, "sale_price")?,
        min_stock: col(row, "min_stock")?,
        max_stock: col(row, "max_stock")?,
        barcode: col(row, "barcode")?,
        is_active: col(row, "is_active")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<ProductDeactivation, StoreError> {
    let action: String = col(row, "action")?;
    Ok(ProductDeactivation {
        id: AuditId::from_uuid(col::<Uuid>(row, "id")?),
        product_id: ProductId::from_uuid(col::<Uuid>(row, "product_id")?),
        action: DeactivationAction::parse(&action).map_err(|e| decode_error("action", e))?,
        user_id: UserId::from_uuid(col::<Uuid>(row, "user_id")?),
        reason: col(row, "reason")?,
        created_at: col(row, "created_at")?,
    })
}
